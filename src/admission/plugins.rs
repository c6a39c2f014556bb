// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Plugin registry for admission controllers.
//!
//! A `Plugins` value is built once at start-up. Factories are closures, so
//! each one captures the listers its plugin needs instead of receiving them
//! through a global initializer.

use super::chain::ChainHandler;
use super::config::AdmissionConfiguration;
use super::errors::{AdmissionError, AdmissionResult};
use super::interfaces::Interface;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Factory creates an admission plugin from its optional configuration.
pub type Factory =
    Arc<dyn Fn(Option<&mut dyn Read>) -> AdmissionResult<Arc<dyn Interface>> + Send + Sync>;

/// Plugins is a registry of admission plugin factories.
#[derive(Default)]
pub struct Plugins {
    registry: HashMap<String, Factory>,
}

impl Plugins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any earlier registration.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(Option<&mut dyn Read>) -> AdmissionResult<Arc<dyn Interface>> + Send + Sync + 'static,
    {
        if self.registry.insert(name.to_string(), Arc::new(factory)).is_some() {
            debug!(plugin = name, "replaced admission plugin registration");
        }
    }

    pub fn get_factory(&self, name: &str) -> Option<Factory> {
        self.registry.get(name).cloned()
    }

    /// Registered plugin names, sorted.
    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.contains_key(name)
    }

    /// Create a new instance of the named plugin.
    pub fn new_from_plugins(
        &self,
        name: &str,
        config: Option<&mut dyn Read>,
    ) -> AdmissionResult<Arc<dyn Interface>> {
        let Some(factory) = self.get_factory(name) else {
            warn!(plugin = name, "unknown admission plugin");
            return Err(AdmissionError::internal_error(format!(
                "unknown admission plugin: {}",
                name
            )));
        };
        factory(config)
    }

    /// Instantiate every plugin listed in `config`, in order, and chain them.
    pub fn new_chain(&self, config: &AdmissionConfiguration) -> AdmissionResult<ChainHandler> {
        let mut plugins = Vec::with_capacity(config.plugins.len());
        for entry in &config.plugins {
            let raw = entry.configuration_bytes()?;
            let plugin = match raw {
                Some(bytes) => {
                    let mut reader: &[u8] = &bytes;
                    self.new_from_plugins(&entry.name, Some(&mut reader))?
                }
                None => self.new_from_plugins(&entry.name, None)?,
            };
            debug!(plugin = %entry.name, "initialized admission plugin");
            plugins.push((entry.name.clone(), plugin));
        }
        info!(plugins = plugins.len(), "built admission chain");
        Ok(ChainHandler::new(plugins))
    }
}
