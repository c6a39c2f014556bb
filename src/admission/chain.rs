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

//! Ordered chain of admission plugins.

use super::attributes::Attributes;
use super::errors::AdmissionResult;
use super::interfaces::Interface;
use std::sync::Arc;
use tracing::debug;

/// ChainHandler runs all mutating plugins in order, then all validating plugins.
/// The first error aborts the chain.
pub struct ChainHandler {
    plugins: Vec<(String, Arc<dyn Interface>)>,
}

impl ChainHandler {
    pub fn new(plugins: Vec<(String, Arc<dyn Interface>)>) -> Self {
        Self { plugins }
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Mutating phase.
    pub fn admit(&self, attributes: &mut dyn Attributes) -> AdmissionResult<()> {
        let operation = attributes.get_operation();
        for (name, plugin) in &self.plugins {
            if !plugin.handles(operation) {
                continue;
            }
            if let Some(mutator) = plugin.as_mutation() {
                debug!(plugin = %name, %operation, resource = %attributes.get_name(), "admit");
                mutator.admit(attributes)?;
            }
        }
        Ok(())
    }

    /// Validating phase.
    pub fn validate(&self, attributes: &dyn Attributes) -> AdmissionResult<()> {
        let operation = attributes.get_operation();
        for (name, plugin) in &self.plugins {
            if !plugin.handles(operation) {
                continue;
            }
            if let Some(validator) = plugin.as_validation() {
                debug!(plugin = %name, %operation, resource = %attributes.get_name(), "validate");
                validator.validate(attributes)?;
            }
        }
        Ok(())
    }

    /// Both phases, as the API server runs them for a single request.
    pub fn run(&self, attributes: &mut dyn Attributes) -> AdmissionResult<()> {
        self.admit(attributes)?;
        self.validate(attributes)
    }
}
