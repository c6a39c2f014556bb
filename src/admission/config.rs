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

//! Admission configuration file: which plugins run, in which order, with what settings.

use super::errors::{AdmissionError, AdmissionResult};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// AdmissionConfiguration lists the enabled plugins in execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionConfiguration {
    #[serde(default)]
    pub plugins: Vec<AdmissionPluginConfiguration>,
}

/// One enabled plugin and its embedded configuration object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionPluginConfiguration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<serde_json::Value>,
}

impl AdmissionConfiguration {
    pub fn from_reader(reader: impl Read) -> AdmissionResult<Self> {
        serde_json::from_reader(reader).map_err(|e| {
            AdmissionError::bad_request(format!("failed to decode admission configuration: {}", e))
        })
    }

    pub fn from_json(raw: &str) -> AdmissionResult<Self> {
        Self::from_reader(raw.as_bytes())
    }
}

impl AdmissionPluginConfiguration {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            configuration: None,
        }
    }

    pub fn with_configuration(mut self, configuration: serde_json::Value) -> Self {
        self.configuration = Some(configuration);
        self
    }

    /// The embedded configuration re-encoded for the plugin factory's reader.
    pub(crate) fn configuration_bytes(&self) -> AdmissionResult<Option<Vec<u8>>> {
        self.configuration
            .as_ref()
            .map(|value| {
                serde_json::to_vec(value).map_err(|e| {
                    AdmissionError::internal_error(format!(
                        "failed to encode configuration for plugin {}: {}",
                        self.name, e
                    ))
                })
            })
            .transpose()
    }
}

/// Decode a plugin's own configuration, falling back to its default when none is given.
pub fn decode_plugin_config<T>(plugin: &str, config: Option<&mut dyn Read>) -> AdmissionResult<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    match config {
        None => Ok(T::default()),
        Some(reader) => serde_json::from_reader(reader).map_err(|e| {
            AdmissionError::bad_request(format!("invalid configuration for {}: {}", plugin, e))
        }),
    }
}
