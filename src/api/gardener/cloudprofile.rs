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

//! CloudProfile, NamespacedCloudProfile and the references shoots hold to them.

use crate::api::core::{ApiObject, Labels, ObjectMeta, Quantity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

pub const KIND_CLOUD_PROFILE: &str = "CloudProfile";
pub const KIND_NAMESPACED_CLOUD_PROFILE: &str = "NamespacedCloudProfile";

/// Reference from a shoot (or a namespaced profile) to the profile it builds on.
///
/// On the wire this is `{kind, name}`; an empty `kind` means `CloudProfile`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ReferenceFields", into = "ReferenceFields")]
pub enum CloudProfileReference {
    CloudProfile(String),
    NamespacedCloudProfile(String),
}

#[derive(Serialize, Deserialize)]
struct ReferenceFields {
    #[serde(default)]
    kind: String,
    name: String,
}

impl CloudProfileReference {
    /// Build a reference from its wire fields.
    pub fn new(kind: &str, name: &str) -> Result<Self, String> {
        match kind {
            "" | KIND_CLOUD_PROFILE => Ok(Self::CloudProfile(name.to_string())),
            KIND_NAMESPACED_CLOUD_PROFILE => Ok(Self::NamespacedCloudProfile(name.to_string())),
            other => Err(format!("unsupported cloud profile reference kind {:?}", other)),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::CloudProfile(name) | Self::NamespacedCloudProfile(name) => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::CloudProfile(_) => KIND_CLOUD_PROFILE,
            Self::NamespacedCloudProfile(_) => KIND_NAMESPACED_CLOUD_PROFILE,
        }
    }
}

impl fmt::Display for CloudProfileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.kind(), self.name())
    }
}

impl TryFrom<ReferenceFields> for CloudProfileReference {
    type Error = String;

    fn try_from(fields: ReferenceFields) -> Result<Self, Self::Error> {
        Self::new(&fields.kind, &fields.name)
    }
}

impl From<CloudProfileReference> for ReferenceFields {
    fn from(reference: CloudProfileReference) -> Self {
        Self {
            kind: reference.kind().to_string(),
            name: reference.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionClassification {
    Preview,
    Supported,
    Deprecated,
}

/// A version that may stop being offered at some point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpirableVersion {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<VersionClassification>,
}

impl ExpirableVersion {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesSettings {
    #[serde(default)]
    pub versions: Vec<ExpirableVersion>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineImageVersion {
    #[serde(flatten)]
    pub expirable: ExpirableVersion,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub architectures: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelet_version_constraint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineImage {
    pub name: String,
    #[serde(default)]
    pub versions: Vec<MachineImageVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_strategy: Option<String>,
}

/// One entry of a profile's machine type catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineType {
    pub name: String,
    pub cpu: Quantity,
    #[serde(default)]
    pub gpu: Quantity,
    pub memory: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usable: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityZone {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable_machine_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable_volume_types: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<AvailabilityZone>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeType {
    pub name: String,
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<Quantity>,
}

/// The effective catalog a shoot is validated and defaulted against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudProfileSpec {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub kubernetes: KubernetesSettings,
    #[serde(default)]
    pub machine_images: Vec<MachineImage>,
    #[serde(default)]
    pub machine_types: Vec<MachineType>,
    #[serde(default)]
    pub regions: Vec<Region>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_types: Vec<VolumeType>,
    /// PEM encoded CA certificates shared by all shoots of this profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudProfile {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: CloudProfileSpec,
}

/// Project-scoped additions and overrides on top of a parent profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespacedCloudProfileSpec {
    pub parent: CloudProfileReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<KubernetesSettings>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub machine_images: Vec<MachineImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub machine_types: Vec<MachineType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<Region>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_types: Vec<VolumeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,
}

impl NamespacedCloudProfileSpec {
    /// An override that changes nothing about `parent`.
    pub fn new(parent: CloudProfileReference) -> Self {
        Self {
            parent,
            kubernetes: None,
            machine_images: Vec::new(),
            machine_types: Vec::new(),
            regions: Vec::new(),
            volume_types: Vec::new(),
            ca_bundle: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespacedCloudProfileStatus {
    /// The parent's spec with this profile's overrides merged in.
    #[serde(default)]
    pub cloud_profile_spec: CloudProfileSpec,
    #[serde(default)]
    pub observed_generation: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespacedCloudProfile {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: NamespacedCloudProfileSpec,
    #[serde(default)]
    pub status: NamespacedCloudProfileStatus,
}

impl ApiObject for CloudProfile {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn kind(&self) -> &str {
        KIND_CLOUD_PROFILE
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl ApiObject for NamespacedCloudProfile {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn kind(&self) -> &str {
        KIND_NAMESPACED_CLOUD_PROFILE
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}
