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

//! Shoot and its worker pools.

use super::cloudprofile::CloudProfileReference;
use crate::api::core::{ApiObject, ObjectMeta, Quantity};
use serde::{Deserialize, Serialize};
use std::any::Any;

pub const KIND_SHOOT: &str = "Shoot";

/// Shoot is a user's request for a Kubernetes cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shoot {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ShootSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShootSpec {
    /// Deprecated: superseded by `cloud_profile`, still accepted and kept in sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_profile_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_profile: Option<CloudProfileReference>,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub kubernetes: Kubernetes,
    #[serde(default)]
    pub provider: Provider,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kubernetes {
    #[serde(default)]
    pub version: String,
    /// Shoot-wide kubelet settings; worker pools may override them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelet: Option<KubeletConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeletConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_reserved: Option<KubeletConfigReserved>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_reserved: Option<KubeletConfigReserved>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pods: Option<i32>,
}

/// Resources reserved for system daemons, off-limits to pods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeletConfigReserved {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral_storage: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<Quantity>,
}

impl KubeletConfigReserved {
    /// Copy every field of `defaults` that is unset here. Set fields are never touched.
    pub fn fill_unset(&mut self, defaults: &KubeletConfigReserved) {
        fn fill(target: &mut Option<Quantity>, source: &Option<Quantity>) {
            if target.is_none() {
                target.clone_from(source);
            }
        }
        fill(&mut self.cpu, &defaults.cpu);
        fill(&mut self.memory, &defaults.memory);
        fill(&mut self.ephemeral_storage, &defaults.ephemeral_storage);
        fill(&mut self.pid, &defaults.pid);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub workers: Vec<Worker>,
}

/// Worker is a named pool of machines of one type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub name: String,
    pub machine: Machine,
    #[serde(default)]
    pub minimum: i32,
    #[serde(default)]
    pub maximum: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<WorkerKubernetes>,
}

impl Worker {
    pub fn new(name: &str, machine_type: &str) -> Self {
        Self {
            name: name.to_string(),
            machine: Machine {
                type_: machine_type.to_string(),
                ..Default::default()
            },
            minimum: 1,
            maximum: 1,
            kubernetes: None,
        }
    }

    pub fn kube_reserved(&self) -> Option<&KubeletConfigReserved> {
        self.kubernetes
            .as_ref()
            .and_then(|k| k.kubelet.as_ref())
            .and_then(|k| k.kube_reserved.as_ref())
    }

    /// The pool's `kubeReserved`, creating the enclosing structs when missing.
    pub fn kube_reserved_mut(&mut self) -> &mut KubeletConfigReserved {
        self.kubernetes
            .get_or_insert_with(WorkerKubernetes::default)
            .kubelet
            .get_or_insert_with(KubeletConfig::default)
            .kube_reserved
            .get_or_insert_with(KubeletConfigReserved::default)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ShootMachineImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShootMachineImage {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerKubernetes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelet: Option<KubeletConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Shoot {
    /// The shoot-wide `spec.kubernetes.kubelet.kubeReserved`, if declared.
    pub fn kube_reserved(&self) -> Option<&KubeletConfigReserved> {
        self.spec
            .kubernetes
            .kubelet
            .as_ref()
            .and_then(|k| k.kube_reserved.as_ref())
    }

    pub fn kube_reserved_mut(&mut self) -> &mut KubeletConfigReserved {
        self.spec
            .kubernetes
            .kubelet
            .get_or_insert_with(KubeletConfig::default)
            .kube_reserved
            .get_or_insert_with(KubeletConfigReserved::default)
    }
}

impl ApiObject for Shoot {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn kind(&self) -> &str {
        KIND_SHOOT
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}
