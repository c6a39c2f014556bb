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

//! `core.gardener.cloud` API types consumed by the shoot admission plugins.

mod cloudprofile;
mod shoot;

pub use cloudprofile::{
    AvailabilityZone, CloudProfile, CloudProfileReference, CloudProfileSpec, ExpirableVersion,
    KubernetesSettings, MachineImage, MachineImageVersion, MachineType, NamespacedCloudProfile,
    NamespacedCloudProfileSpec, NamespacedCloudProfileStatus, Region, VersionClassification,
    VolumeType, KIND_CLOUD_PROFILE, KIND_NAMESPACED_CLOUD_PROFILE,
};
pub use shoot::{
    KubeletConfig, KubeletConfigReserved, Kubernetes, Machine, Provider, Shoot, ShootMachineImage,
    ShootSpec, Worker, WorkerKubernetes, KIND_SHOOT,
};

/// API group of all Gardener core resources.
pub const GROUP_NAME: &str = "core.gardener.cloud";
