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

//! Gardener admission plugins for Shoot clusters.
//!
//! Two plugins are provided on top of a small admission framework:
//!
//! * `ShootResourceReservation` sizes the kubelet `kubeReserved` of every worker
//!   pool from its machine type ([`reservation`]).
//! * `ShootCloudProfileReference` keeps the legacy and structured cloud profile
//!   references in sync and validates them ([`cloudprofile`]).
//!
//! An embedder builds a [`Plugins`] registry with
//! [`plugins::register_all_admission_plugins`], then a [`ChainHandler`] from an
//! [`AdmissionConfiguration`], and runs each admission request through it.

pub mod admission;
pub mod api;
pub mod cloudprofile;
pub mod listers;
pub mod plugins;
pub mod reservation;

// Re-export commonly used types
pub use admission::{
    AdmissionConfiguration, AdmissionError, AdmissionResult, Attributes, AttributesRecord,
    ChainHandler, Handler, Interface, MutationInterface, Operation, Plugins, ValidationInterface,
};
pub use api::gardener::{CloudProfile, CloudProfileReference, NamespacedCloudProfile, Shoot};
pub use cloudprofile::CloudProfileListers;
pub use listers::{InMemoryStore, Lister, ListerError};
