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

//! Admission plugins module.

pub mod shootcloudprofilereference;
pub mod shootresourcereservation;

use crate::admission::errors::{field_not_found, field_required, FieldPath};
use crate::admission::{AdmissionError, Plugins};
use crate::api::gardener::{Shoot, KIND_SHOOT};
use crate::cloudprofile::CloudProfileListers;

/// All ordered plugins in execution order. The reference plugin runs first so
/// that later plugins see synchronized cloud profile fields.
pub const ALL_ORDERED_PLUGINS: &[&str] = &[
    shootcloudprofilereference::PLUGIN_NAME,
    shootresourcereservation::PLUGIN_NAME,
];

/// Register all admission plugins, each capturing the listers it reads from.
pub fn register_all_admission_plugins(plugins: &mut Plugins, listers: &CloudProfileListers) {
    shootcloudprofilereference::register(plugins, listers);
    shootresourcereservation::register(plugins, listers);
}

/// Report a failed cloud profile lookup against the shoot field that named the profile.
/// Errors other than `NotFound` pass through unchanged.
pub(crate) fn cloud_profile_lookup_error(shoot: &Shoot, err: AdmissionError) -> AdmissionError {
    if !matches!(err, AdmissionError::NotFound { .. }) {
        return err;
    }

    let field_error = if let Some(reference) = &shoot.spec.cloud_profile {
        field_not_found(
            &FieldPath::new(&["spec", "cloudProfile", "name"]),
            reference.name(),
        )
    } else {
        match shoot.spec.cloud_profile_name.as_deref() {
            Some(name) if !name.is_empty() => {
                field_not_found(&FieldPath::new(&["spec", "cloudProfileName"]), name)
            }
            _ => field_required(
                &FieldPath::new(&["spec", "cloudProfile"]),
                "must reference a CloudProfile or NamespacedCloudProfile",
            ),
        }
    };
    AdmissionError::invalid(KIND_SHOOT, &shoot.metadata.name, vec![field_error])
}
