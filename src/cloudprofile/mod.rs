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

//! Resolving the CloudProfile a shoot refers to.
//!
//! A shoot names either a cluster-scoped `CloudProfile` or a
//! `NamespacedCloudProfile` in its own namespace. The effective spec of a
//! namespaced profile is its parent's spec with the overrides merged in
//! ([`merge_spec`]) and is cached in the profile's status, which is what
//! [`resolve_effective_spec`] returns.

mod merge;

pub use merge::merge_spec;

use crate::admission::errors::{field_invalid, FieldErrorList, FieldPath};
use crate::admission::{AdmissionError, AdmissionResult};
use crate::api::gardener::{
    CloudProfile, CloudProfileReference, CloudProfileSpec, NamespacedCloudProfile,
    NamespacedCloudProfileStatus, Shoot, KIND_CLOUD_PROFILE,
};
use crate::listers::Lister;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Listers for both profile kinds.
#[derive(Clone)]
pub struct CloudProfileListers {
    pub cloud_profiles: Arc<dyn Lister<CloudProfile>>,
    pub namespaced_cloud_profiles: Arc<dyn Lister<NamespacedCloudProfile>>,
}

impl CloudProfileListers {
    pub fn new(
        cloud_profiles: Arc<dyn Lister<CloudProfile>>,
        namespaced_cloud_profiles: Arc<dyn Lister<NamespacedCloudProfile>>,
    ) -> Self {
        Self {
            cloud_profiles,
            namespaced_cloud_profiles,
        }
    }
}

/// The reference a shoot resolves through.
///
/// The structured `spec.cloudProfile` wins. The legacy `spec.cloudProfileName`
/// only ever yields a `CloudProfile` reference.
pub fn build_cloud_profile_reference(shoot: &Shoot) -> Option<CloudProfileReference> {
    if let Some(reference) = &shoot.spec.cloud_profile {
        return Some(reference.clone());
    }
    shoot
        .spec
        .cloud_profile_name
        .as_ref()
        .filter(|name| !name.is_empty())
        .map(|name| CloudProfileReference::CloudProfile(name.clone()))
}

/// The effective spec behind `reference`. Namespaced profiles are looked up in `namespace`.
pub fn resolve_effective_spec(
    reference: &CloudProfileReference,
    namespace: &str,
    listers: &CloudProfileListers,
) -> AdmissionResult<CloudProfileSpec> {
    match reference {
        CloudProfileReference::CloudProfile(name) => {
            Ok(listers.cloud_profiles.get("", name)?.spec)
        }
        CloudProfileReference::NamespacedCloudProfile(name) => Ok(listers
            .namespaced_cloud_profiles
            .get(namespace, name)?
            .status
            .cloud_profile_spec),
    }
}

/// The effective spec for `shoot`, looking namespaced profiles up in the
/// request's `namespace`. Fails with `NotFound` when the shoot names no profile.
pub fn get_cloud_profile_spec(
    shoot: &Shoot,
    namespace: &str,
    listers: &CloudProfileListers,
) -> AdmissionResult<CloudProfileSpec> {
    let reference = build_cloud_profile_reference(shoot)
        .ok_or_else(|| AdmissionError::not_found(KIND_CLOUD_PROFILE, ""))?;
    resolve_effective_spec(&reference, namespace, listers)
}

/// Name of the `CloudProfile` at the root of `reference`'s parent chain.
///
/// A namespaced profile that cannot be found, or a chain that loops, is an
/// internal error: the request itself is not at fault.
pub fn root_cloud_profile(
    reference: &CloudProfileReference,
    namespace: &str,
    listers: &CloudProfileListers,
) -> AdmissionResult<String> {
    let mut current = reference.clone();
    let mut visited = HashSet::new();
    loop {
        match current {
            CloudProfileReference::CloudProfile(name) => return Ok(name),
            CloudProfileReference::NamespacedCloudProfile(name) => {
                if !visited.insert(name.clone()) {
                    return Err(AdmissionError::internal_error(format!(
                        "NamespacedCloudProfile {:?} has a cyclic parent chain",
                        name
                    )));
                }
                let profile = listers
                    .namespaced_cloud_profiles
                    .get(namespace, &name)
                    .map_err(|e| {
                        AdmissionError::internal_error(format!(
                            "could not resolve parent chain of NamespacedCloudProfile {:?}: {}",
                            name, e
                        ))
                    })?;
                current = profile.spec.parent;
            }
        }
    }
}

/// Check that a shoot may move from `old` to `new`.
///
/// The only allowed change is from a `CloudProfile` to a
/// `NamespacedCloudProfile` descending from it. Returns the validation errors
/// (empty when the change is allowed); `Err` is reserved for lookup failures.
pub fn validate_reference_change(
    old: &CloudProfileReference,
    new: &CloudProfileReference,
    namespace: &str,
    listers: &CloudProfileListers,
) -> AdmissionResult<FieldErrorList> {
    if old == new {
        return Ok(Vec::new());
    }

    if let CloudProfileReference::NamespacedCloudProfile(_) = new {
        if let CloudProfileReference::CloudProfile(old_name) = old {
            if root_cloud_profile(new, namespace, listers)? == *old_name {
                return Ok(Vec::new());
            }
        }
    }

    debug!(%old, %new, namespace, "rejected cloud profile reference change");
    Ok(vec![field_invalid(
        &FieldPath::new(&["spec", "cloudProfile"]),
        &new.to_string(),
        "may only be changed to a descendant NamespacedCloudProfile",
    )])
}

/// Recompute the status of a namespaced profile: its parent's effective spec
/// with `profile`'s overrides merged in.
pub fn compute_namespaced_status(
    profile: &NamespacedCloudProfile,
    listers: &CloudProfileListers,
) -> AdmissionResult<NamespacedCloudProfileStatus> {
    let mut visited = HashSet::from([profile.metadata.name.clone()]);
    let parent = parent_spec(
        &profile.spec.parent,
        &profile.metadata.namespace,
        listers,
        &mut visited,
    )?;
    Ok(NamespacedCloudProfileStatus {
        cloud_profile_spec: merge_spec(&parent, &profile.spec),
        observed_generation: profile.metadata.generation,
    })
}

fn parent_spec(
    reference: &CloudProfileReference,
    namespace: &str,
    listers: &CloudProfileListers,
    visited: &mut HashSet<String>,
) -> AdmissionResult<CloudProfileSpec> {
    match reference {
        CloudProfileReference::CloudProfile(name) => Ok(listers.cloud_profiles.get("", name)?.spec),
        CloudProfileReference::NamespacedCloudProfile(name) => {
            if !visited.insert(name.clone()) {
                return Err(AdmissionError::internal_error(format!(
                    "NamespacedCloudProfile {:?} has a cyclic parent chain",
                    name
                )));
            }
            let profile = listers.namespaced_cloud_profiles.get(namespace, name)?;
            let grandparent = parent_spec(&profile.spec.parent, namespace, listers, visited)?;
            Ok(merge_spec(&grandparent, &profile.spec))
        }
    }
}
