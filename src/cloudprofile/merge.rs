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

//! Merging a NamespacedCloudProfile's overrides into its parent's spec.
//!
//! | field              | keyed by | on conflict              | additions |
//! |--------------------|----------|--------------------------|-----------|
//! | kubernetes versions| version  | expiration date only     | no        |
//! | machine images     | name     | per version, as above    | no        |
//! | machine types      | name     | override replaces entry  | yes       |
//! | regions            | -        | appended, not deduped    | yes       |
//! | volume types       | -        | appended, not deduped    | yes       |
//! | CA bundle          | -        | parent + override        | -         |

use crate::api::gardener::{
    CloudProfileSpec, ExpirableVersion, MachineImage, MachineImageVersion,
    NamespacedCloudProfileSpec,
};

/// Merge `overrides` over `parent` and return the effective spec.
///
/// `parent` is never modified; the result starts from a deep copy of it.
/// Entries keep the parent's order, with added machine types appended in
/// override order.
pub fn merge_spec(
    parent: &CloudProfileSpec,
    overrides: &NamespacedCloudProfileSpec,
) -> CloudProfileSpec {
    let mut merged = parent.clone();

    if let Some(kubernetes) = &overrides.kubernetes {
        merged.kubernetes.versions = merge_deep(
            merged.kubernetes.versions,
            &kubernetes.versions,
            |v| v.version.as_str(),
            merge_expiration_date,
            false,
        );
    }

    merged.machine_images = merge_deep(
        merged.machine_images,
        &overrides.machine_images,
        |image| image.name.as_str(),
        merge_machine_image,
        false,
    );

    merged.machine_types = merge_deep(
        merged.machine_types,
        &overrides.machine_types,
        |machine_type| machine_type.name.as_str(),
        |_, replacement| replacement.clone(),
        true,
    );

    merged.regions.extend(overrides.regions.iter().cloned());
    merged.volume_types.extend(overrides.volume_types.iter().cloned());

    if let Some(bundle) = &overrides.ca_bundle {
        let mut combined = merged.ca_bundle.take().unwrap_or_default();
        combined.push_str(bundle);
        merged.ca_bundle = Some(combined);
    }

    merged
}

/// Merge `overrides` into `base` by key. Entries whose key is missing from
/// `base` are appended only when `allow_additions` is set.
fn merge_deep<T: Clone>(
    mut base: Vec<T>,
    overrides: &[T],
    key: impl Fn(&T) -> &str,
    merge: fn(&T, &T) -> T,
    allow_additions: bool,
) -> Vec<T> {
    for item in overrides {
        match base.iter().position(|existing| key(existing) == key(item)) {
            Some(index) => {
                let merged = merge(&base[index], item);
                base[index] = merged;
            }
            None if allow_additions => base.push(item.clone()),
            None => {}
        }
    }
    base
}

fn merge_expiration_date(
    parent: &ExpirableVersion,
    overrides: &ExpirableVersion,
) -> ExpirableVersion {
    ExpirableVersion {
        expiration_date: overrides.expiration_date,
        ..parent.clone()
    }
}

fn merge_machine_image_version(
    parent: &MachineImageVersion,
    overrides: &MachineImageVersion,
) -> MachineImageVersion {
    MachineImageVersion {
        expirable: merge_expiration_date(&parent.expirable, &overrides.expirable),
        ..parent.clone()
    }
}

fn merge_machine_image(parent: &MachineImage, overrides: &MachineImage) -> MachineImage {
    MachineImage {
        versions: merge_deep(
            parent.versions.clone(),
            &overrides.versions,
            |v| v.expirable.version.as_str(),
            merge_machine_image_version,
            false,
        ),
        ..parent.clone()
    }
}
