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

//! ShootCloudProfileReference admission controller.
//!
//! Shoots may name their cloud profile through the legacy `spec.cloudProfileName`
//! or the structured `spec.cloudProfile`. On admission the two are kept in sync;
//! on validation the reference must resolve, the shoot's region must be offered
//! by the effective profile, and an update may only move the shoot to a
//! `NamespacedCloudProfile` descending from its current `CloudProfile`.

use crate::admission::errors::{
    field_invalid, field_not_supported, field_required, FieldErrorList, FieldPath,
};
use crate::admission::{
    AdmissionError, AdmissionResult, Attributes, Handler, Interface, MutationInterface,
    Operation, Plugins, ValidationInterface,
};
use crate::api::gardener::{CloudProfileReference, Shoot, GROUP_NAME, KIND_SHOOT};
use crate::cloudprofile::{
    build_cloud_profile_reference, resolve_effective_spec, validate_reference_change,
    CloudProfileListers,
};
use crate::plugins::cloud_profile_lookup_error;
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

/// Plugin name for the ShootCloudProfileReference admission controller.
pub const PLUGIN_NAME: &str = "ShootCloudProfileReference";

/// Register the ShootCloudProfileReference plugin with the plugin registry.
pub fn register(plugins: &mut Plugins, listers: &CloudProfileListers) {
    let listers = listers.clone();
    plugins.register(PLUGIN_NAME, move |_config: Option<&mut dyn Read>| {
        Ok(Arc::new(Plugin::new(listers.clone())) as Arc<dyn Interface>)
    });
}

/// Plugin is an implementation of the ShootCloudProfileReference admission controller.
pub struct Plugin {
    handler: Handler,
    listers: CloudProfileListers,
}

impl Plugin {
    pub fn new(listers: CloudProfileListers) -> Self {
        Self {
            handler: Handler::new_create_update(),
            listers,
        }
    }

    fn should_ignore(&self, attributes: &dyn Attributes) -> bool {
        !attributes.get_resource().is(GROUP_NAME, "shoots")
            || !attributes.get_subresource().is_empty()
    }
}

/// Fill whichever reference field is missing from the other one.
///
/// A differing legacy name is left alone so that validation can reject it.
fn sync_legacy_fields(shoot: &mut Shoot) {
    let legacy = shoot
        .spec
        .cloud_profile_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .map(String::from);

    match (shoot.spec.cloud_profile.clone(), legacy) {
        (None, Some(name)) => {
            shoot.spec.cloud_profile = Some(CloudProfileReference::CloudProfile(name));
        }
        (Some(CloudProfileReference::CloudProfile(name)), None) => {
            shoot.spec.cloud_profile_name = Some(name);
        }
        _ => {}
    }
}

impl Interface for Plugin {
    fn handles(&self, operation: Operation) -> bool {
        self.handler.handles(operation)
    }

    fn as_mutation(&self) -> Option<&dyn MutationInterface> {
        Some(self)
    }

    fn as_validation(&self) -> Option<&dyn ValidationInterface> {
        Some(self)
    }
}

impl MutationInterface for Plugin {
    fn admit(&self, attributes: &mut dyn Attributes) -> AdmissionResult<()> {
        if self.should_ignore(attributes) {
            return Ok(());
        }

        let shoot = match attributes.get_object_mut() {
            Some(obj) => match obj.as_any_mut().downcast_mut::<Shoot>() {
                Some(shoot) => shoot,
                None => {
                    return Err(AdmissionError::bad_request(
                        "expected Shoot but got different type",
                    ))
                }
            },
            None => return Ok(()),
        };

        sync_legacy_fields(shoot);
        Ok(())
    }
}

impl ValidationInterface for Plugin {
    fn validate(&self, attributes: &dyn Attributes) -> AdmissionResult<()> {
        if self.should_ignore(attributes) {
            return Ok(());
        }

        let shoot = match attributes.get_object() {
            Some(obj) => match obj.as_any().downcast_ref::<Shoot>() {
                Some(shoot) => shoot,
                None => {
                    return Err(AdmissionError::bad_request(
                        "expected Shoot but got different type",
                    ))
                }
            },
            None => return Ok(()),
        };
        let invalid = |errors: FieldErrorList| {
            AdmissionError::invalid(KIND_SHOOT, &shoot.metadata.name, errors)
        };

        let Some(reference) = build_cloud_profile_reference(shoot) else {
            return Err(invalid(vec![field_required(
                &FieldPath::new(&["spec", "cloudProfile"]),
                "must reference a CloudProfile or NamespacedCloudProfile",
            )]));
        };

        if let (Some(CloudProfileReference::CloudProfile(name)), Some(legacy)) =
            (&shoot.spec.cloud_profile, shoot.spec.cloud_profile_name.as_deref())
        {
            if !legacy.is_empty() && legacy != name.as_str() {
                return Err(invalid(vec![field_invalid(
                    &FieldPath::new(&["spec", "cloudProfileName"]),
                    legacy,
                    "must match spec.cloudProfile.name",
                )]));
            }
        }

        let namespace = attributes.get_namespace();
        let spec = resolve_effective_spec(&reference, namespace, &self.listers)
            .map_err(|e| cloud_profile_lookup_error(shoot, e))?;

        let mut errors = FieldErrorList::new();
        if !spec.regions.iter().any(|r| r.name == shoot.spec.region) {
            let supported: Vec<String> = spec.regions.iter().map(|r| r.name.clone()).collect();
            errors.push(field_not_supported(
                &FieldPath::new(&["spec", "region"]),
                &shoot.spec.region,
                &supported,
            ));
        }

        if attributes.get_operation() == Operation::Update {
            let old_reference = attributes
                .get_old_object()
                .and_then(|obj| obj.as_any().downcast_ref::<Shoot>())
                .and_then(build_cloud_profile_reference);
            if let Some(old_reference) = old_reference {
                errors.extend(validate_reference_change(
                    &old_reference,
                    &reference,
                    namespace,
                    &self.listers,
                )?);
            }
        }

        if !errors.is_empty() {
            debug!(
                shoot = %shoot.metadata.name,
                errors = errors.len(),
                "rejected cloud profile reference"
            );
            return Err(invalid(errors));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{AttributesRecord, ChainHandler, FieldErrorType};
    use crate::api::core::ObjectMeta;
    use crate::api::gardener::{
        CloudProfile, CloudProfileSpec, NamespacedCloudProfile, NamespacedCloudProfileSpec,
        NamespacedCloudProfileStatus, Region, KIND_CLOUD_PROFILE, KIND_NAMESPACED_CLOUD_PROFILE,
    };
    use crate::listers::InMemoryStore;

    const NAMESPACE: &str = "garden-dev";

    fn cp(name: &str) -> CloudProfileReference {
        CloudProfileReference::CloudProfile(name.to_string())
    }

    fn ncp(name: &str) -> CloudProfileReference {
        CloudProfileReference::NamespacedCloudProfile(name.to_string())
    }

    fn spec_with_regions(regions: &[&str]) -> CloudProfileSpec {
        CloudProfileSpec {
            regions: regions
                .iter()
                .map(|name| Region {
                    name: name.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn namespaced(
        name: &str,
        parent: CloudProfileReference,
        regions: &[&str],
    ) -> NamespacedCloudProfile {
        NamespacedCloudProfile {
            metadata: ObjectMeta::namespaced(NAMESPACE, name),
            spec: NamespacedCloudProfileSpec::new(parent),
            status: NamespacedCloudProfileStatus {
                cloud_profile_spec: spec_with_regions(regions),
                observed_generation: 1,
            },
        }
    }

    fn plugin() -> Plugin {
        let profiles = vec![
            CloudProfile {
                metadata: ObjectMeta::new("aws"),
                spec: spec_with_regions(&["eu-west-1"]),
            },
            CloudProfile {
                metadata: ObjectMeta::new("gcp"),
                spec: spec_with_regions(&["europe-west1"]),
            },
        ];
        let namespaced_profiles = vec![
            namespaced("aws-dev", cp("aws"), &["eu-west-1", "us-east-1"]),
            namespaced("gcp-dev", cp("gcp"), &["europe-west1"]),
        ];
        Plugin::new(CloudProfileListers::new(
            Arc::new(InMemoryStore::with_objects(KIND_CLOUD_PROFILE, profiles)),
            Arc::new(InMemoryStore::with_objects(
                KIND_NAMESPACED_CLOUD_PROFILE,
                namespaced_profiles,
            )),
        ))
    }

    fn shoot(
        legacy: Option<&str>,
        reference: Option<CloudProfileReference>,
        region: &str,
    ) -> Shoot {
        let mut shoot = Shoot {
            metadata: ObjectMeta::namespaced(NAMESPACE, "dev"),
            ..Default::default()
        };
        shoot.spec.cloud_profile_name = legacy.map(String::from);
        shoot.spec.cloud_profile = reference;
        shoot.spec.region = region.to_string();
        shoot
    }

    fn admitted(shoot: Shoot) -> Shoot {
        let mut attributes = AttributesRecord::new_shoot(Operation::Create, shoot, None);
        plugin().admit(&mut attributes).unwrap();
        attributes.get_shoot().unwrap().clone()
    }

    fn validate_create(shoot: Shoot) -> AdmissionResult<()> {
        plugin().validate(&AttributesRecord::new_shoot(Operation::Create, shoot, None))
    }

    fn validate_update(old: Shoot, new: Shoot) -> AdmissionResult<()> {
        plugin().validate(&AttributesRecord::new_shoot(Operation::Update, new, Some(old)))
    }

    #[test]
    fn test_admit_adds_structured_reference_from_legacy_name() {
        let shoot = admitted(shoot(Some("aws"), None, "eu-west-1"));
        assert_eq!(shoot.spec.cloud_profile, Some(cp("aws")));
        assert_eq!(shoot.spec.cloud_profile_name.as_deref(), Some("aws"));
    }

    #[test]
    fn test_admit_sets_legacy_name_from_cloud_profile_reference() {
        let shoot = admitted(shoot(None, Some(cp("aws")), "eu-west-1"));
        assert_eq!(shoot.spec.cloud_profile_name.as_deref(), Some("aws"));
    }

    #[test]
    fn test_admit_leaves_legacy_name_for_namespaced_reference() {
        let shoot = admitted(shoot(None, Some(ncp("aws-dev")), "eu-west-1"));
        assert_eq!(shoot.spec.cloud_profile_name, None);

        let shoot = admitted(shoot_with_both("aws", ncp("aws-dev")));
        assert_eq!(shoot.spec.cloud_profile_name.as_deref(), Some("aws"));
        assert_eq!(shoot.spec.cloud_profile, Some(ncp("aws-dev")));
    }

    fn shoot_with_both(legacy: &str, reference: CloudProfileReference) -> Shoot {
        shoot(Some(legacy), Some(reference), "eu-west-1")
    }

    #[test]
    fn test_validate_requires_reference() {
        let err = validate_create(shoot(None, None, "eu-west-1")).unwrap_err();
        let field_errors = err.field_errors();
        assert_eq!(field_errors[0].field, "spec.cloudProfile");
        assert_eq!(field_errors[0].error_type, FieldErrorType::Required);
    }

    #[test]
    fn test_validate_rejects_mismatching_legacy_name() {
        let err = validate_create(shoot_with_both("gcp", cp("aws"))).unwrap_err();
        let field_errors = err.field_errors();
        assert_eq!(field_errors[0].field, "spec.cloudProfileName");
        assert_eq!(field_errors[0].error_type, FieldErrorType::Invalid);
        assert_eq!(field_errors[0].value, "gcp");

        validate_create(shoot_with_both("aws", cp("aws"))).unwrap();
        validate_create(shoot_with_both("aws", ncp("aws-dev"))).unwrap();
    }

    #[test]
    fn test_validate_missing_profile() {
        let err = validate_create(shoot(None, Some(ncp("azure-dev")), "eu-west-1")).unwrap_err();
        let field_errors = err.field_errors();
        assert_eq!(field_errors[0].field, "spec.cloudProfile.name");
        assert_eq!(field_errors[0].error_type, FieldErrorType::NotFound);
    }

    #[test]
    fn test_validate_region_against_effective_spec() {
        validate_create(shoot(Some("aws"), None, "eu-west-1")).unwrap();
        validate_create(shoot(None, Some(ncp("aws-dev")), "us-east-1")).unwrap();

        let err = validate_create(shoot(Some("aws"), None, "us-east-1")).unwrap_err();
        let field_errors = err.field_errors();
        assert_eq!(field_errors[0].field, "spec.region");
        assert_eq!(field_errors[0].error_type, FieldErrorType::NotSupported);
        assert_eq!(field_errors[0].supported_values, vec!["eu-west-1".to_string()]);
    }

    #[test]
    fn test_update_to_descendant_namespaced_profile() {
        let old = shoot(Some("aws"), Some(cp("aws")), "eu-west-1");
        let new = shoot(Some("aws"), Some(ncp("aws-dev")), "eu-west-1");
        validate_update(old.clone(), new).unwrap();
        validate_update(old.clone(), old.clone()).unwrap();

        let err = validate_update(old.clone(), shoot(None, Some(cp("gcp")), "europe-west1"))
            .unwrap_err();
        assert_eq!(err.field_errors()[0].field, "spec.cloudProfile");

        let err = validate_update(old, shoot(None, Some(ncp("gcp-dev")), "europe-west1"))
            .unwrap_err();
        assert_eq!(err.field_errors()[0].field, "spec.cloudProfile");
    }

    #[test]
    fn test_update_aggregates_region_and_reference_errors() {
        let old = shoot(Some("aws"), None, "eu-west-1");
        let err = validate_update(old, shoot(None, Some(cp("gcp")), "eu-west-1")).unwrap_err();
        let fields: Vec<&str> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["spec.region", "spec.cloudProfile"]);
    }

    #[test]
    fn test_chain_runs_admit_then_validate() {
        let handler = Arc::new(plugin()) as Arc<dyn Interface>;
        let chain = ChainHandler::new(vec![(PLUGIN_NAME.to_string(), handler)]);
        let input = shoot(Some("aws"), None, "eu-west-1");
        let mut attributes = AttributesRecord::new_shoot(Operation::Create, input, None);
        chain.run(&mut attributes).unwrap();
        assert_eq!(attributes.get_shoot().unwrap().spec.cloud_profile, Some(cp("aws")));
    }

    #[test]
    fn test_status_subresource_is_ignored() {
        let attributes = AttributesRecord::new_shoot(Operation::Update, shoot(None, None, ""), None)
            .with_subresource("status");
        plugin().validate(&attributes).unwrap();
    }
}
