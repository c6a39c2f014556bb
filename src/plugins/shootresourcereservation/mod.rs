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

//! ShootResourceReservation admission controller.
//!
//! This admission controller injects kubelet `kubeReserved` values into shoots.
//! With the GKE formula enabled, every worker pool gets a reservation sized to
//! its machine type. Otherwise, or when the shoot already carries a global
//! `kubeReserved`, static defaults are applied to the global kubelet config.
//! Fields the user has set are never overwritten.

use crate::admission::config::decode_plugin_config;
use crate::admission::errors::{field_invalid, FieldErrorList, FieldPath};
use crate::admission::{
    AdmissionError, AdmissionResult, Attributes, Handler, Interface, MutationInterface,
    Operation, Plugins,
};
use crate::api::core::{LabelSelector, Quantity};
use crate::api::gardener::{KubeletConfigReserved, MachineType, Shoot, GROUP_NAME, KIND_SHOOT};
use crate::cloudprofile::{get_cloud_profile_spec, CloudProfileListers};
use crate::plugins::cloud_profile_lookup_error;
use crate::reservation::{calculate_reservation, MachineCapacity, RESERVED_PIDS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info};

/// Plugin name for the ShootResourceReservation admission controller.
pub const PLUGIN_NAME: &str = "ShootResourceReservation";

const DEFAULT_CPU_MILLI: i64 = 80;
const DEFAULT_MEMORY_BYTES: i64 = 1024 * 1024 * 1024;

/// Register the ShootResourceReservation plugin with the plugin registry.
pub fn register(plugins: &mut Plugins, listers: &CloudProfileListers) {
    let listers = listers.clone();
    plugins.register(PLUGIN_NAME, move |config: Option<&mut dyn Read>| {
        let config: Configuration = decode_plugin_config(PLUGIN_NAME, config)?;
        Ok(Arc::new(Plugin::new(config, listers.clone())?) as Arc<dyn Interface>)
    });
}

/// Configuration of the plugin as found in the admission configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(rename = "useGKEFormula", default)]
    pub use_gke_formula: bool,
    /// Restricts the formula to shoots whose labels match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
}

impl Configuration {
    pub fn validate(&self) -> AdmissionResult<()> {
        if let Some(selector) = &self.selector {
            selector.validate().map_err(|e| {
                AdmissionError::bad_request(format!(
                    "invalid configuration for {}: selector: {}",
                    PLUGIN_NAME, e
                ))
            })?;
        }
        Ok(())
    }
}

/// Static reservation used when the formula does not apply.
pub fn default_kube_reserved() -> KubeletConfigReserved {
    KubeletConfigReserved {
        cpu: Some(Quantity::from_milli(DEFAULT_CPU_MILLI)),
        memory: Some(Quantity::from_binary(DEFAULT_MEMORY_BYTES)),
        ephemeral_storage: None,
        pid: Some(Quantity::from_decimal(RESERVED_PIDS)),
    }
}

/// Plugin is an implementation of the ShootResourceReservation admission controller.
pub struct Plugin {
    handler: Handler,
    config: Configuration,
    listers: CloudProfileListers,
}

impl Plugin {
    pub fn new(config: Configuration, listers: CloudProfileListers) -> AdmissionResult<Self> {
        config.validate()?;
        Ok(Self {
            handler: Handler::new_create_update(),
            config,
            listers,
        })
    }

    fn should_ignore(&self, attributes: &dyn Attributes) -> bool {
        !attributes.get_resource().is(GROUP_NAME, "shoots")
            || !attributes.get_subresource().is_empty()
    }

    fn formula_applies(&self, shoot: &Shoot) -> bool {
        if !self.config.use_gke_formula {
            return false;
        }
        self.config
            .selector
            .as_ref()
            .map_or(true, |selector| selector.matches(&shoot.metadata.labels))
    }

    /// Reservations for every worker, or the aggregated errors. Nothing is mutated here.
    fn worker_reservations(
        &self,
        shoot: &Shoot,
        namespace: &str,
    ) -> AdmissionResult<Vec<(usize, KubeletConfigReserved)>> {
        let spec = get_cloud_profile_spec(shoot, namespace, &self.listers)
            .map_err(|e| cloud_profile_lookup_error(shoot, e))?;
        let machine_types: HashMap<&str, &MachineType> = spec
            .machine_types
            .iter()
            .map(|t| (t.name.as_str(), t))
            .collect();

        let workers_path = FieldPath::new(&["spec", "provider", "workers"]);
        let mut errors = FieldErrorList::new();
        let mut reservations = Vec::with_capacity(shoot.spec.provider.workers.len());

        for (index, worker) in shoot.spec.provider.workers.iter().enumerate() {
            let Some(machine_type) = machine_types.get(worker.machine.type_.as_str()) else {
                errors.push(field_invalid(
                    &workers_path.index(index).child("machine").child("type"),
                    &worker.machine.type_,
                    "worker machine type unknown",
                ));
                continue;
            };
            let capacity = MachineCapacity::from_machine_type(machine_type).map_err(|e| {
                AdmissionError::internal_error(format!(
                    "machine type {:?} has an invalid capacity: {}",
                    machine_type.name, e
                ))
            })?;
            let reserved = calculate_reservation(capacity).to_kube_reserved();
            debug!(
                shoot = %shoot.metadata.name,
                worker = %worker.name,
                machine_type = %machine_type.name,
                cpu = ?reserved.cpu,
                memory = ?reserved.memory,
                "computed kubelet reservation"
            );
            reservations.push((index, reserved));
        }

        if !errors.is_empty() {
            return Err(AdmissionError::invalid(
                KIND_SHOOT,
                &shoot.metadata.name,
                errors,
            ));
        }
        Ok(reservations)
    }
}

impl Interface for Plugin {
    fn handles(&self, operation: Operation) -> bool {
        self.handler.handles(operation)
    }

    fn as_mutation(&self) -> Option<&dyn MutationInterface> {
        Some(self)
    }
}

impl MutationInterface for Plugin {
    fn admit(&self, attributes: &mut dyn Attributes) -> AdmissionResult<()> {
        if self.should_ignore(attributes) {
            return Ok(());
        }

        let namespace = attributes.get_namespace().to_string();
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

        if shoot.kube_reserved().is_some() {
            debug!(
                shoot = %shoot.metadata.name,
                "global kubeReserved set, completing it with static defaults"
            );
            shoot.kube_reserved_mut().fill_unset(&default_kube_reserved());
            return Ok(());
        }

        if !self.formula_applies(shoot) {
            debug!(
                shoot = %shoot.metadata.name,
                "reservation formula not applicable, using static defaults"
            );
            shoot.kube_reserved_mut().fill_unset(&default_kube_reserved());
            return Ok(());
        }

        let reservations = self.worker_reservations(shoot, &namespace)?;
        for (index, reserved) in reservations {
            shoot.spec.provider.workers[index]
                .kube_reserved_mut()
                .fill_unset(&reserved);
        }
        info!(
            shoot = %shoot.metadata.name,
            workers = shoot.spec.provider.workers.len(),
            "injected per-worker kubelet reservations"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{AttributesRecord, FieldErrorType};
    use crate::api::core::ObjectMeta;
    use crate::api::gardener::{
        CloudProfile, CloudProfileReference, CloudProfileSpec, KubeletConfig,
        NamespacedCloudProfile, NamespacedCloudProfileSpec, NamespacedCloudProfileStatus, Worker,
        KIND_CLOUD_PROFILE, KIND_NAMESPACED_CLOUD_PROFILE,
    };
    use crate::listers::InMemoryStore;
    use serde_json::json;

    const NAMESPACE: &str = "garden-dev";

    fn q(s: &str) -> Quantity {
        Quantity::parse(s).unwrap()
    }

    fn machine_type(name: &str, cpu: &str, memory: &str) -> MachineType {
        MachineType {
            name: name.to_string(),
            cpu: q(cpu),
            memory: q(memory),
            ..Default::default()
        }
    }

    fn listers() -> CloudProfileListers {
        let gcp = CloudProfile {
            metadata: ObjectMeta::new("gcp"),
            spec: CloudProfileSpec {
                type_: "gcp".to_string(),
                machine_types: vec![
                    machine_type("n1-standard-2", "2", "5Gi"),
                    machine_type("n1-standard-8", "8", "32Gi"),
                ],
                ..Default::default()
            },
        };
        let custom = NamespacedCloudProfile {
            metadata: ObjectMeta::namespaced(NAMESPACE, "gcp-custom"),
            spec: NamespacedCloudProfileSpec::new(CloudProfileReference::CloudProfile(
                "gcp".to_string(),
            )),
            status: NamespacedCloudProfileStatus {
                cloud_profile_spec: CloudProfileSpec {
                    machine_types: vec![machine_type("custom-4", "4", "16Gi")],
                    ..Default::default()
                },
                observed_generation: 1,
            },
        };
        CloudProfileListers::new(
            Arc::new(InMemoryStore::with_objects(KIND_CLOUD_PROFILE, vec![gcp])),
            Arc::new(InMemoryStore::with_objects(
                KIND_NAMESPACED_CLOUD_PROFILE,
                vec![custom],
            )),
        )
    }

    fn plugin(config: Configuration) -> Plugin {
        Plugin::new(config, listers()).unwrap()
    }

    fn formula() -> Configuration {
        Configuration {
            use_gke_formula: true,
            selector: None,
        }
    }

    fn shoot(workers: &[&str]) -> Shoot {
        let mut shoot = Shoot {
            metadata: ObjectMeta::namespaced(NAMESPACE, "dev"),
            ..Default::default()
        };
        shoot.spec.cloud_profile_name = Some("gcp".to_string());
        shoot.spec.provider.workers = workers
            .iter()
            .enumerate()
            .map(|(i, machine_type)| Worker::new(&format!("pool-{}", i), machine_type))
            .collect();
        shoot
    }

    fn admit(plugin: &Plugin, shoot: Shoot) -> (AdmissionResult<()>, Shoot) {
        let mut attributes = AttributesRecord::new_shoot(Operation::Create, shoot, None);
        let result = plugin.admit(&mut attributes);
        (result, attributes.get_shoot().unwrap().clone())
    }

    fn reserved(cpu: &str, memory: &str, pid: &str) -> KubeletConfigReserved {
        KubeletConfigReserved {
            cpu: Some(q(cpu)),
            memory: Some(q(memory)),
            ephemeral_storage: None,
            pid: Some(q(pid)),
        }
    }

    #[test]
    fn test_configuration_decoding() {
        let raw = json!({
            "useGKEFormula": true,
            "selector": {"matchLabels": {"reservation": "gke"}}
        })
        .to_string();
        let mut reader = raw.as_bytes();
        let config: Configuration =
            decode_plugin_config(PLUGIN_NAME, Some(&mut reader as &mut dyn Read)).unwrap();
        assert!(config.use_gke_formula);
        assert_eq!(
            config.selector,
            Some(LabelSelector::from_labels(&[("reservation", "gke")]))
        );

        let config: Configuration = decode_plugin_config(PLUGIN_NAME, None).unwrap();
        assert_eq!(config, Configuration::default());
    }

    #[test]
    fn test_default_kube_reserved_rendering() {
        assert_eq!(default_kube_reserved(), reserved("80m", "1Gi", "20k"));
    }

    #[test]
    fn test_formula_injects_per_worker_reservation() {
        let (result, shoot) = admit(&plugin(formula()), shoot(&["n1-standard-2", "n1-standard-8"]));
        result.unwrap();

        assert_eq!(
            shoot.spec.provider.workers[0].kube_reserved(),
            Some(&reserved("70m", "1288490188", "20k"))
        );
        assert_eq!(
            shoot.spec.provider.workers[1].kube_reserved(),
            Some(&reserved("90m", "3822520888", "20k"))
        );
        assert!(shoot.kube_reserved().is_none(), "global kubeReserved stays unset");
    }

    #[test]
    fn test_formula_keeps_user_values() {
        let mut input = shoot(&["n1-standard-2"]);
        input.spec.provider.workers[0].kube_reserved_mut().cpu = Some(q("250m"));

        let (result, shoot) = admit(&plugin(formula()), input);
        result.unwrap();
        assert_eq!(
            shoot.spec.provider.workers[0].kube_reserved(),
            Some(&reserved("250m", "1288490188", "20k"))
        );
    }

    #[test]
    fn test_injection_is_idempotent() {
        let plugin = plugin(formula());
        let (result, once) = admit(&plugin, shoot(&["n1-standard-2", "n1-standard-8"]));
        result.unwrap();
        let (result, twice) = admit(&plugin, once.clone());
        result.unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_global_kube_reserved_suppresses_formula() {
        let mut input = shoot(&["n1-standard-2"]);
        input.spec.kubernetes.kubelet = Some(KubeletConfig {
            kube_reserved: Some(KubeletConfigReserved {
                memory: Some(q("2Gi")),
                ..Default::default()
            }),
            ..Default::default()
        });

        let (result, shoot) = admit(&plugin(formula()), input);
        result.unwrap();
        assert_eq!(shoot.kube_reserved(), Some(&reserved("80m", "2Gi", "20k")));
        assert!(shoot.spec.provider.workers[0].kube_reserved().is_none());
    }

    #[test]
    fn test_formula_disabled_applies_static_defaults() {
        let (result, shoot) = admit(&plugin(Configuration::default()), shoot(&["n1-standard-2"]));
        result.unwrap();
        assert_eq!(shoot.kube_reserved(), Some(&reserved("80m", "1Gi", "20k")));
        assert!(shoot.spec.provider.workers[0].kube_reserved().is_none());
    }

    #[test]
    fn test_selector_restricts_formula() {
        let config = Configuration {
            use_gke_formula: true,
            selector: Some(LabelSelector::from_labels(&[("reservation", "gke")])),
        };
        let plugin = plugin(config);

        let (result, shoot_without_label) = admit(&plugin, shoot(&["n1-standard-2"]));
        result.unwrap();
        assert_eq!(
            shoot_without_label.kube_reserved(),
            Some(&reserved("80m", "1Gi", "20k"))
        );
        assert!(shoot_without_label.spec.provider.workers[0].kube_reserved().is_none());

        let mut labelled = shoot(&["n1-standard-2"]);
        labelled.metadata = labelled.metadata.with_label("reservation", "gke");
        let (result, shoot_with_label) = admit(&plugin, labelled);
        result.unwrap();
        assert!(shoot_with_label.kube_reserved().is_none());
        assert_eq!(
            shoot_with_label.spec.provider.workers[0].kube_reserved(),
            Some(&reserved("70m", "1288490188", "20k"))
        );
    }

    #[test]
    fn test_unknown_machine_types_are_aggregated_without_mutation() {
        let input = shoot(&["n1-standard-2", "m5.large", "n1-standard-8", "c5.xlarge"]);
        let (result, shoot) = admit(&plugin(formula()), input.clone());

        let err = result.unwrap_err();
        let field_errors = err.field_errors();
        assert_eq!(field_errors.len(), 2);
        assert_eq!(field_errors[0].field, "spec.provider.workers[1].machine.type");
        assert_eq!(field_errors[0].error_type, FieldErrorType::Invalid);
        assert_eq!(field_errors[0].detail, "worker machine type unknown");
        assert_eq!(field_errors[1].field, "spec.provider.workers[3].machine.type");
        assert_eq!(shoot, input, "no worker may be mutated");
    }

    #[test]
    fn test_namespaced_cloud_profile_is_resolved() {
        let mut input = shoot(&["custom-4"]);
        input.spec.cloud_profile_name = None;
        input.spec.cloud_profile = Some(CloudProfileReference::NamespacedCloudProfile(
            "gcp-custom".to_string(),
        ));

        let (result, shoot) = admit(&plugin(formula()), input);
        result.unwrap();
        assert_eq!(
            shoot.spec.provider.workers[0].kube_reserved(),
            Some(&reserved("80m", "2791728742", "20k"))
        );
    }

    #[test]
    fn test_namespaced_cloud_profile_uses_request_namespace() {
        let mut input = shoot(&["custom-4"]);
        input.spec.cloud_profile_name = None;
        input.spec.cloud_profile = Some(CloudProfileReference::NamespacedCloudProfile(
            "gcp-custom".to_string(),
        ));

        let mut attributes = AttributesRecord::new_shoot(Operation::Create, input, None);
        attributes.get_shoot_mut().unwrap().metadata.namespace = String::new();
        plugin(formula()).admit(&mut attributes).unwrap();

        assert_eq!(
            attributes.get_shoot().unwrap().spec.provider.workers[0].kube_reserved(),
            Some(&reserved("80m", "2791728742", "20k"))
        );
    }

    #[test]
    fn test_missing_cloud_profile_is_field_error() {
        let mut input = shoot(&["n1-standard-2"]);
        input.spec.cloud_profile_name = Some("azure".to_string());

        let (result, _) = admit(&plugin(formula()), input);
        let err = result.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.field_errors()[0].field, "spec.cloudProfileName");
        assert_eq!(err.field_errors()[0].error_type, FieldErrorType::NotFound);
    }

    #[test]
    fn test_subresource_and_other_resources_are_ignored() {
        let plugin = plugin(formula());
        let input = shoot(&["n1-standard-2"]);

        let mut status = AttributesRecord::new_shoot(Operation::Update, input.clone(), None)
            .with_subresource("status");
        plugin.admit(&mut status).unwrap();
        assert_eq!(status.get_shoot(), Some(&input));
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        let raw = json!({
            "useGKEFormula": true,
            "selector": {"matchExpressions": [{"key": "a", "operator": "In", "values": []}]}
        });
        let mut plugins = Plugins::new();
        register(&mut plugins, &listers());
        let bytes = raw.to_string();
        let mut reader = bytes.as_bytes();
        let result = plugins.new_from_plugins(PLUGIN_NAME, Some(&mut reader));
        assert!(matches!(result, Err(AdmissionError::BadRequest(_))));
    }

    #[test]
    fn test_handles_create_and_update() {
        let plugin = plugin(formula());
        assert!(plugin.handles(Operation::Create));
        assert!(plugin.handles(Operation::Update));
        assert!(!plugin.handles(Operation::Delete));
        assert!(!plugin.handles(Operation::Connect));
    }
}
