use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::flavors::FlavorRegistry;
use crate::models::{ComponentModel, ComponentType};

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

pub fn validate_stack(
    components: &BTreeMap<ComponentType, ComponentModel>,
    registry: &FlavorRegistry,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    for required in [ComponentType::Orchestrator, ComponentType::ArtifactStore] {
        if !components.contains_key(&required) {
            report
                .errors
                .push(format!("A stack requires an {}", required.label()));
        }
    }

    for (slot, component) in components {
        if component.component_type != *slot {
            report.errors.push(format!(
                "Component '{}' is a {} and cannot be used as the stack's {}",
                component.name,
                component.component_type.label(),
                slot.label()
            ));
        }
        if let Err(err) = registry.get(component.component_type, &component.flavor) {
            report.errors.push(format!(
                "Component '{}' uses an unknown flavor: {err}",
                component.name
            ));
        }
    }

    if let Some(orchestrator) = components.get(&ComponentType::Orchestrator) {
        report.merge(validate_locality(orchestrator, components, registry));
    }

    report
}

/// Remote orchestrators cannot reach state kept on this machine.
fn validate_locality(
    orchestrator: &ComponentModel,
    components: &BTreeMap<ComponentType, ComponentModel>,
    registry: &FlavorRegistry,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    let Ok(flavor) = registry.get(ComponentType::Orchestrator, &orchestrator.flavor) else {
        return report;
    };

    let skip = orchestrator
        .configuration
        .get("skip_local_validations")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let orchestrator_is_local = flavor.is_local(&orchestrator.configuration);
    let container_registry = components.get(&ComponentType::ContainerRegistry);
    let registry_is_local = container_registry.and_then(|component| {
        registry
            .get(component.component_type, &component.flavor)
            .ok()
            .map(|flavor| flavor.is_local(&component.configuration))
    });

    if orchestrator_is_local {
        if orchestrator.flavor == "kubeflow" && registry_is_local == Some(false) && !skip {
            report.errors.push(format!(
                "The '{}' orchestrator runs in a local cluster but the container registry is \
                 remote; use a 'localhost:<port>' registry",
                orchestrator.name
            ));
        }
        return report;
    }

    if container_registry.is_none() {
        report.errors.push(format!(
            "The remote '{}' orchestrator requires a container registry in the stack",
            orchestrator.name
        ));
    }

    for component in components.values() {
        if component.id == orchestrator.id {
            continue;
        }
        let Ok(component_flavor) = registry.get(component.component_type, &component.flavor) else {
            continue;
        };
        let local_state = component_flavor.uses_local_store;
        let local_registry = component.component_type == ComponentType::ContainerRegistry
            && component_flavor.is_local(&component.configuration);
        if !(local_state || local_registry) {
            continue;
        }
        let message = format!(
            "The '{}' {} is local and will not be reachable from the remote '{}' orchestrator; \
             use a non-local flavor of {}",
            component.name,
            component.component_type.label(),
            orchestrator.name,
            component.component_type.label()
        );
        if skip {
            report.warnings.push(message);
        } else {
            report.errors.push(format!(
                "{message}, or set skip_local_validations=true on the orchestrator"
            ));
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn component(kind: ComponentType, name: &str, flavor: &str, config: Value) -> ComponentModel {
        ComponentModel {
            id: Uuid::new_v4(),
            name: name.into(),
            component_type: kind,
            flavor: flavor.into(),
            configuration: config.as_object().cloned().unwrap_or_default(),
            user_id: None,
            workspace_id: Uuid::nil(),
            is_shared: false,
            created: Utc::now(),
            updated: Utc::now(),
        }
    }

    fn stack(items: Vec<ComponentModel>) -> BTreeMap<ComponentType, ComponentModel> {
        items.into_iter().map(|c| (c.component_type, c)).collect()
    }

    #[test]
    fn local_stack_is_valid() {
        let components = stack(vec![
            component(ComponentType::Orchestrator, "default", "local", json!({})),
            component(ComponentType::ArtifactStore, "default", "local", json!({})),
        ]);
        let report = validate_stack(&components, FlavorRegistry::builtin());
        assert!(report.is_ok(), "{:?}", report.errors);
    }

    #[test]
    fn missing_artifact_store_is_an_error() {
        let components = stack(vec![component(
            ComponentType::Orchestrator,
            "default",
            "local",
            json!({}),
        )]);
        let report = validate_stack(&components, FlavorRegistry::builtin());
        assert!(!report.is_ok());
        assert!(report.errors[0].contains("artifact store"));
    }

    #[test]
    fn remote_orchestrator_rejects_local_state() {
        let components = stack(vec![
            component(
                ComponentType::Orchestrator,
                "kfp",
                "kubeflow",
                json!({"kubernetes_context": "gke-prod", "skip_local_validations": false}),
            ),
            component(ComponentType::ArtifactStore, "default", "local", json!({})),
            component(
                ComponentType::ContainerRegistry,
                "gcr",
                "default",
                json!({"uri": "gcr.io/project"}),
            ),
        ]);
        let report = validate_stack(&components, FlavorRegistry::builtin());
        assert_eq!(report.errors.len(), 1, "{:?}", report.errors);
        assert!(report.errors[0].contains("skip_local_validations"));
    }

    #[test]
    fn skipping_local_validations_downgrades_to_warnings() {
        let components = stack(vec![
            component(
                ComponentType::Orchestrator,
                "kfp",
                "kubeflow",
                json!({"kubernetes_context": "gke-prod", "skip_local_validations": true}),
            ),
            component(ComponentType::ArtifactStore, "default", "local", json!({})),
            component(
                ComponentType::ContainerRegistry,
                "gcr",
                "default",
                json!({"uri": "gcr.io/project"}),
            ),
        ]);
        let report = validate_stack(&components, FlavorRegistry::builtin());
        assert!(report.is_ok(), "{:?}", report.errors);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn remote_orchestrator_needs_a_registry() {
        let components = stack(vec![
            component(
                ComponentType::Orchestrator,
                "argo",
                "argo",
                json!({"kubernetes_context": "eks"}),
            ),
            component(
                ComponentType::ArtifactStore,
                "s3",
                "s3",
                json!({"path": "s3://bucket"}),
            ),
        ]);
        let report = validate_stack(&components, FlavorRegistry::builtin());
        assert!(report.errors.iter().any(|e| e.contains("container registry")));
    }

    #[test]
    fn local_kubeflow_requires_local_registry() {
        let components = stack(vec![
            component(
                ComponentType::Orchestrator,
                "k3d",
                "kubeflow",
                json!({"kubernetes_context": "k3d-zenml"}),
            ),
            component(ComponentType::ArtifactStore, "default", "local", json!({})),
            component(
                ComponentType::ContainerRegistry,
                "gcr",
                "default",
                json!({"uri": "gcr.io/project"}),
            ),
        ]);
        let report = validate_stack(&components, FlavorRegistry::builtin());
        assert!(report.errors.iter().any(|e| e.contains("localhost")));
    }
}
