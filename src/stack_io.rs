//! Portable YAML export and import of stack definitions.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::{Client, ensure_valid};
use crate::error::{Result, StoreError};
use crate::models::{ComponentConfig, ComponentModel, ComponentType, StackModel, validate_name};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackExport {
    pub stack_name: String,
    pub zenml_version: String,
    pub components: BTreeMap<ComponentType, ComponentExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentExport {
    pub name: String,
    pub flavor: String,
    #[serde(default)]
    pub configuration: ComponentConfig,
}

impl From<&StackModel> for StackExport {
    fn from(stack: &StackModel) -> Self {
        Self {
            stack_name: stack.name.clone(),
            zenml_version: env!("CARGO_PKG_VERSION").to_string(),
            components: stack
                .components
                .iter()
                .map(|(kind, component)| {
                    (
                        *kind,
                        ComponentExport {
                            name: component.name.clone(),
                            flavor: component.flavor.clone(),
                            configuration: component.configuration.clone(),
                        },
                    )
                })
                .collect(),
        }
    }
}

/// Write the stack (the active one when `name` is `None`) to `path`.
pub fn export_stack(client: &Client, name: Option<&str>, path: &Path) -> Result<StackExport> {
    let stack = client.get_stack(name)?;
    let export = StackExport::from(&stack);

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    serde_yaml::to_writer(file, &export)?;
    info!(stack = %stack.name, path = %path.display(), "Exported stack");
    Ok(export)
}

pub fn read_export(path: &Path) -> Result<StackExport> {
    let file = File::open(path)?;
    let export: StackExport = serde_yaml::from_reader(file)?;
    for (slot, component) in &export.components {
        if component.name.trim().is_empty() {
            return Err(StoreError::validation(format!(
                "The {} entry in {} has no name",
                slot.label(),
                path.display()
            )));
        }
    }
    Ok(export)
}

/// Register the stack described in `path`, reusing identical components.
///
/// Nothing is written until the whole stack has been planned and validated.
/// Components created for the import are removed again if the stack itself
/// cannot be registered.
pub fn import_stack(client: &Client, path: &Path, name: Option<&str>) -> Result<StackModel> {
    let export = read_export(path)?;
    if export.zenml_version != env!("CARGO_PKG_VERSION") {
        warn!(
            file_version = %export.zenml_version,
            "Stack was exported by a different version; importing anyway"
        );
    }
    let stack_name = name.unwrap_or(&export.stack_name);
    validate_name("Stack", stack_name)?;
    match client.get_stack(Some(stack_name)) {
        Ok(existing) if existing.name == stack_name => {
            return Err(StoreError::already_exists("stack", stack_name));
        }
        Ok(_) | Err(StoreError::Ambiguous { .. }) => {}
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err),
    }

    let workspace = client.active_workspace()?;
    let user = client.active_user()?;
    let mut plan = BTreeMap::new();
    for (kind, component) in &export.components {
        plan.insert(*kind, plan_component(client, *kind, component)?);
    }
    let candidates: BTreeMap<_, _> = plan
        .iter()
        .map(|(kind, planned)| (*kind, planned.candidate(*kind, workspace.id, user.id)))
        .collect();
    ensure_valid(stack_name, client.validate_components(&candidates))?;

    let mut created = Vec::new();
    let mut selection = BTreeMap::new();
    for (kind, planned) in plan {
        match planned {
            Planned::Reuse(existing) => {
                selection.insert(kind, existing.name);
            }
            Planned::Create {
                name,
                flavor,
                configuration,
            } => {
                match client.register_component(kind, &name, &flavor, configuration, false) {
                    Ok(component) => created.push(component),
                    Err(err) => return Err(rollback(client, &created, err)),
                }
                selection.insert(kind, name);
            }
        }
    }

    client
        .register_stack(stack_name, "", &selection, false)
        .map_err(|err| rollback(client, &created, err))
}

enum Planned {
    Reuse(ComponentModel),
    Create {
        name: String,
        flavor: String,
        configuration: ComponentConfig,
    },
}

impl Planned {
    /// The component the stack would hold, used to validate before writing.
    fn candidate(&self, kind: ComponentType, workspace_id: Uuid, user_id: Uuid) -> ComponentModel {
        match self {
            Planned::Reuse(existing) => existing.clone(),
            Planned::Create {
                name,
                flavor,
                configuration,
            } => {
                let now = Utc::now();
                ComponentModel {
                    id: Uuid::new_v4(),
                    name: name.clone(),
                    component_type: kind,
                    flavor: flavor.clone(),
                    configuration: configuration.clone(),
                    user_id: Some(user_id),
                    workspace_id,
                    is_shared: false,
                    created: now,
                    updated: now,
                }
            }
        }
    }
}

/// Pick an identical existing component or the first free `<name>_<n>`.
fn plan_component(
    client: &Client,
    kind: ComponentType,
    component: &ComponentExport,
) -> Result<Planned> {
    let flavor = client.get_flavor(kind, &component.flavor)?;
    let configuration = flavor.validate_config(&component.configuration)?;

    let mut candidate = component.name.clone();
    let mut suffix = 0;
    loop {
        match client.get_component(kind, &candidate) {
            Ok(existing)
                if existing.name == candidate
                    && existing.flavor == component.flavor
                    && existing.configuration == configuration =>
            {
                info!(component = %candidate, kind = %kind, "Reusing existing component");
                return Ok(Planned::Reuse(existing));
            }
            Ok(existing) if existing.name == candidate => {
                suffix += 1;
                candidate = format!("{}_{suffix}", component.name);
            }
            Ok(_) => break,
            Err(err) if err.is_not_found() => break,
            Err(StoreError::Ambiguous { .. }) => break,
            Err(err) => return Err(err),
        }
    }

    Ok(Planned::Create {
        name: candidate,
        flavor: component.flavor.clone(),
        configuration,
    })
}

fn rollback(client: &Client, created: &[ComponentModel], err: StoreError) -> StoreError {
    for component in created.iter().rev() {
        if let Err(cleanup) = client.discard_component(component) {
            warn!(component = %component.name, error = %cleanup, "Failed to remove imported component");
        }
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn export_yaml_uses_type_keys() {
        let export = StackExport {
            stack_name: "prod".into(),
            zenml_version: "0.1.0".into(),
            components: BTreeMap::from([(
                ComponentType::ArtifactStore,
                ComponentExport {
                    name: "bucket".into(),
                    flavor: "s3".into(),
                    configuration: json!({"path": "s3://bucket"})
                        .as_object()
                        .cloned()
                        .unwrap(),
                },
            )]),
        };
        let yaml = serde_yaml::to_string(&export).unwrap();
        assert!(yaml.contains("artifact_store:"));
        assert!(yaml.contains("path: s3://bucket"));
        let parsed: StackExport = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, export);
    }

    #[test]
    fn missing_configuration_defaults_to_empty() {
        let yaml = "stack_name: s\nzenml_version: 0.1.0\ncomponents:\n  orchestrator:\n    name: o\n    flavor: local\n";
        let parsed: StackExport = serde_yaml::from_str(yaml).unwrap();
        assert!(parsed.components[&ComponentType::Orchestrator]
            .configuration
            .is_empty());
    }
}
