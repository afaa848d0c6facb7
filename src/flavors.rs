//! Built-in component flavors and their configuration schemas.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::models::{ComponentConfig, ComponentType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Bool,
    Integer,
    StringList,
}

impl FieldKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::StringList => value
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false),
        }
    }

    /// Coerce a CLI `key=value` string into a JSON value of this kind.
    pub fn parse(&self, raw: &str) -> Option<Value> {
        match self {
            FieldKind::String => Some(Value::String(raw.to_string())),
            FieldKind::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(Value::Bool(true)),
                "false" | "0" | "no" => Some(Value::Bool(false)),
                _ => None,
            },
            FieldKind::Integer => raw.parse::<i64>().ok().map(Value::from),
            FieldKind::StringList => Some(Value::Array(
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| Value::String(item.to_string()))
                    .collect(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigField {
    pub key: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ConfigField {
    fn required(key: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            kind,
            required: true,
            default: None,
        }
    }

    fn optional(key: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            kind,
            required: false,
            default: None,
        }
    }

    fn with_default(key: &'static str, kind: FieldKind, default: Value) -> Self {
        Self {
            key,
            kind,
            required: false,
            default: Some(default),
        }
    }
}

/// How a flavor decides whether a configured component runs on this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Locality {
    Local,
    Remote,
    /// Local when the string field starts with the given prefix.
    LocalIfPrefix(&'static str, &'static str),
}

#[derive(Debug, Clone, Serialize)]
pub struct Flavor {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    pub integration: &'static str,
    pub description: &'static str,
    pub fields: Vec<ConfigField>,
    /// Persists state under `local_stores/<component-id>/`.
    pub uses_local_store: bool,
    pub locality: Locality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_scheme: Option<&'static str>,
}

impl Flavor {
    pub fn field(&self, key: &str) -> Option<&ConfigField> {
        self.fields.iter().find(|field| field.key == key)
    }

    pub fn is_local(&self, config: &ComponentConfig) -> bool {
        match self.locality {
            Locality::Local => true,
            Locality::Remote => false,
            Locality::LocalIfPrefix(key, prefix) => config
                .get(key)
                .and_then(Value::as_str)
                .map(|value| value.starts_with(prefix))
                .unwrap_or(false),
        }
    }

    /// Check `config` against the schema and return it with defaults filled.
    pub fn validate_config(&self, config: &ComponentConfig) -> Result<ComponentConfig> {
        let mut validated = config.clone();

        for key in config.keys() {
            if self.field(key).is_none() {
                let known: Vec<_> = self.fields.iter().map(|f| f.key).collect();
                return Err(StoreError::invalid_config(format!(
                    "Flavor '{}' of {} has no attribute '{key}'. Known attributes: {}",
                    self.name,
                    self.component_type.label(),
                    if known.is_empty() {
                        "none".to_string()
                    } else {
                        known.join(", ")
                    }
                )));
            }
        }

        for field in &self.fields {
            match validated.get(field.key) {
                Some(value) if !field.kind.accepts(value) => {
                    return Err(StoreError::invalid_config(format!(
                        "Attribute '{}' of flavor '{}' expects a {:?} value, got {value}",
                        field.key, self.name, field.kind
                    )));
                }
                Some(_) => {}
                None if field.required => {
                    return Err(StoreError::invalid_config(format!(
                        "Flavor '{}' of {} requires attribute '{}'",
                        self.name,
                        self.component_type.label(),
                        field.key
                    )));
                }
                None => {
                    if let Some(default) = &field.default {
                        validated.insert(field.key.to_string(), default.clone());
                    }
                }
            }
        }

        if let Some(scheme) = self.path_scheme
            && let Some(path) = validated.get("path").and_then(Value::as_str)
            && !path.starts_with(scheme)
        {
            return Err(StoreError::invalid_config(format!(
                "Path '{path}' of flavor '{}' must start with '{scheme}'",
                self.name
            )));
        }

        Ok(validated)
    }
}

pub struct FlavorRegistry {
    flavors: BTreeMap<(ComponentType, &'static str), Flavor>,
}

impl Default for FlavorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FlavorRegistry {
    pub fn new() -> Self {
        Self {
            flavors: BTreeMap::new(),
        }
    }

    /// Shared registry holding the built-in flavors.
    pub fn builtin() -> &'static FlavorRegistry {
        static INSTANCE: Lazy<FlavorRegistry> = Lazy::new(|| {
            let mut registry = FlavorRegistry::new();
            register_defaults(&mut registry);
            registry
        });
        &INSTANCE
    }

    pub fn register(&mut self, flavor: Flavor) {
        self.flavors
            .insert((flavor.component_type, flavor.name), flavor);
    }

    pub fn get(&self, component_type: ComponentType, name: &str) -> Result<&Flavor> {
        self.flavors
            .iter()
            .find(|((kind, flavor), _)| *kind == component_type && *flavor == name)
            .map(|(_, flavor)| flavor)
            .ok_or_else(|| StoreError::not_found("flavor", format!("{component_type}/{name}")))
    }

    pub fn list(&self, component_type: Option<ComponentType>) -> Vec<&Flavor> {
        self.flavors
            .values()
            .filter(|flavor| component_type.is_none_or(|kind| flavor.component_type == kind))
            .collect()
    }

    pub fn known_flavors(&self, component_type: ComponentType) -> Vec<&'static str> {
        self.flavors
            .keys()
            .filter(|(kind, _)| *kind == component_type)
            .map(|(_, name)| *name)
            .collect()
    }
}

fn flavor(
    name: &'static str,
    component_type: ComponentType,
    integration: &'static str,
    description: &'static str,
    fields: Vec<ConfigField>,
) -> Flavor {
    Flavor {
        name,
        component_type,
        integration,
        description,
        fields,
        uses_local_store: false,
        locality: Locality::Remote,
        path_scheme: None,
    }
}

fn local(mut flavor: Flavor, uses_local_store: bool) -> Flavor {
    flavor.locality = Locality::Local;
    flavor.uses_local_store = uses_local_store;
    flavor
}

fn remote_store(name: &'static str, integration: &'static str, scheme: &'static str) -> Flavor {
    let mut flavor = flavor(
        name,
        ComponentType::ArtifactStore,
        integration,
        "Artifact store backed by remote object storage",
        vec![ConfigField::required("path", FieldKind::String)],
    );
    flavor.path_scheme = Some(scheme);
    flavor
}

pub fn register_defaults(registry: &mut FlavorRegistry) {
    use ComponentType::*;
    use FieldKind::{Bool, Integer, StringList};

    registry.register(local(
        flavor(
            "local",
            Orchestrator,
            "built-in",
            "Runs pipeline steps sequentially in the current process",
            vec![],
        ),
        false,
    ));
    registry.register(local(
        flavor(
            "local_docker",
            Orchestrator,
            "built-in",
            "Runs each step in a local Docker container",
            vec![ConfigField::optional("run_args", StringList)],
        ),
        false,
    ));
    let mut kubeflow = flavor(
        "kubeflow",
        Orchestrator,
        "kubeflow",
        "Runs pipelines on Kubeflow Pipelines",
        vec![
            ConfigField::required("kubernetes_context", FieldKind::String),
            ConfigField::with_default("skip_local_validations", Bool, Value::Bool(false)),
            ConfigField::with_default("skip_cluster_provisioning", Bool, Value::Bool(false)),
            ConfigField::with_default("kubeflow_pipelines_ui_port", Integer, Value::from(8080)),
        ],
    );
    kubeflow.locality = Locality::LocalIfPrefix("kubernetes_context", "k3d-");
    registry.register(kubeflow);
    registry.register(flavor(
        "argo",
        Orchestrator,
        "argo",
        "Runs pipelines as Argo workflows",
        vec![
            ConfigField::required("kubernetes_context", FieldKind::String),
            ConfigField::with_default("kubernetes_namespace", FieldKind::String, Value::from("argo")),
            ConfigField::with_default("argo_ui_port", Integer, Value::from(8484)),
            ConfigField::with_default("skip_ui_daemon_provisioning", Bool, Value::Bool(false)),
            ConfigField::with_default("skip_local_validations", Bool, Value::Bool(false)),
        ],
    ));

    registry.register(local(
        flavor(
            "local",
            ArtifactStore,
            "built-in",
            "Stores artifacts on the local filesystem",
            vec![ConfigField::optional("path", FieldKind::String)],
        ),
        true,
    ));
    registry.register(remote_store("s3", "s3", "s3://"));
    registry.register(remote_store("gcp", "gcp", "gs://"));
    registry.register(remote_store("azure", "azure", "az://"));

    registry.register(local(
        flavor(
            "sqlite",
            MetadataStore,
            "built-in",
            "Tracks pipeline metadata in a local SQLite file",
            vec![ConfigField::optional("uri", FieldKind::String)],
        ),
        true,
    ));

    registry.register(local(
        flavor(
            "local",
            SecretsManager,
            "built-in",
            "Keeps secrets in a local YAML file",
            vec![ConfigField::optional("secrets_file", FieldKind::String)],
        ),
        true,
    ));

    let mut registry_flavor = flavor(
        "default",
        ContainerRegistry,
        "built-in",
        "Any container registry reachable by URI",
        vec![ConfigField::required("uri", FieldKind::String)],
    );
    registry_flavor.locality = Locality::LocalIfPrefix("uri", "localhost:");
    registry.register(registry_flavor);

    registry.register(local(
        flavor(
            "local",
            ImageBuilder,
            "built-in",
            "Builds images with the local Docker client",
            vec![],
        ),
        false,
    ));
    registry.register(flavor(
        "kaniko",
        ImageBuilder,
        "kaniko",
        "Builds images inside a Kubernetes cluster with Kaniko",
        vec![
            ConfigField::required("kubernetes_context", FieldKind::String),
            ConfigField::with_default(
                "kubernetes_namespace",
                FieldKind::String,
                Value::from("zenml-kaniko"),
            ),
            ConfigField::with_default(
                "executor_image",
                FieldKind::String,
                Value::from("gcr.io/kaniko-project/executor:v1.9.1"),
            ),
            ConfigField::optional("executor_args", StringList),
        ],
    ));

    registry.register(flavor(
        "great_expectations",
        DataValidator,
        "great_expectations",
        "Validates data with Great Expectations suites",
        vec![
            ConfigField::optional("context_root_dir", FieldKind::String),
            ConfigField::with_default("configure_zenml_stores", Bool, Value::Bool(false)),
        ],
    ));
    registry.register(flavor(
        "whylogs",
        DataValidator,
        "whylogs",
        "Profiles data with whylogs, optionally uploading to WhyLabs",
        vec![
            ConfigField::optional("whylabs_default_org_id", FieldKind::String),
            ConfigField::optional("whylabs_api_key", FieldKind::String),
            ConfigField::optional("whylabs_default_dataset_id", FieldKind::String),
        ],
    ));

    registry.register(flavor(
        "mlflow",
        ExperimentTracker,
        "mlflow",
        "Tracks experiments in an MLflow tracking server",
        vec![
            ConfigField::optional("tracking_uri", FieldKind::String),
            ConfigField::optional("tracking_username", FieldKind::String),
            ConfigField::optional("tracking_password", FieldKind::String),
        ],
    ));

    registry.register(flavor(
        "slack",
        Alerter,
        "slack",
        "Posts pipeline alerts to a Slack channel",
        vec![
            ConfigField::required("slack_token", FieldKind::String),
            ConfigField::optional("default_slack_channel_id", FieldKind::String),
        ],
    ));
}
