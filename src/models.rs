use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Result, StoreError};

pub const STR_FIELD_MAX_LENGTH: usize = 255;
pub const DEFAULT_NAME: &str = "default";
pub const DEFAULT_ADMIN_ROLE: &str = "admin";
pub const DEFAULT_GUEST_ROLE: &str = "guest";

/// Free-form component configuration, stored as a JSON object.
pub type ComponentConfig = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Orchestrator,
    ArtifactStore,
    MetadataStore,
    ContainerRegistry,
    SecretsManager,
    DataValidator,
    ExperimentTracker,
    StepOperator,
    ModelDeployer,
    FeatureStore,
    Alerter,
    Annotator,
    ImageBuilder,
}

impl ComponentType {
    pub const ALL: [ComponentType; 13] = [
        ComponentType::Orchestrator,
        ComponentType::ArtifactStore,
        ComponentType::MetadataStore,
        ComponentType::ContainerRegistry,
        ComponentType::SecretsManager,
        ComponentType::DataValidator,
        ComponentType::ExperimentTracker,
        ComponentType::StepOperator,
        ComponentType::ModelDeployer,
        ComponentType::FeatureStore,
        ComponentType::Alerter,
        ComponentType::Annotator,
        ComponentType::ImageBuilder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Orchestrator => "orchestrator",
            ComponentType::ArtifactStore => "artifact_store",
            ComponentType::MetadataStore => "metadata_store",
            ComponentType::ContainerRegistry => "container_registry",
            ComponentType::SecretsManager => "secrets_manager",
            ComponentType::DataValidator => "data_validator",
            ComponentType::ExperimentTracker => "experiment_tracker",
            ComponentType::StepOperator => "step_operator",
            ComponentType::ModelDeployer => "model_deployer",
            ComponentType::FeatureStore => "feature_store",
            ComponentType::Alerter => "alerter",
            ComponentType::Annotator => "annotator",
            ComponentType::ImageBuilder => "image_builder",
        }
    }

    /// Human label, e.g. "artifact store".
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ComponentType {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase().replace('-', "_");
        ComponentType::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<_> = ComponentType::ALL.iter().map(|k| k.as_str()).collect();
                format!(
                    "Unknown component type '{value}'. Known types: {}",
                    known.join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub active: bool,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentModel {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    pub flavor: String,
    pub configuration: ComponentConfig,
    pub user_id: Option<Uuid>,
    pub workspace_id: Uuid,
    pub is_shared: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackModel {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub components: BTreeMap<ComponentType, ComponentModel>,
    pub user_id: Option<Uuid>,
    pub workspace_id: Uuid,
    pub is_shared: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl StackModel {
    pub fn is_valid(&self) -> bool {
        self.components.contains_key(&ComponentType::Orchestrator)
            && self.components.contains_key(&ComponentType::ArtifactStore)
    }

    pub fn component(&self, kind: ComponentType) -> Option<&ComponentModel> {
        self.components.get(&kind)
    }

    pub fn component_ids(&self) -> BTreeMap<ComponentType, Uuid> {
        self.components
            .iter()
            .map(|(kind, component)| (*kind, component.id))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkspaceRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct WorkspaceUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserRequest {
    pub name: String,
    pub full_name: String,
    pub email: Option<String>,
    pub active: bool,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub active: Option<bool>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ComponentRequest {
    pub name: String,
    pub component_type: ComponentType,
    pub flavor: String,
    pub configuration: ComponentConfig,
    pub user_id: Option<Uuid>,
    pub workspace_id: Uuid,
    pub is_shared: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ComponentUpdate {
    pub name: Option<String>,
    pub configuration: Option<ComponentConfig>,
    pub is_shared: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct StackRequest {
    pub name: String,
    pub description: String,
    pub components: BTreeMap<ComponentType, Uuid>,
    pub user_id: Option<Uuid>,
    pub workspace_id: Uuid,
    pub is_shared: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StackUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub components: Option<BTreeMap<ComponentType, Uuid>>,
    pub is_shared: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Write,
    Me,
}

impl Permission {
    pub const ALL: [Permission; 3] = [Permission::Read, Permission::Write, Permission::Me];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Me => "me",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        Permission::ALL
            .iter()
            .copied()
            .find(|permission| permission.as_str() == normalized)
            .ok_or_else(|| format!("Unknown permission '{value}'. Known permissions: read, write, me"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub permissions: BTreeSet<Permission>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Role {
    /// The built-in `admin` and `guest` roles.
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_ADMIN_ROLE || self.name == DEFAULT_GUEST_ROLE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub users: Vec<User>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Who a role is granted to. A role assignment always has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Assignee {
    User(Uuid),
    Team(Uuid),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleAssignment {
    pub id: Uuid,
    pub role_id: Uuid,
    /// `None` grants the role in every workspace.
    pub workspace_id: Option<Uuid>,
    pub assignee: Assignee,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct RoleRequest {
    pub name: String,
    pub permissions: BTreeSet<Permission>,
}

#[derive(Debug, Clone, Default)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub permissions: Option<BTreeSet<Permission>>,
}

#[derive(Debug, Clone, Default)]
pub struct TeamRequest {
    pub name: String,
    pub users: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct RoleAssignmentRequest {
    pub role_id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub assignee: Assignee,
}

/// Check a user-supplied entity name against the stored field limits.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(StoreError::validation(format!("{kind} name cannot be empty")));
    }
    if name.chars().count() > STR_FIELD_MAX_LENGTH {
        return Err(StoreError::validation(format!(
            "{kind} name exceeds {STR_FIELD_MAX_LENGTH} characters"
        )));
    }
    Ok(())
}

pub fn validate_description(kind: &str, description: &str) -> Result<()> {
    if description.chars().count() > STR_FIELD_MAX_LENGTH {
        return Err(StoreError::validation(format!(
            "{kind} description exceeds {STR_FIELD_MAX_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Whether `value` has the `{{name.key}}` shape of a secret reference.
pub fn is_secret_reference(value: &str) -> bool {
    let trimmed = value.trim();
    let Some(inner) = trimmed
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
    else {
        return false;
    };
    let mut parts = inner.trim().splitn(2, '.');
    matches!(
        (parts.next(), parts.next()),
        (Some(secret), Some(key)) if !secret.is_empty() && !key.is_empty()
    )
}
