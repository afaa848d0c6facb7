//! High-level access to the global configuration and the SQL store.
//!
//! The client owns the rules that keep the local state consistent: exactly
//! one active stack and workspace, protected `default` entities, stacks that
//! validate against their flavors, and one `local_stores/<id>/` directory per
//! locally backed component.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::filter::{ListFilter, MAX_PAGE_SIZE, Page};
use crate::flavors::{Flavor, FlavorRegistry};
use crate::global_config::GlobalConfiguration;
use crate::models::{
    Assignee, ComponentConfig, ComponentModel, ComponentRequest, ComponentType, ComponentUpdate,
    DEFAULT_NAME, Permission, Role, RoleAssignment, RoleAssignmentRequest, RoleRequest, RoleUpdate,
    StackModel, StackRequest, StackUpdate, Team, TeamRequest, User, UserRequest, UserUpdate,
    Workspace, WorkspaceRequest, WorkspaceUpdate, is_secret_reference,
};
use crate::paths;
use crate::store::{ComponentQuery, RoleAssignmentQuery, SqlStore, StackQuery};
use crate::validation::{ValidationReport, validate_stack};

pub struct Client {
    root: PathBuf,
    config: GlobalConfiguration,
    store: SqlStore,
    flavors: &'static FlavorRegistry,
}

impl Client {
    /// Open the client rooted at the resolved global config directory.
    pub fn open() -> Result<Self> {
        Self::open_at(&paths::config_directory())
    }

    pub fn open_at(root: &Path) -> Result<Self> {
        let config = GlobalConfiguration::load_or_init(root)?;
        let store = SqlStore::open(&config.database_path()?)?;
        let mut client = Self {
            root: root.to_path_buf(),
            config,
            store,
            flavors: FlavorRegistry::builtin(),
        };
        client.initialize()?;
        Ok(client)
    }

    fn initialize(&mut self) -> Result<()> {
        self.store.initialize_defaults()?;

        let mut changed = false;
        let workspace = match self.config.active_workspace_name.clone() {
            Some(name) => match self.store.get_workspace(&name) {
                Ok(workspace) => workspace,
                Err(err) if err.is_not_found() => {
                    warn!(workspace = %name, "Active workspace no longer exists, falling back to default");
                    changed = true;
                    self.store.get_workspace(DEFAULT_NAME)?
                }
                Err(err) => return Err(err),
            },
            None => {
                changed = true;
                self.store.get_workspace(DEFAULT_NAME)?
            }
        };
        if changed {
            self.config.set_active_workspace(workspace.name.clone());
        }

        let stack_missing = match &self.config.active_stack_name {
            Some(name) => match self.store.get_stack(workspace.id, name) {
                Ok(_) => false,
                Err(err) if err.is_not_found() => {
                    warn!(stack = %name, "Active stack no longer exists, falling back to default");
                    true
                }
                Err(err) => return Err(err),
            },
            None => true,
        };
        if stack_missing {
            let user = self.active_user()?;
            let stack = self.store.ensure_default_stack(workspace.id, Some(user.id))?;
            self.config.set_active_stack(stack.name);
            changed = true;
        }

        if changed {
            self.config.save(&self.root)?;
        }

        let stack = self.active_stack()?;
        for component in stack.components.values() {
            self.ensure_local_store(component)?;
        }
        Ok(())
    }

    pub fn config(&self) -> &GlobalConfiguration {
        &self.config
    }

    // ---------- global settings ----------

    pub fn set_analytics(&mut self, opt_in: bool) -> Result<()> {
        self.config.set_analytics(opt_in);
        self.config.save(&self.root)?;
        info!(opt_in, "Updated analytics setting");
        Ok(())
    }

    /// Point the configuration at another SQLite database and initialize it.
    pub fn set_store(&mut self, url: &str) -> Result<()> {
        let mut config = self.config.clone();
        config.set_store(url)?;
        let store = SqlStore::open(&config.database_path()?)?;
        self.config = config;
        self.store = store;
        self.config.active_stack_name = None;
        self.config.active_workspace_name = None;
        self.initialize()?;
        self.config.save(&self.root)?;
        info!(url = %self.config.store.url, "Switched SQL store");
        Ok(())
    }

    /// Delete all local state under the config directory and start fresh.
    pub fn reset(self) -> Result<Client> {
        let root = self.root.clone();
        drop(self.store);
        Client::reset_at(&root)
    }

    /// Reset the config directory at `root` without opening it first, so a
    /// corrupt `config.yaml` or database can still be wiped.
    pub fn reset_at(root: &Path) -> Result<Client> {
        let default_database = paths::default_database(root);
        let config_file = paths::config_file(root);
        if config_file.is_file() {
            match GlobalConfiguration::load(&config_file).and_then(|config| config.database_path()) {
                Ok(database) if database != default_database => warn!(
                    database = %database.display(),
                    "Leaving database outside the config directory untouched"
                ),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "Discarding unreadable global configuration"),
            }
        }

        for file in [config_file, default_database] {
            if file.exists() {
                fs::remove_file(&file)?;
                debug!(path = %file.display(), "Removed");
            }
        }
        let stores = paths::local_stores_root(root);
        if stores.exists() {
            fs::remove_dir_all(&stores)?;
        }
        info!(root = %root.display(), "Reset global configuration to defaults");
        Client::open_at(root)
    }

    // ---------- workspaces ----------

    pub fn active_workspace(&self) -> Result<Workspace> {
        let name = self
            .config
            .active_workspace_name
            .as_deref()
            .unwrap_or(DEFAULT_NAME);
        self.store.get_workspace(name)
    }

    pub fn get_workspace(&self, name_id_or_prefix: &str) -> Result<Workspace> {
        self.store.get_workspace(name_id_or_prefix)
    }

    pub fn list_workspaces(&self, filter: &ListFilter) -> Result<Page<Workspace>> {
        self.store.list_workspaces(filter)
    }

    pub fn create_workspace(&self, name: &str, description: &str) -> Result<Workspace> {
        let workspace = self.store.create_workspace(&WorkspaceRequest {
            name: name.to_string(),
            description: description.to_string(),
        })?;
        let user = self.active_user()?;
        self.store.ensure_default_stack(workspace.id, Some(user.id))?;
        info!(workspace = %workspace.name, "Created workspace");
        Ok(workspace)
    }

    pub fn update_workspace(
        &mut self,
        name_id_or_prefix: &str,
        update: &WorkspaceUpdate,
    ) -> Result<Workspace> {
        let workspace = self.store.get_workspace(name_id_or_prefix)?;
        if workspace.name == DEFAULT_NAME
            && update.name.as_deref().is_some_and(|name| name != DEFAULT_NAME)
        {
            return Err(StoreError::illegal(
                "The default workspace cannot be renamed",
            ));
        }
        let updated = self.store.update_workspace(workspace.id, update)?;
        if self.config.active_workspace_name.as_deref() == Some(workspace.name.as_str())
            && updated.name != workspace.name
        {
            self.config.set_active_workspace(updated.name.clone());
            self.config.save(&self.root)?;
        }
        Ok(updated)
    }

    pub fn delete_workspace(&self, name_id_or_prefix: &str) -> Result<()> {
        let workspace = self.store.get_workspace(name_id_or_prefix)?;
        if workspace.name == DEFAULT_NAME {
            return Err(StoreError::illegal(
                "The default workspace cannot be deleted",
            ));
        }
        if self.active_workspace()?.id == workspace.id {
            return Err(StoreError::illegal(format!(
                "Workspace '{}' is active; activate another workspace before deleting it",
                workspace.name
            )));
        }
        let components = self.workspace_components(workspace.id)?;
        self.store.delete_workspace(workspace.id)?;
        for component in &components {
            self.remove_local_store(component)?;
        }
        info!(workspace = %workspace.name, "Deleted workspace");
        Ok(())
    }

    fn workspace_components(&self, workspace_id: Uuid) -> Result<Vec<ComponentModel>> {
        let mut components = Vec::new();
        let mut page_index = 1;
        loop {
            let page = self.store.list_components(&ComponentQuery {
                workspace_id: Some(workspace_id),
                filter: ListFilter::default().with_page(page_index, MAX_PAGE_SIZE),
                ..ComponentQuery::default()
            })?;
            let last = u64::from(page_index) >= page.total_pages();
            components.extend(page.items);
            if last {
                return Ok(components);
            }
            page_index += 1;
        }
    }

    /// Activate a workspace; the active stack falls back to its default stack.
    pub fn set_active_workspace(&mut self, name_id_or_prefix: &str) -> Result<Workspace> {
        let workspace = self.store.get_workspace(name_id_or_prefix)?;
        let user = self.active_user()?;
        let stack = self.store.ensure_default_stack(workspace.id, Some(user.id))?;
        self.config.set_active_workspace(workspace.name.clone());
        self.config.set_active_stack(stack.name);
        self.config.save(&self.root)?;
        info!(workspace = %workspace.name, "Activated workspace");
        Ok(workspace)
    }

    // ---------- users ----------

    pub fn active_user(&self) -> Result<User> {
        self.store.get_user(DEFAULT_NAME)
    }

    pub fn get_user(&self, name_id_or_prefix: &str) -> Result<User> {
        self.store.get_user(name_id_or_prefix)
    }

    pub fn list_users(&self, filter: &ListFilter) -> Result<Page<User>> {
        self.store.list_users(filter)
    }

    pub fn create_user(
        &self,
        name: &str,
        full_name: &str,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<User> {
        let user = self.store.create_user(&UserRequest {
            name: name.to_string(),
            full_name: full_name.to_string(),
            email: email.map(str::to_string),
            active: password.is_some(),
            password_hash: password.map(hash_password),
        })?;
        info!(user = %user.name, "Created user");
        Ok(user)
    }

    pub fn update_user(
        &self,
        name_id_or_prefix: &str,
        mut update: UserUpdate,
        password: Option<&str>,
    ) -> Result<User> {
        let user = self.store.get_user(name_id_or_prefix)?;
        if user.name == DEFAULT_NAME
            && update.name.as_deref().is_some_and(|name| name != DEFAULT_NAME)
        {
            return Err(StoreError::illegal("The default user cannot be renamed"));
        }
        if let Some(password) = password {
            update.password_hash = Some(hash_password(password));
            update.active = Some(true);
        }
        self.store.update_user(user.id, &update)
    }

    pub fn delete_user(&self, name_id_or_prefix: &str) -> Result<()> {
        let user = self.store.get_user(name_id_or_prefix)?;
        if user.name == DEFAULT_NAME {
            return Err(StoreError::illegal("The default user cannot be deleted"));
        }
        self.store.delete_user(user.id)?;
        info!(user = %user.name, "Deleted user");
        Ok(())
    }

    // ---------- roles ----------

    pub fn get_role(&self, name_id_or_prefix: &str) -> Result<Role> {
        self.store.get_role(name_id_or_prefix)
    }

    pub fn list_roles(&self, filter: &ListFilter) -> Result<Page<Role>> {
        self.store.list_roles(filter)
    }

    pub fn create_role(&self, name: &str, permissions: &[Permission]) -> Result<Role> {
        let role = self.store.create_role(&RoleRequest {
            name: name.to_string(),
            permissions: permissions.iter().copied().collect(),
        })?;
        info!(role = %role.name, "Created role");
        Ok(role)
    }

    /// Rename a role and grant or withdraw permissions.
    pub fn update_role(
        &self,
        name_id_or_prefix: &str,
        new_name: Option<&str>,
        add: &[Permission],
        remove: &[Permission],
    ) -> Result<Role> {
        let role = self.store.get_role(name_id_or_prefix)?;
        if role.is_default() {
            return Err(StoreError::illegal(format!(
                "The default role '{}' cannot be updated",
                role.name
            )));
        }
        let add: BTreeSet<_> = add.iter().copied().collect();
        let remove: BTreeSet<_> = remove.iter().copied().collect();
        let conflicts: Vec<_> = add.intersection(&remove).map(Permission::as_str).collect();
        if !conflicts.is_empty() {
            return Err(StoreError::validation(format!(
                "Permissions cannot be added and removed at once: {}",
                conflicts.join(", ")
            )));
        }

        let mut permissions = role.permissions.clone();
        permissions.extend(add);
        permissions.retain(|permission| !remove.contains(permission));
        let updated = self.store.update_role(
            role.id,
            &RoleUpdate {
                name: new_name.map(str::to_string),
                permissions: Some(permissions),
            },
        )?;
        info!(role = %updated.name, "Updated role");
        Ok(updated)
    }

    pub fn delete_role(&self, name_id_or_prefix: &str) -> Result<()> {
        let role = self.store.get_role(name_id_or_prefix)?;
        if role.is_default() {
            return Err(StoreError::illegal(format!(
                "The default role '{}' cannot be deleted",
                role.name
            )));
        }
        self.store.delete_role(role.id)?;
        info!(role = %role.name, "Deleted role");
        Ok(())
    }

    fn resolve_assignee(&self, user: Option<&str>, team: Option<&str>) -> Result<Assignee> {
        match (user, team) {
            (Some(user), None) => Ok(Assignee::User(self.store.get_user(user)?.id)),
            (None, Some(team)) => Ok(Assignee::Team(self.store.get_team(team)?.id)),
            _ => Err(StoreError::validation(
                "A role is assigned to exactly one user or one team",
            )),
        }
    }

    /// Grant a role to a user or a team, in one workspace or in all of them.
    pub fn assign_role(
        &self,
        role: &str,
        user: Option<&str>,
        team: Option<&str>,
        workspace: Option<&str>,
    ) -> Result<RoleAssignment> {
        let assignee = self.resolve_assignee(user, team)?;
        let role = self.store.get_role(role)?;
        let workspace_id = workspace
            .map(|name| self.store.get_workspace(name).map(|workspace| workspace.id))
            .transpose()?;
        let assignment = self.store.create_role_assignment(&RoleAssignmentRequest {
            role_id: role.id,
            workspace_id,
            assignee,
        })?;
        info!(role = %role.name, "Assigned role");
        Ok(assignment)
    }

    pub fn revoke_role(
        &self,
        role: &str,
        user: Option<&str>,
        team: Option<&str>,
        workspace: Option<&str>,
    ) -> Result<()> {
        let assignee = self.resolve_assignee(user, team)?;
        let role = self.store.get_role(role)?;
        let workspace_id = workspace
            .map(|name| self.store.get_workspace(name).map(|workspace| workspace.id))
            .transpose()?;
        let assignment = self
            .role_assignments(Some(role.name.as_str()))?
            .into_iter()
            .find(|assignment| {
                assignment.assignee == assignee && assignment.workspace_id == workspace_id
            })
            .ok_or_else(|| StoreError::not_found("role assignment", role.name.clone()))?;
        self.store.delete_role_assignment(assignment.id)?;
        info!(role = %role.name, "Revoked role");
        Ok(())
    }

    /// Assignments of one role, or of every role when `role` is `None`.
    pub fn role_assignments(&self, role: Option<&str>) -> Result<Vec<RoleAssignment>> {
        let role_id = role
            .map(|name| self.store.get_role(name).map(|role| role.id))
            .transpose()?;
        self.store.list_role_assignments(&RoleAssignmentQuery {
            role_id,
            ..RoleAssignmentQuery::default()
        })
    }

    // ---------- teams ----------

    pub fn get_team(&self, name_id_or_prefix: &str) -> Result<Team> {
        self.store.get_team(name_id_or_prefix)
    }

    pub fn list_teams(&self, filter: &ListFilter) -> Result<Page<Team>> {
        self.store.list_teams(filter)
    }

    pub fn create_team(&self, name: &str, users: &[String]) -> Result<Team> {
        let users = users
            .iter()
            .map(|user| self.store.get_user(user).map(|user| user.id))
            .collect::<Result<Vec<_>>>()?;
        let team = self.store.create_team(&TeamRequest {
            name: name.to_string(),
            users,
        })?;
        info!(team = %team.name, members = team.users.len(), "Created team");
        Ok(team)
    }

    pub fn rename_team(&self, name_id_or_prefix: &str, new_name: &str) -> Result<Team> {
        let team = self.store.get_team(name_id_or_prefix)?;
        let renamed = self.store.rename_team(team.id, new_name)?;
        info!(from = %team.name, to = %renamed.name, "Renamed team");
        Ok(renamed)
    }

    pub fn delete_team(&self, name_id_or_prefix: &str) -> Result<()> {
        let team = self.store.get_team(name_id_or_prefix)?;
        self.store.delete_team(team.id)?;
        info!(team = %team.name, "Deleted team");
        Ok(())
    }

    pub fn add_team_members(&self, name_id_or_prefix: &str, users: &[String]) -> Result<Team> {
        let team = self.store.get_team(name_id_or_prefix)?;
        for user in users {
            let user = self.store.get_user(user)?;
            self.store.add_team_member(team.id, user.id)?;
            info!(team = %team.name, user = %user.name, "Added user to team");
        }
        self.store.get_team_by_id(team.id)
    }

    pub fn remove_team_members(&self, name_id_or_prefix: &str, users: &[String]) -> Result<Team> {
        let team = self.store.get_team(name_id_or_prefix)?;
        for user in users {
            let user = self.store.get_user(user)?;
            self.store.remove_team_member(team.id, user.id)?;
            info!(team = %team.name, user = %user.name, "Removed user from team");
        }
        self.store.get_team_by_id(team.id)
    }

    // ---------- flavors ----------

    pub fn get_flavor(&self, component_type: ComponentType, name: &str) -> Result<&'static Flavor> {
        self.flavors.get(component_type, name).map_err(|_| {
            StoreError::validation(format!(
                "Unknown {} flavor '{name}'; available flavors: {}",
                component_type.label(),
                self.flavors.known_flavors(component_type).join(", ")
            ))
        })
    }

    // ---------- stack components ----------

    pub fn get_component(
        &self,
        component_type: ComponentType,
        name_id_or_prefix: &str,
    ) -> Result<ComponentModel> {
        let workspace = self.active_workspace()?;
        self.store
            .get_component(workspace.id, component_type, name_id_or_prefix)
    }

    pub fn list_components(
        &self,
        component_type: Option<ComponentType>,
        filter: &ListFilter,
    ) -> Result<Page<ComponentModel>> {
        let workspace = self.active_workspace()?;
        let user = self.active_user()?;
        self.store.list_components(&ComponentQuery {
            workspace_id: Some(workspace.id),
            component_type,
            flavor: None,
            scope_user: Some(user.id),
            filter: filter.clone(),
        })
    }

    pub fn register_component(
        &self,
        component_type: ComponentType,
        name: &str,
        flavor: &str,
        configuration: ComponentConfig,
        is_shared: bool,
    ) -> Result<ComponentModel> {
        if is_secret_reference(name) {
            return Err(StoreError::validation(
                "A stack component name cannot be a secret reference",
            ));
        }
        let flavor_spec = self.get_flavor(component_type, flavor)?;
        let configuration = flavor_spec.validate_config(&configuration)?;
        let workspace = self.active_workspace()?;
        let user = self.active_user()?;

        let component = self.store.create_component(&ComponentRequest {
            name: name.to_string(),
            component_type,
            flavor: flavor.to_string(),
            configuration,
            user_id: Some(user.id),
            workspace_id: workspace.id,
            is_shared,
        })?;
        self.ensure_local_store(&component)?;
        info!(
            component = %component.name,
            kind = %component_type,
            flavor = %component.flavor,
            "Registered stack component"
        );
        Ok(component)
    }

    /// Merge `patch` into the component configuration and revalidate it.
    pub fn update_component(
        &self,
        component_type: ComponentType,
        name_id_or_prefix: &str,
        patch: ComponentConfig,
        is_shared: Option<bool>,
    ) -> Result<ComponentModel> {
        let component = self.get_component(component_type, name_id_or_prefix)?;
        let mut configuration = component.configuration.clone();
        configuration.extend(patch);
        self.write_component_config(&component, configuration, is_shared)
    }

    pub fn remove_component_attributes(
        &self,
        component_type: ComponentType,
        name_id_or_prefix: &str,
        keys: &[String],
    ) -> Result<ComponentModel> {
        let component = self.get_component(component_type, name_id_or_prefix)?;
        let flavor = self.get_flavor(component_type, &component.flavor)?;
        let mut configuration = component.configuration.clone();
        for key in keys {
            match flavor.field(key) {
                Some(field) if field.required => {
                    return Err(StoreError::illegal(format!(
                        "Attribute '{key}' is required by flavor '{}' and cannot be removed",
                        flavor.name
                    )));
                }
                Some(_) => {
                    configuration.remove(key);
                }
                None => {
                    return Err(StoreError::validation(format!(
                        "Component '{}' has no attribute '{key}'",
                        component.name
                    )));
                }
            }
        }
        self.write_component_config(&component, configuration, None)
    }

    fn write_component_config(
        &self,
        component: &ComponentModel,
        configuration: ComponentConfig,
        is_shared: Option<bool>,
    ) -> Result<ComponentModel> {
        let flavor = self.get_flavor(component.component_type, &component.flavor)?;
        let configuration = flavor.validate_config(&configuration)?;

        // Stacks using the component must stay valid under the new config.
        for stack in self.store.stacks_using_component(component.id)? {
            let mut components = stack.components.clone();
            let mut candidate = component.clone();
            candidate.configuration = configuration.clone();
            components.insert(candidate.component_type, candidate);
            ensure_valid(&stack.name, validate_stack(&components, self.flavors))?;
        }

        let updated = self.store.update_component(
            component.id,
            &ComponentUpdate {
                configuration: Some(configuration),
                is_shared,
                ..ComponentUpdate::default()
            },
        )?;
        info!(component = %updated.name, kind = %updated.component_type, "Updated stack component");
        Ok(updated)
    }

    pub fn rename_component(
        &self,
        component_type: ComponentType,
        name_id_or_prefix: &str,
        new_name: &str,
    ) -> Result<ComponentModel> {
        let component = self.get_component(component_type, name_id_or_prefix)?;
        if component.name == DEFAULT_NAME {
            return Err(StoreError::illegal(format!(
                "The default {} cannot be renamed",
                component_type.label()
            )));
        }
        if is_secret_reference(new_name) {
            return Err(StoreError::validation(
                "A stack component name cannot be a secret reference",
            ));
        }
        self.store.update_component(
            component.id,
            &ComponentUpdate {
                name: Some(new_name.to_string()),
                ..ComponentUpdate::default()
            },
        )
    }

    pub fn delete_component(
        &self,
        component_type: ComponentType,
        name_id_or_prefix: &str,
    ) -> Result<()> {
        let component = self.get_component(component_type, name_id_or_prefix)?;
        if component.name == DEFAULT_NAME {
            return Err(StoreError::illegal(format!(
                "The default {} cannot be deleted",
                component_type.label()
            )));
        }
        let stacks = self.store.stacks_using_component(component.id)?;
        if !stacks.is_empty() {
            let names: Vec<_> = stacks.iter().map(|stack| stack.name.as_str()).collect();
            return Err(StoreError::illegal(format!(
                "The {} '{}' is used by stack(s): {}",
                component_type.label(),
                component.name,
                names.join(", ")
            )));
        }
        self.store.delete_component(component.id)?;
        self.remove_local_store(&component)?;
        info!(component = %component.name, kind = %component_type, "Deleted stack component");
        Ok(())
    }

    /// Drop a component without the default and in-use checks, used to undo
    /// a partially applied import.
    pub(crate) fn discard_component(&self, component: &ComponentModel) -> Result<()> {
        self.store.delete_component(component.id)?;
        self.remove_local_store(component)?;
        debug!(component = %component.name, kind = %component.component_type, "Discarded stack component");
        Ok(())
    }

    /// Directory where a locally backed component keeps its state.
    pub fn component_local_path(&self, component: &ComponentModel) -> Option<PathBuf> {
        let flavor = self
            .flavors
            .get(component.component_type, &component.flavor)
            .ok()?;
        if !flavor.uses_local_store {
            return None;
        }
        let explicit = component
            .configuration
            .get("path")
            .and_then(Value::as_str)
            .map(PathBuf::from);
        Some(explicit.unwrap_or_else(|| paths::local_store_path(&self.root, component.id)))
    }

    fn ensure_local_store(&self, component: &ComponentModel) -> Result<()> {
        if let Some(path) = self.component_local_path(component)
            && !path.exists()
        {
            fs::create_dir_all(&path)?;
            debug!(component = %component.name, path = %path.display(), "Created local store");
        }
        Ok(())
    }

    fn remove_local_store(&self, component: &ComponentModel) -> Result<()> {
        let managed = paths::local_store_path(&self.root, component.id);
        if managed.exists() {
            fs::remove_dir_all(&managed)?;
            debug!(component = %component.name, path = %managed.display(), "Removed local store");
        }
        Ok(())
    }

    // ---------- stacks ----------

    pub fn active_stack(&self) -> Result<StackModel> {
        let workspace = self.active_workspace()?;
        let name = self
            .config
            .active_stack_name
            .as_deref()
            .unwrap_or(DEFAULT_NAME);
        self.store.get_stack(workspace.id, name)
    }

    /// Resolve `name_id_or_prefix`, or the active stack when `None`.
    pub fn get_stack(&self, name_id_or_prefix: Option<&str>) -> Result<StackModel> {
        match name_id_or_prefix {
            Some(name) => {
                let workspace = self.active_workspace()?;
                self.store.get_stack(workspace.id, name)
            }
            None => self.active_stack(),
        }
    }

    pub fn list_stacks(&self, filter: &ListFilter) -> Result<Page<StackModel>> {
        let workspace = self.active_workspace()?;
        let user = self.active_user()?;
        self.store.list_stacks(&StackQuery {
            workspace_id: Some(workspace.id),
            component_id: None,
            scope_user: Some(user.id),
            filter: filter.clone(),
        })
    }

    pub fn set_active_stack(&mut self, name_id_or_prefix: &str) -> Result<StackModel> {
        let stack = self.get_stack(Some(name_id_or_prefix))?;
        for component in stack.components.values() {
            self.ensure_local_store(component)?;
        }
        self.config.set_active_stack(stack.name.clone());
        self.config.save(&self.root)?;
        info!(stack = %stack.name, "Activated stack");
        Ok(stack)
    }

    fn resolve_components(
        &self,
        components: &BTreeMap<ComponentType, String>,
    ) -> Result<BTreeMap<ComponentType, ComponentModel>> {
        components
            .iter()
            .map(|(kind, name)| Ok((*kind, self.get_component(*kind, name)?)))
            .collect()
    }

    pub fn validate_components(
        &self,
        components: &BTreeMap<ComponentType, ComponentModel>,
    ) -> ValidationReport {
        validate_stack(components, self.flavors)
    }

    pub fn register_stack(
        &self,
        name: &str,
        description: &str,
        components: &BTreeMap<ComponentType, String>,
        is_shared: bool,
    ) -> Result<StackModel> {
        let resolved = self.resolve_components(components)?;
        ensure_valid(name, self.validate_components(&resolved))?;

        let workspace = self.active_workspace()?;
        let user = self.active_user()?;
        let stack = self.store.create_stack(&StackRequest {
            name: name.to_string(),
            description: description.to_string(),
            components: resolved
                .iter()
                .map(|(kind, component)| (*kind, component.id))
                .collect(),
            user_id: Some(user.id),
            workspace_id: workspace.id,
            is_shared,
        })?;
        info!(stack = %stack.name, components = stack.components.len(), "Registered stack");
        Ok(stack)
    }

    /// Swap or add components of a stack (the active one when `name` is `None`).
    pub fn update_stack(
        &self,
        name_id_or_prefix: Option<&str>,
        changes: &BTreeMap<ComponentType, String>,
        description: Option<&str>,
    ) -> Result<StackModel> {
        let stack = self.get_stack(name_id_or_prefix)?;
        self.ensure_mutable(&stack, "updated")?;

        let mut components = stack.components.clone();
        components.extend(self.resolve_components(changes)?);
        ensure_valid(&stack.name, self.validate_components(&components))?;

        let updated = self.store.update_stack(
            stack.id,
            &StackUpdate {
                description: description.map(str::to_string),
                components: Some(
                    components
                        .iter()
                        .map(|(kind, component)| (*kind, component.id))
                        .collect(),
                ),
                ..StackUpdate::default()
            },
        )?;
        info!(stack = %updated.name, "Updated stack");
        Ok(updated)
    }

    pub fn remove_stack_components(
        &self,
        name_id_or_prefix: Option<&str>,
        kinds: &[ComponentType],
    ) -> Result<StackModel> {
        let stack = self.get_stack(name_id_or_prefix)?;
        self.ensure_mutable(&stack, "updated")?;
        for kind in kinds {
            if matches!(kind, ComponentType::Orchestrator | ComponentType::ArtifactStore) {
                return Err(StoreError::illegal(format!(
                    "The {} is required and cannot be removed from a stack",
                    kind.label()
                )));
            }
        }

        let mut components = stack.components.clone();
        for kind in kinds {
            if components.remove(kind).is_none() {
                warn!(stack = %stack.name, kind = %kind, "Stack has no component of this type");
            }
        }
        let updated = self.store.update_stack(
            stack.id,
            &StackUpdate {
                components: Some(
                    components
                        .iter()
                        .map(|(kind, component)| (*kind, component.id))
                        .collect(),
                ),
                ..StackUpdate::default()
            },
        )?;
        Ok(updated)
    }

    pub fn rename_stack(&mut self, name_id_or_prefix: &str, new_name: &str) -> Result<StackModel> {
        let stack = self.get_stack(Some(name_id_or_prefix))?;
        self.ensure_mutable(&stack, "renamed")?;
        let renamed = self.store.update_stack(
            stack.id,
            &StackUpdate {
                name: Some(new_name.to_string()),
                ..StackUpdate::default()
            },
        )?;
        if self.config.active_stack_name.as_deref() == Some(stack.name.as_str()) {
            self.config.set_active_stack(renamed.name.clone());
            self.config.save(&self.root)?;
        }
        info!(from = %stack.name, to = %renamed.name, "Renamed stack");
        Ok(renamed)
    }

    pub fn delete_stack(&self, name_id_or_prefix: &str) -> Result<()> {
        let stack = self.get_stack(Some(name_id_or_prefix))?;
        if stack.name == DEFAULT_NAME {
            return Err(StoreError::illegal("The default stack cannot be deleted"));
        }
        if self.active_stack()?.id == stack.id {
            return Err(StoreError::illegal(format!(
                "Stack '{}' is active; activate another stack before deleting it",
                stack.name
            )));
        }
        self.store.delete_stack(stack.id)?;
        info!(stack = %stack.name, "Deleted stack");
        Ok(())
    }

    fn ensure_mutable(&self, stack: &StackModel, action: &str) -> Result<()> {
        if stack.name == DEFAULT_NAME {
            return Err(StoreError::illegal(format!(
                "The default stack cannot be {action}"
            )));
        }
        Ok(())
    }
}

pub(crate) fn ensure_valid(stack_name: &str, report: ValidationReport) -> Result<()> {
    for warning in &report.warnings {
        warn!(stack = %stack_name, "{warning}");
    }
    if report.is_ok() {
        return Ok(());
    }
    Err(StoreError::validation(format!(
        "Stack '{stack_name}' is invalid: {}",
        report.errors.join("; ")
    )))
}

const PASSWORD_SCHEME: &str = "sha256";

pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{PASSWORD_SCHEME}${salt}${}", digest(&salt, password))
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hashes_are_salted_digests() {
        let first = hash_password("catnip");
        let second = hash_password("catnip");
        assert_ne!(first, second);

        let parts: Vec<_> = first.split('$').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], PASSWORD_SCHEME);
        assert_eq!(parts[2], digest(parts[1], "catnip"));
        assert_ne!(parts[2], digest(parts[1], "treats"));
    }
}
