//! SQLite-backed store for workspaces, users, stack components and stacks.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::filter::{ListFilter, Page, StringFilter};
use crate::models::{
    Assignee, ComponentConfig, ComponentModel, ComponentRequest, ComponentType, ComponentUpdate,
    DEFAULT_ADMIN_ROLE, DEFAULT_GUEST_ROLE, DEFAULT_NAME, Permission, Role, RoleAssignment,
    RoleAssignmentRequest, RoleRequest, RoleUpdate, StackModel, StackRequest, StackUpdate, Team,
    TeamRequest, User, UserRequest, UserUpdate, Workspace, WorkspaceRequest, WorkspaceUpdate,
    validate_description, validate_name,
};

/// Ordered schema migrations; index + 1 is the `user_version` after applying.
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE workspaces (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        created TEXT NOT NULL,
        updated TEXT NOT NULL
    );
    CREATE TABLE users (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        full_name TEXT NOT NULL DEFAULT '',
        email TEXT,
        active INTEGER NOT NULL DEFAULT 1,
        password_hash TEXT,
        created TEXT NOT NULL,
        updated TEXT NOT NULL
    );
    CREATE TABLE stack_components (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        type TEXT NOT NULL,
        flavor TEXT NOT NULL,
        configuration TEXT NOT NULL,
        user_id TEXT REFERENCES users(id) ON DELETE SET NULL,
        workspace_id TEXT NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
        is_shared INTEGER NOT NULL DEFAULT 0,
        created TEXT NOT NULL,
        updated TEXT NOT NULL,
        UNIQUE (workspace_id, type, name)
    );
    CREATE TABLE stacks (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        user_id TEXT REFERENCES users(id) ON DELETE SET NULL,
        workspace_id TEXT NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
        is_shared INTEGER NOT NULL DEFAULT 0,
        created TEXT NOT NULL,
        updated TEXT NOT NULL,
        UNIQUE (workspace_id, name)
    );
    CREATE TABLE stack_compositions (
        stack_id TEXT NOT NULL REFERENCES stacks(id) ON DELETE CASCADE,
        component_id TEXT NOT NULL REFERENCES stack_components(id) ON DELETE CASCADE,
        PRIMARY KEY (stack_id, component_id)
    );
    "#,
    r#"
    CREATE INDEX idx_stack_components_type ON stack_components (workspace_id, type);
    CREATE INDEX idx_stack_compositions_component ON stack_compositions (component_id);
    "#,
    r#"
    CREATE TABLE roles (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        permissions TEXT NOT NULL,
        created TEXT NOT NULL,
        updated TEXT NOT NULL
    );
    CREATE TABLE teams (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        created TEXT NOT NULL,
        updated TEXT NOT NULL
    );
    CREATE TABLE team_memberships (
        team_id TEXT NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        PRIMARY KEY (team_id, user_id)
    );
    CREATE TABLE role_assignments (
        id TEXT PRIMARY KEY,
        role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        workspace_id TEXT REFERENCES workspaces(id) ON DELETE CASCADE,
        user_id TEXT REFERENCES users(id) ON DELETE CASCADE,
        team_id TEXT REFERENCES teams(id) ON DELETE CASCADE,
        created TEXT NOT NULL,
        CHECK ((user_id IS NULL) <> (team_id IS NULL))
    );
    CREATE UNIQUE INDEX idx_role_assignments_unique ON role_assignments
        (role_id, IFNULL(workspace_id, ''), IFNULL(user_id, ''), IFNULL(team_id, ''));
    "#,
];

const COMPONENT_COLUMNS: &str =
    "id, name, type, flavor, configuration, user_id, workspace_id, is_shared, created, updated";
const STACK_COLUMNS: &str =
    "id, name, description, user_id, workspace_id, is_shared, created, updated";
const ROLE_COLUMNS: &str = "id, name, permissions, created, updated";
const ASSIGNMENT_COLUMNS: &str = "id, role_id, workspace_id, user_id, team_id, created";

/// Scope for component listings.
#[derive(Debug, Clone, Default)]
pub struct ComponentQuery {
    pub workspace_id: Option<Uuid>,
    pub component_type: Option<ComponentType>,
    pub flavor: Option<String>,
    /// Only components owned by this user or shared.
    pub scope_user: Option<Uuid>,
    pub filter: ListFilter,
}

/// Scope for role assignment listings; unset fields match everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleAssignmentQuery {
    pub role_id: Option<Uuid>,
    pub workspace_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
}

/// Scope for stack listings.
#[derive(Debug, Clone, Default)]
pub struct StackQuery {
    pub workspace_id: Option<Uuid>,
    pub component_id: Option<Uuid>,
    pub scope_user: Option<Uuid>,
    pub filter: ListFilter,
}

#[derive(Debug, Default)]
struct WhereClause {
    clauses: Vec<String>,
    params: Vec<String>,
}

impl WhereClause {
    fn push(&mut self, clause: impl Into<String>, param: impl Into<String>) {
        self.clauses.push(clause.into());
        self.params.push(param.into());
    }

    fn push_name(&mut self, filter: Option<&StringFilter>) {
        if let Some(filter) = filter {
            let (clause, param) = filter.to_sql("name");
            self.push(clause, param);
        }
    }

    fn push_scope_user(&mut self, user: Option<Uuid>) {
        if let Some(user) = user {
            self.push("(user_id = ? OR is_shared = 1)", user.to_string());
        }
    }

    fn render(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

pub struct SqlStore {
    conn: Connection,
}

impl SqlStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        debug!(database = %path.display(), "Opened SQL store");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<usize> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(usize::try_from(version).unwrap_or(0))
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let current = self.schema_version()?;
        for (idx, migration) in MIGRATIONS.iter().enumerate().skip(current) {
            let tx = self.conn.unchecked_transaction()?;
            tx.execute_batch(migration)?;
            tx.pragma_update(None, "user_version", (idx + 1) as i64)?;
            tx.commit()?;
            info!(version = idx + 1, "Applied store migration");
        }
        Ok(())
    }

    // ---------- workspaces ----------

    pub fn create_workspace(&self, request: &WorkspaceRequest) -> Result<Workspace> {
        validate_name("Workspace", &request.name)?;
        validate_description("Workspace", &request.description)?;
        if self.find_workspace_by_name(&request.name)?.is_some() {
            return Err(StoreError::already_exists("workspace", &request.name));
        }

        let now = Utc::now();
        let workspace = Workspace {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            description: request.description.clone(),
            created: now,
            updated: now,
        };
        self.conn.execute(
            "INSERT INTO workspaces (id, name, description, created, updated) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                workspace.id.to_string(),
                workspace.name,
                workspace.description,
                timestamp(&now),
                timestamp(&now)
            ],
        )?;
        Ok(workspace)
    }

    pub fn get_workspace_by_id(&self, id: Uuid) -> Result<Workspace> {
        self.conn
            .query_row(
                "SELECT id, name, description, created, updated FROM workspaces WHERE id = ?1",
                [id.to_string()],
                workspace_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("workspace", id.to_string()))
    }

    fn find_workspace_by_name(&self, name: &str) -> Result<Option<Workspace>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, description, created, updated FROM workspaces WHERE name = ?1",
                [name],
                workspace_from_row,
            )
            .optional()?)
    }

    /// Look up a workspace by exact name, full id, or unique id prefix.
    pub fn get_workspace(&self, name_id_or_prefix: &str) -> Result<Workspace> {
        if let Some(workspace) = self.find_workspace_by_name(name_id_or_prefix)? {
            return Ok(workspace);
        }
        let id = self.resolve_id("workspaces", "workspace", "", &[], name_id_or_prefix)?;
        self.get_workspace_by_id(id)
    }

    pub fn list_workspaces(&self, filter: &ListFilter) -> Result<Page<Workspace>> {
        let mut clause = WhereClause::default();
        clause.push_name(filter.name.as_ref());
        self.paged(
            "SELECT id, name, description, created, updated FROM workspaces",
            "workspaces",
            &clause,
            filter,
            workspace_from_row,
        )
    }

    pub fn update_workspace(&self, id: Uuid, update: &WorkspaceUpdate) -> Result<Workspace> {
        let mut workspace = self.get_workspace_by_id(id)?;
        if let Some(name) = &update.name
            && name != &workspace.name
        {
            validate_name("Workspace", name)?;
            if self.find_workspace_by_name(name)?.is_some() {
                return Err(StoreError::already_exists("workspace", name));
            }
            workspace.name = name.clone();
        }
        if let Some(description) = &update.description {
            validate_description("Workspace", description)?;
            workspace.description = description.clone();
        }
        workspace.updated = Utc::now();
        self.conn.execute(
            "UPDATE workspaces SET name = ?2, description = ?3, updated = ?4 WHERE id = ?1",
            params![
                id.to_string(),
                workspace.name,
                workspace.description,
                timestamp(&workspace.updated)
            ],
        )?;
        Ok(workspace)
    }

    pub fn delete_workspace(&self, id: Uuid) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM workspaces WHERE id = ?1", [id.to_string()])?;
        if deleted == 0 {
            return Err(StoreError::not_found("workspace", id.to_string()));
        }
        Ok(())
    }

    // ---------- users ----------

    pub fn create_user(&self, request: &UserRequest) -> Result<User> {
        validate_name("User", &request.name)?;
        if self.find_user_by_name(&request.name)?.is_some() {
            return Err(StoreError::already_exists("user", &request.name));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            full_name: request.full_name.clone(),
            email: request.email.clone(),
            active: request.active,
            password_hash: request.password_hash.clone(),
            created: now,
            updated: now,
        };
        self.conn.execute(
            "INSERT INTO users (id, name, full_name, email, active, password_hash, created, updated) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id.to_string(),
                user.name,
                user.full_name,
                user.email,
                user.active,
                user.password_hash,
                timestamp(&now),
                timestamp(&now)
            ],
        )?;
        Ok(user)
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<User> {
        self.conn
            .query_row(
                "SELECT id, name, full_name, email, active, password_hash, created, updated \
                 FROM users WHERE id = ?1",
                [id.to_string()],
                user_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("user", id.to_string()))
    }

    fn find_user_by_name(&self, name: &str) -> Result<Option<User>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, full_name, email, active, password_hash, created, updated \
                 FROM users WHERE name = ?1",
                [name],
                user_from_row,
            )
            .optional()?)
    }

    pub fn get_user(&self, name_id_or_prefix: &str) -> Result<User> {
        if let Some(user) = self.find_user_by_name(name_id_or_prefix)? {
            return Ok(user);
        }
        let id = self.resolve_id("users", "user", "", &[], name_id_or_prefix)?;
        self.get_user_by_id(id)
    }

    pub fn list_users(&self, filter: &ListFilter) -> Result<Page<User>> {
        let mut clause = WhereClause::default();
        clause.push_name(filter.name.as_ref());
        self.paged(
            "SELECT id, name, full_name, email, active, password_hash, created, updated FROM users",
            "users",
            &clause,
            filter,
            user_from_row,
        )
    }

    pub fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<User> {
        let mut user = self.get_user_by_id(id)?;
        if let Some(name) = &update.name
            && name != &user.name
        {
            validate_name("User", name)?;
            if self.find_user_by_name(name)?.is_some() {
                return Err(StoreError::already_exists("user", name));
            }
            user.name = name.clone();
        }
        if let Some(full_name) = &update.full_name {
            user.full_name = full_name.clone();
        }
        if let Some(email) = &update.email {
            user.email = Some(email.clone());
        }
        if let Some(active) = update.active {
            user.active = active;
        }
        if let Some(hash) = &update.password_hash {
            user.password_hash = Some(hash.clone());
        }
        user.updated = Utc::now();
        self.conn.execute(
            "UPDATE users SET name = ?2, full_name = ?3, email = ?4, active = ?5, \
             password_hash = ?6, updated = ?7 WHERE id = ?1",
            params![
                id.to_string(),
                user.name,
                user.full_name,
                user.email,
                user.active,
                user.password_hash,
                timestamp(&user.updated)
            ],
        )?;
        Ok(user)
    }

    pub fn delete_user(&self, id: Uuid) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
        if deleted == 0 {
            return Err(StoreError::not_found("user", id.to_string()));
        }
        Ok(())
    }

    // ---------- stack components ----------

    pub fn create_component(&self, request: &ComponentRequest) -> Result<ComponentModel> {
        validate_name("Component", &request.name)?;
        self.get_workspace_by_id(request.workspace_id)?;
        if self
            .find_component_by_name(request.workspace_id, request.component_type, &request.name)?
            .is_some()
        {
            return Err(StoreError::already_exists(
                "stack component",
                format!("{}/{}", request.component_type, request.name),
            ));
        }

        let now = Utc::now();
        let component = ComponentModel {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            component_type: request.component_type,
            flavor: request.flavor.clone(),
            configuration: request.configuration.clone(),
            user_id: request.user_id,
            workspace_id: request.workspace_id,
            is_shared: request.is_shared,
            created: now,
            updated: now,
        };
        self.conn.execute(
            &format!(
                "INSERT INTO stack_components ({COMPONENT_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                component.id.to_string(),
                component.name,
                component.component_type.as_str(),
                component.flavor,
                serde_json::to_string(&component.configuration)?,
                component.user_id.map(|id| id.to_string()),
                component.workspace_id.to_string(),
                component.is_shared,
                timestamp(&now),
                timestamp(&now)
            ],
        )?;
        Ok(component)
    }

    pub fn get_component_by_id(&self, id: Uuid) -> Result<ComponentModel> {
        self.conn
            .query_row(
                &format!("SELECT {COMPONENT_COLUMNS} FROM stack_components WHERE id = ?1"),
                [id.to_string()],
                component_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("stack component", id.to_string()))
    }

    fn find_component_by_name(
        &self,
        workspace_id: Uuid,
        component_type: ComponentType,
        name: &str,
    ) -> Result<Option<ComponentModel>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {COMPONENT_COLUMNS} FROM stack_components \
                     WHERE workspace_id = ?1 AND type = ?2 AND name = ?3"
                ),
                params![workspace_id.to_string(), component_type.as_str(), name],
                component_from_row,
            )
            .optional()?)
    }

    pub fn get_component(
        &self,
        workspace_id: Uuid,
        component_type: ComponentType,
        name_id_or_prefix: &str,
    ) -> Result<ComponentModel> {
        if let Some(component) =
            self.find_component_by_name(workspace_id, component_type, name_id_or_prefix)?
        {
            return Ok(component);
        }
        let id = self.resolve_id(
            "stack_components",
            "stack component",
            " AND workspace_id = ? AND type = ?",
            &[workspace_id.to_string(), component_type.as_str().to_string()],
            name_id_or_prefix,
        )?;
        self.get_component_by_id(id)
    }

    pub fn list_components(&self, query: &ComponentQuery) -> Result<Page<ComponentModel>> {
        let mut clause = WhereClause::default();
        if let Some(workspace_id) = query.workspace_id {
            clause.push("workspace_id = ?", workspace_id.to_string());
        }
        if let Some(component_type) = query.component_type {
            clause.push("type = ?", component_type.as_str());
        }
        if let Some(flavor) = &query.flavor {
            clause.push("flavor = ?", flavor.clone());
        }
        clause.push_scope_user(query.scope_user);
        clause.push_name(query.filter.name.as_ref());
        self.paged(
            &format!("SELECT {COMPONENT_COLUMNS} FROM stack_components"),
            "stack_components",
            &clause,
            &query.filter,
            component_from_row,
        )
    }

    pub fn update_component(&self, id: Uuid, update: &ComponentUpdate) -> Result<ComponentModel> {
        let mut component = self.get_component_by_id(id)?;
        if let Some(name) = &update.name
            && name != &component.name
        {
            validate_name("Component", name)?;
            if self
                .find_component_by_name(component.workspace_id, component.component_type, name)?
                .is_some()
            {
                return Err(StoreError::already_exists(
                    "stack component",
                    format!("{}/{}", component.component_type, name),
                ));
            }
            component.name = name.clone();
        }
        if let Some(configuration) = &update.configuration {
            component.configuration = configuration.clone();
        }
        if let Some(shared) = update.is_shared {
            component.is_shared = shared;
        }
        component.updated = Utc::now();
        self.conn.execute(
            "UPDATE stack_components SET name = ?2, configuration = ?3, is_shared = ?4, updated = ?5 \
             WHERE id = ?1",
            params![
                id.to_string(),
                component.name,
                serde_json::to_string(&component.configuration)?,
                component.is_shared,
                timestamp(&component.updated)
            ],
        )?;
        Ok(component)
    }

    pub fn delete_component(&self, id: Uuid) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM stack_components WHERE id = ?1", [id.to_string()])?;
        if deleted == 0 {
            return Err(StoreError::not_found("stack component", id.to_string()));
        }
        Ok(())
    }

    // ---------- stacks ----------

    pub fn create_stack(&self, request: &StackRequest) -> Result<StackModel> {
        validate_name("Stack", &request.name)?;
        validate_description("Stack", &request.description)?;
        self.get_workspace_by_id(request.workspace_id)?;
        if self
            .find_stack_by_name(request.workspace_id, &request.name)?
            .is_some()
        {
            return Err(StoreError::already_exists("stack", &request.name));
        }
        self.check_composition(&request.components)?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO stacks ({STACK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                id.to_string(),
                request.name,
                request.description,
                request.user_id.map(|user| user.to_string()),
                request.workspace_id.to_string(),
                request.is_shared,
                timestamp(&now),
                timestamp(&now)
            ],
        )?;
        for component_id in request.components.values() {
            tx.execute(
                "INSERT INTO stack_compositions (stack_id, component_id) VALUES (?1, ?2)",
                params![id.to_string(), component_id.to_string()],
            )?;
        }
        tx.commit()?;

        self.get_stack_by_id(id)
    }

    pub fn get_stack_by_id(&self, id: Uuid) -> Result<StackModel> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {STACK_COLUMNS} FROM stacks WHERE id = ?1"),
                [id.to_string()],
                stack_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("stack", id.to_string()))?;
        self.hydrate_stack(row)
    }

    fn find_stack_by_name(&self, workspace_id: Uuid, name: &str) -> Result<Option<StackModel>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {STACK_COLUMNS} FROM stacks WHERE workspace_id = ?1 AND name = ?2"),
                params![workspace_id.to_string(), name],
                stack_from_row,
            )
            .optional()?;
        row.map(|stack| self.hydrate_stack(stack)).transpose()
    }

    pub fn get_stack(&self, workspace_id: Uuid, name_id_or_prefix: &str) -> Result<StackModel> {
        if let Some(stack) = self.find_stack_by_name(workspace_id, name_id_or_prefix)? {
            return Ok(stack);
        }
        let id = self.resolve_id(
            "stacks",
            "stack",
            " AND workspace_id = ?",
            &[workspace_id.to_string()],
            name_id_or_prefix,
        )?;
        self.get_stack_by_id(id)
    }

    pub fn list_stacks(&self, query: &StackQuery) -> Result<Page<StackModel>> {
        let mut clause = WhereClause::default();
        if let Some(workspace_id) = query.workspace_id {
            clause.push("workspace_id = ?", workspace_id.to_string());
        }
        if let Some(component_id) = query.component_id {
            clause.push(
                "id IN (SELECT stack_id FROM stack_compositions WHERE component_id = ?)",
                component_id.to_string(),
            );
        }
        clause.push_scope_user(query.scope_user);
        clause.push_name(query.filter.name.as_ref());
        let page = self.paged(
            &format!("SELECT {STACK_COLUMNS} FROM stacks"),
            "stacks",
            &clause,
            &query.filter,
            stack_from_row,
        )?;
        let items = page
            .items
            .into_iter()
            .map(|stack| self.hydrate_stack(stack))
            .collect::<Result<Vec<_>>>()?;
        Ok(Page {
            index: page.index,
            size: page.size,
            total: page.total,
            items,
        })
    }

    pub fn stacks_using_component(&self, component_id: Uuid) -> Result<Vec<StackModel>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {STACK_COLUMNS} FROM stacks WHERE id IN \
             (SELECT stack_id FROM stack_compositions WHERE component_id = ?1) ORDER BY name"
        ))?;
        let rows = stmt
            .query_map([component_id.to_string()], stack_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|stack| self.hydrate_stack(stack))
            .collect()
    }

    pub fn update_stack(&self, id: Uuid, update: &StackUpdate) -> Result<StackModel> {
        let mut stack = self.get_stack_by_id(id)?;
        if let Some(name) = &update.name
            && name != &stack.name
        {
            validate_name("Stack", name)?;
            if self.find_stack_by_name(stack.workspace_id, name)?.is_some() {
                return Err(StoreError::already_exists("stack", name));
            }
            stack.name = name.clone();
        }
        if let Some(description) = &update.description {
            validate_description("Stack", description)?;
            stack.description = description.clone();
        }
        if let Some(shared) = update.is_shared {
            stack.is_shared = shared;
        }
        if let Some(components) = &update.components {
            self.check_composition(components)?;
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE stacks SET name = ?2, description = ?3, is_shared = ?4, updated = ?5 WHERE id = ?1",
            params![
                id.to_string(),
                stack.name,
                stack.description,
                stack.is_shared,
                timestamp(&Utc::now())
            ],
        )?;
        if let Some(components) = &update.components {
            tx.execute(
                "DELETE FROM stack_compositions WHERE stack_id = ?1",
                [id.to_string()],
            )?;
            for component_id in components.values() {
                tx.execute(
                    "INSERT INTO stack_compositions (stack_id, component_id) VALUES (?1, ?2)",
                    params![id.to_string(), component_id.to_string()],
                )?;
            }
        }
        tx.commit()?;

        self.get_stack_by_id(id)
    }

    pub fn delete_stack(&self, id: Uuid) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM stacks WHERE id = ?1", [id.to_string()])?;
        if deleted == 0 {
            return Err(StoreError::not_found("stack", id.to_string()));
        }
        Ok(())
    }

    // ---------- roles ----------

    pub fn create_role(&self, request: &RoleRequest) -> Result<Role> {
        validate_name("Role", &request.name)?;
        if self.find_role_by_name(&request.name)?.is_some() {
            return Err(StoreError::already_exists("role", &request.name));
        }
        let now = Utc::now();
        let role = Role {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            permissions: request.permissions.clone(),
            created: now,
            updated: now,
        };
        self.conn.execute(
            &format!("INSERT INTO roles ({ROLE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
            params![
                role.id.to_string(),
                role.name,
                serde_json::to_string(&role.permissions)?,
                timestamp(&now),
                timestamp(&now)
            ],
        )?;
        Ok(role)
    }

    pub fn get_role_by_id(&self, id: Uuid) -> Result<Role> {
        self.conn
            .query_row(
                &format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = ?1"),
                [id.to_string()],
                role_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("role", id.to_string()))
    }

    fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = ?1"),
                [name],
                role_from_row,
            )
            .optional()?)
    }

    pub fn get_role(&self, name_id_or_prefix: &str) -> Result<Role> {
        if let Some(role) = self.find_role_by_name(name_id_or_prefix)? {
            return Ok(role);
        }
        let id = self.resolve_id("roles", "role", "", &[], name_id_or_prefix)?;
        self.get_role_by_id(id)
    }

    pub fn list_roles(&self, filter: &ListFilter) -> Result<Page<Role>> {
        let mut clause = WhereClause::default();
        clause.push_name(filter.name.as_ref());
        self.paged(
            &format!("SELECT {ROLE_COLUMNS} FROM roles"),
            "roles",
            &clause,
            filter,
            role_from_row,
        )
    }

    pub fn update_role(&self, id: Uuid, update: &RoleUpdate) -> Result<Role> {
        let mut role = self.get_role_by_id(id)?;
        if let Some(name) = &update.name
            && name != &role.name
        {
            validate_name("Role", name)?;
            if self.find_role_by_name(name)?.is_some() {
                return Err(StoreError::already_exists("role", name));
            }
            role.name = name.clone();
        }
        if let Some(permissions) = &update.permissions {
            role.permissions = permissions.clone();
        }
        role.updated = Utc::now();
        self.conn.execute(
            "UPDATE roles SET name = ?2, permissions = ?3, updated = ?4 WHERE id = ?1",
            params![
                id.to_string(),
                role.name,
                serde_json::to_string(&role.permissions)?,
                timestamp(&role.updated)
            ],
        )?;
        Ok(role)
    }

    pub fn delete_role(&self, id: Uuid) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM roles WHERE id = ?1", [id.to_string()])?;
        if deleted == 0 {
            return Err(StoreError::not_found("role", id.to_string()));
        }
        Ok(())
    }

    // ---------- teams ----------

    pub fn create_team(&self, request: &TeamRequest) -> Result<Team> {
        validate_name("Team", &request.name)?;
        if self.find_team_by_name(&request.name)?.is_some() {
            return Err(StoreError::already_exists("team", &request.name));
        }
        for user_id in &request.users {
            self.get_user_by_id(*user_id)?;
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO teams (id, name, created, updated) VALUES (?1, ?2, ?3, ?4)",
            params![id.to_string(), request.name, timestamp(&now), timestamp(&now)],
        )?;
        for user_id in &request.users {
            tx.execute(
                "INSERT OR IGNORE INTO team_memberships (team_id, user_id) VALUES (?1, ?2)",
                params![id.to_string(), user_id.to_string()],
            )?;
        }
        tx.commit()?;

        self.get_team_by_id(id)
    }

    pub fn get_team_by_id(&self, id: Uuid) -> Result<Team> {
        let team = self
            .conn
            .query_row(
                "SELECT id, name, created, updated FROM teams WHERE id = ?1",
                [id.to_string()],
                team_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("team", id.to_string()))?;
        self.hydrate_team(team)
    }

    fn find_team_by_name(&self, name: &str) -> Result<Option<Team>> {
        let team = self
            .conn
            .query_row(
                "SELECT id, name, created, updated FROM teams WHERE name = ?1",
                [name],
                team_from_row,
            )
            .optional()?;
        team.map(|team| self.hydrate_team(team)).transpose()
    }

    pub fn get_team(&self, name_id_or_prefix: &str) -> Result<Team> {
        if let Some(team) = self.find_team_by_name(name_id_or_prefix)? {
            return Ok(team);
        }
        let id = self.resolve_id("teams", "team", "", &[], name_id_or_prefix)?;
        self.get_team_by_id(id)
    }

    pub fn list_teams(&self, filter: &ListFilter) -> Result<Page<Team>> {
        let mut clause = WhereClause::default();
        clause.push_name(filter.name.as_ref());
        let page = self.paged(
            "SELECT id, name, created, updated FROM teams",
            "teams",
            &clause,
            filter,
            team_from_row,
        )?;
        let items = page
            .items
            .into_iter()
            .map(|team| self.hydrate_team(team))
            .collect::<Result<Vec<_>>>()?;
        Ok(Page {
            index: page.index,
            size: page.size,
            total: page.total,
            items,
        })
    }

    pub fn rename_team(&self, id: Uuid, name: &str) -> Result<Team> {
        let team = self.get_team_by_id(id)?;
        if name != team.name {
            validate_name("Team", name)?;
            if self.find_team_by_name(name)?.is_some() {
                return Err(StoreError::already_exists("team", name));
            }
        }
        self.conn.execute(
            "UPDATE teams SET name = ?2, updated = ?3 WHERE id = ?1",
            params![id.to_string(), name, timestamp(&Utc::now())],
        )?;
        self.get_team_by_id(id)
    }

    pub fn delete_team(&self, id: Uuid) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM teams WHERE id = ?1", [id.to_string()])?;
        if deleted == 0 {
            return Err(StoreError::not_found("team", id.to_string()));
        }
        Ok(())
    }

    pub fn add_team_member(&self, team_id: Uuid, user_id: Uuid) -> Result<()> {
        let team = self.get_team_by_id(team_id)?;
        let user = self.get_user_by_id(user_id)?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO team_memberships (team_id, user_id) VALUES (?1, ?2)",
            params![team_id.to_string(), user_id.to_string()],
        )?;
        if inserted == 0 {
            return Err(StoreError::already_exists(
                "team member",
                format!("{}/{}", team.name, user.name),
            ));
        }
        Ok(())
    }

    pub fn remove_team_member(&self, team_id: Uuid, user_id: Uuid) -> Result<()> {
        let team = self.get_team_by_id(team_id)?;
        let user = self.get_user_by_id(user_id)?;
        let removed = self.conn.execute(
            "DELETE FROM team_memberships WHERE team_id = ?1 AND user_id = ?2",
            params![team_id.to_string(), user_id.to_string()],
        )?;
        if removed == 0 {
            return Err(StoreError::not_found(
                "team member",
                format!("{}/{}", team.name, user.name),
            ));
        }
        Ok(())
    }

    // ---------- role assignments ----------

    pub fn create_role_assignment(
        &self,
        request: &RoleAssignmentRequest,
    ) -> Result<RoleAssignment> {
        let role = self.get_role_by_id(request.role_id)?;
        if let Some(workspace_id) = request.workspace_id {
            self.get_workspace_by_id(workspace_id)?;
        }
        let (user_id, team_id) = match request.assignee {
            Assignee::User(id) => (Some(self.get_user_by_id(id)?.id), None),
            Assignee::Team(id) => (None, Some(self.get_team_by_id(id)?.id)),
        };
        let existing = self.list_role_assignments(&RoleAssignmentQuery {
            role_id: Some(role.id),
            workspace_id: request.workspace_id,
            user_id,
            team_id,
        })?;
        if existing
            .iter()
            .any(|assignment| assignment.workspace_id == request.workspace_id)
        {
            return Err(StoreError::already_exists("role assignment", role.name));
        }

        let now = Utc::now();
        let assignment = RoleAssignment {
            id: Uuid::new_v4(),
            role_id: role.id,
            workspace_id: request.workspace_id,
            assignee: request.assignee,
            created: now,
        };
        self.conn.execute(
            &format!(
                "INSERT INTO role_assignments ({ASSIGNMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![
                assignment.id.to_string(),
                assignment.role_id.to_string(),
                assignment.workspace_id.map(|id| id.to_string()),
                user_id.map(|id| id.to_string()),
                team_id.map(|id| id.to_string()),
                timestamp(&now)
            ],
        )?;
        Ok(assignment)
    }

    pub fn list_role_assignments(
        &self,
        query: &RoleAssignmentQuery,
    ) -> Result<Vec<RoleAssignment>> {
        let mut clause = WhereClause::default();
        if let Some(role_id) = query.role_id {
            clause.push("role_id = ?", role_id.to_string());
        }
        if let Some(workspace_id) = query.workspace_id {
            clause.push("workspace_id = ?", workspace_id.to_string());
        }
        if let Some(user_id) = query.user_id {
            clause.push("user_id = ?", user_id.to_string());
        }
        if let Some(team_id) = query.team_id {
            clause.push("team_id = ?", team_id.to_string());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM role_assignments{} ORDER BY created ASC, id ASC",
            clause.render()
        ))?;
        let assignments = stmt
            .query_map(params_from_iter(clause.params.iter()), assignment_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(assignments)
    }

    pub fn delete_role_assignment(&self, id: Uuid) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM role_assignments WHERE id = ?1", [id.to_string()])?;
        if deleted == 0 {
            return Err(StoreError::not_found("role assignment", id.to_string()));
        }
        Ok(())
    }

    // ---------- defaults ----------

    /// Ensure the default workspace, user and stack exist. Safe to call repeatedly.
    pub fn initialize_defaults(&self) -> Result<(Workspace, User, StackModel)> {
        let workspace = match self.find_workspace_by_name(DEFAULT_NAME)? {
            Some(workspace) => workspace,
            None => {
                info!("Creating default workspace");
                self.create_workspace(&WorkspaceRequest {
                    name: DEFAULT_NAME.to_string(),
                    description: String::new(),
                })?
            }
        };
        let user = match self.find_user_by_name(DEFAULT_NAME)? {
            Some(user) => user,
            None => {
                info!("Creating default user");
                self.create_user(&UserRequest {
                    name: DEFAULT_NAME.to_string(),
                    active: true,
                    ..UserRequest::default()
                })?
            }
        };
        self.ensure_default_roles(user.id)?;
        let stack = self.ensure_default_stack(workspace.id, Some(user.id))?;
        Ok((workspace, user, stack))
    }

    /// Create the `admin` and `guest` roles and grant `admin` to `admin_user`.
    fn ensure_default_roles(&self, admin_user: Uuid) -> Result<()> {
        let defaults = [
            (
                DEFAULT_ADMIN_ROLE,
                BTreeSet::from([Permission::Read, Permission::Write, Permission::Me]),
            ),
            (
                DEFAULT_GUEST_ROLE,
                BTreeSet::from([Permission::Read, Permission::Me]),
            ),
        ];
        for (name, permissions) in defaults {
            if self.find_role_by_name(name)?.is_some() {
                continue;
            }
            info!(role = name, "Creating default role");
            let role = self.create_role(&RoleRequest {
                name: name.to_string(),
                permissions,
            })?;
            if name == DEFAULT_ADMIN_ROLE {
                self.create_role_assignment(&RoleAssignmentRequest {
                    role_id: role.id,
                    workspace_id: None,
                    assignee: Assignee::User(admin_user),
                })?;
            }
        }
        Ok(())
    }

    /// Create the `default` stack of a workspace with local components if missing.
    pub fn ensure_default_stack(
        &self,
        workspace_id: Uuid,
        user_id: Option<Uuid>,
    ) -> Result<StackModel> {
        if let Some(stack) = self.find_stack_by_name(workspace_id, DEFAULT_NAME)? {
            return Ok(stack);
        }

        let mut components = BTreeMap::new();
        for component_type in [ComponentType::Orchestrator, ComponentType::ArtifactStore] {
            let component =
                match self.find_component_by_name(workspace_id, component_type, DEFAULT_NAME)? {
                    Some(component) => component,
                    None => self.create_component(&ComponentRequest {
                        name: DEFAULT_NAME.to_string(),
                        component_type,
                        flavor: "local".to_string(),
                        configuration: ComponentConfig::new(),
                        user_id,
                        workspace_id,
                        is_shared: false,
                    })?,
                };
            components.insert(component_type, component.id);
        }

        info!(workspace = %workspace_id, "Creating default stack");
        self.create_stack(&StackRequest {
            name: DEFAULT_NAME.to_string(),
            description: String::new(),
            components,
            user_id,
            workspace_id,
            is_shared: false,
        })
    }

    // ---------- helpers ----------

    fn check_composition(&self, components: &BTreeMap<ComponentType, Uuid>) -> Result<()> {
        for (slot, component_id) in components {
            let component = self.get_component_by_id(*component_id)?;
            if component.component_type != *slot {
                return Err(StoreError::validation(format!(
                    "Component '{}' is a {} and cannot fill the {} slot",
                    component.name,
                    component.component_type.label(),
                    slot.label()
                )));
            }
        }
        Ok(())
    }

    fn hydrate_stack(&self, mut stack: StackModel) -> Result<StackModel> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM stack_components c \
             JOIN stack_compositions sc ON sc.component_id = c.id \
             WHERE sc.stack_id = ?1",
            COMPONENT_COLUMNS
                .split(", ")
                .map(|column| format!("c.{column}"))
                .collect::<Vec<_>>()
                .join(", ")
        ))?;
        let components = stmt
            .query_map([stack.id.to_string()], component_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        stack.components = components
            .into_iter()
            .map(|component| (component.component_type, component))
            .collect();
        Ok(stack)
    }

    fn hydrate_team(&self, mut team: Team) -> Result<Team> {
        let mut stmt = self.conn.prepare(
            "SELECT u.id, u.name, u.full_name, u.email, u.active, u.password_hash, u.created, u.updated \
             FROM users u JOIN team_memberships tm ON tm.user_id = u.id \
             WHERE tm.team_id = ?1 ORDER BY u.name",
        )?;
        team.users = stmt
            .query_map([team.id.to_string()], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(team)
    }

    /// Resolve a full UUID or a unique id prefix within an optional scope.
    fn resolve_id(
        &self,
        table: &str,
        kind: &'static str,
        scope: &str,
        scope_params: &[String],
        name_id_or_prefix: &str,
    ) -> Result<Uuid> {
        if let Ok(id) = Uuid::parse_str(name_id_or_prefix) {
            let mut params = vec![id.to_string()];
            params.extend(scope_params.iter().cloned());
            return self
                .conn
                .query_row(
                    &format!("SELECT id FROM {table} WHERE id = ?{scope}"),
                    params_from_iter(params.iter()),
                    |row| get_uuid(row, 0),
                )
                .optional()?
                .ok_or_else(|| StoreError::not_found(kind, name_id_or_prefix));
        }
        let prefix = name_id_or_prefix.to_lowercase();
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
            return Err(StoreError::not_found(kind, name_id_or_prefix));
        }

        let mut params = vec![format!("{prefix}%")];
        params.extend(scope_params.iter().cloned());
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, name FROM {table} WHERE id LIKE ?{scope}"))?;
        let matches = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                Ok((get_uuid(row, 0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        match matches.as_slice() {
            [] => Err(StoreError::not_found(kind, name_id_or_prefix)),
            [(id, _)] => Ok(*id),
            many => Err(StoreError::Ambiguous {
                kind,
                prefix: name_id_or_prefix.to_string(),
                matches: many
                    .iter()
                    .map(|(id, name)| format!("{name} ({id})"))
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    fn paged<T, F>(
        &self,
        select: &str,
        table: &str,
        clause: &WhereClause,
        filter: &ListFilter,
        map_row: F,
    ) -> Result<Page<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        filter.validate()?;
        let where_sql = clause.render();
        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {table}{where_sql}"),
            params_from_iter(clause.params.iter()),
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(&format!(
            "{select}{where_sql} ORDER BY {} ASC, id ASC LIMIT {} OFFSET {}",
            filter.sort_by.column(),
            filter.limit(),
            filter.offset()
        ))?;
        let items = stmt
            .query_map(params_from_iter(clause.params.iter()), map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Page {
            index: filter.page,
            size: filter.size,
            total: u64::try_from(total).unwrap_or(0),
            items,
        })
    }
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn get_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|err| conversion_error(idx, err))
}

fn get_optional_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| Uuid::parse_str(&value).map_err(|err| conversion_error(idx, err)))
        .transpose()
}

fn get_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| conversion_error(idx, err))
}

fn workspace_from_row(row: &Row<'_>) -> rusqlite::Result<Workspace> {
    Ok(Workspace {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created: get_time(row, 3)?,
        updated: get_time(row, 4)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        full_name: row.get(2)?,
        email: row.get(3)?,
        active: row.get(4)?,
        password_hash: row.get(5)?,
        created: get_time(row, 6)?,
        updated: get_time(row, 7)?,
    })
}

fn component_from_row(row: &Row<'_>) -> rusqlite::Result<ComponentModel> {
    let raw_type: String = row.get(2)?;
    let component_type = raw_type.parse::<ComponentType>().map_err(|err| {
        conversion_error(2, std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })?;
    let raw_config: String = row.get(4)?;
    let configuration: ComponentConfig =
        serde_json::from_str(&raw_config).map_err(|err| conversion_error(4, err))?;
    Ok(ComponentModel {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        component_type,
        flavor: row.get(3)?,
        configuration,
        user_id: get_optional_uuid(row, 5)?,
        workspace_id: get_uuid(row, 6)?,
        is_shared: row.get(7)?,
        created: get_time(row, 8)?,
        updated: get_time(row, 9)?,
    })
}

fn stack_from_row(row: &Row<'_>) -> rusqlite::Result<StackModel> {
    Ok(StackModel {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        components: BTreeMap::new(),
        user_id: get_optional_uuid(row, 3)?,
        workspace_id: get_uuid(row, 4)?,
        is_shared: row.get(5)?,
        created: get_time(row, 6)?,
        updated: get_time(row, 7)?,
    })
}

fn role_from_row(row: &Row<'_>) -> rusqlite::Result<Role> {
    let raw: String = row.get(2)?;
    let permissions: BTreeSet<Permission> =
        serde_json::from_str(&raw).map_err(|err| conversion_error(2, err))?;
    Ok(Role {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        permissions,
        created: get_time(row, 3)?,
        updated: get_time(row, 4)?,
    })
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        users: Vec::new(),
        created: get_time(row, 2)?,
        updated: get_time(row, 3)?,
    })
}

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<RoleAssignment> {
    let assignee = match (get_optional_uuid(row, 3)?, get_optional_uuid(row, 4)?) {
        (Some(user), None) => Assignee::User(user),
        (None, Some(team)) => Assignee::Team(team),
        _ => {
            return Err(conversion_error(
                3,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "role assignment must name exactly one user or team",
                ),
            ));
        }
    };
    Ok(RoleAssignment {
        id: get_uuid(row, 0)?,
        role_id: get_uuid(row, 1)?,
        workspace_id: get_optional_uuid(row, 2)?,
        assignee,
        created: get_time(row, 5)?,
    })
}
