use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::{EnvFilter, prelude::*};
use zenml::client::Client;
use zenml::filter::{DEFAULT_PAGE_SIZE, ListFilter, Page, SortBy, StringFilter};
use zenml::flavors::Flavor;
use zenml::models::{
    Assignee, ComponentConfig, ComponentModel, ComponentType, Permission, Role, RoleAssignment,
    StackModel, Team, UserUpdate, WorkspaceUpdate,
};
use zenml::{paths, stack_io};

fn main() -> Result<()> {
    let Cli { json, command } = Cli::parse();
    configure_tracing()?;
    let output = Output { json };

    match command {
        Commands::Analytics { action } => analytics_command(action, output),
        Commands::Config { action } => config_command(action, output),
        Commands::Workspace { action } => workspace_command(action, output),
        Commands::User { action } => user_command(action, output),
        Commands::Team { action } => team_command(action, output),
        Commands::Role { action } => role_command(action, output),
        Commands::Flavor { action } => flavor_command(action, output),
        Commands::Component { action } => component_command(action, output),
        Commands::Stack { action } => stack_command(action, output),
        Commands::Clean { yes } => clean(yes, output),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "zenml", &mut io::stdout());
            Ok(())
        }
    }
}

fn configure_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))?;
    Ok(())
}

fn open_client() -> Result<Client> {
    let root = paths::config_directory();
    Client::open_at(&root)
        .with_context(|| format!("Failed to open global configuration at {}", root.display()))
}

#[derive(Clone, Copy)]
struct Output {
    json: bool,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        let mut stdout = io::stdout().lock();
        if self.json {
            serde_json::to_writer_pretty(&mut stdout, value)?;
            writeln!(stdout)?;
        } else {
            writeln!(stdout, "{}", text())?;
        }
        Ok(())
    }

    fn message(&self, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        self.emit(&serde_json::json!({ "message": message }), || message.clone())
    }
}

// ---------- analytics ----------

fn analytics_command(action: AnalyticsCommands, output: Output) -> Result<()> {
    let mut client = open_client()?;
    match action {
        AnalyticsCommands::Get => {
            let opt_in = client.config().analytics_opt_in;
            output.emit(&serde_json::json!({ "analytics_opt_in": opt_in }), || {
                format!(
                    "Analytics are {}",
                    if opt_in { "enabled" } else { "disabled" }
                )
            })
        }
        AnalyticsCommands::OptIn => {
            client.set_analytics(true)?;
            output.message("Opted in to analytics")
        }
        AnalyticsCommands::OptOut => {
            client.set_analytics(false)?;
            output.message("Opted out of analytics")
        }
    }
}

// ---------- global config ----------

fn config_command(action: ConfigCommands, output: Output) -> Result<()> {
    match action {
        ConfigCommands::Path => {
            let root = paths::config_directory();
            output.emit(&serde_json::json!({ "path": root }), || {
                root.display().to_string()
            })
        }
        ConfigCommands::Show => {
            let client = open_client()?;
            let config = client.config();
            output.emit(config, || {
                serde_yaml::to_string(config).unwrap_or_default().trim_end().to_string()
            })
        }
        ConfigCommands::SetStore { url } => {
            let mut client = open_client()?;
            client
                .set_store(&url)
                .with_context(|| format!("Failed to switch store to {url}"))?;
            output.message(format!("Using store {}", client.config().store.url))
        }
    }
}

// ---------- workspaces ----------

fn workspace_command(action: WorkspaceCommands, output: Output) -> Result<()> {
    let mut client = open_client()?;
    match action {
        WorkspaceCommands::List(args) => {
            let page = client.list_workspaces(&args.filter())?;
            let active = client.config().active_workspace_name.clone();
            output.emit(&page, || {
                render_page(&page, |workspace| {
                    format!(
                        "{} {:<24} {}",
                        active_marker(active.as_deref() == Some(workspace.name.as_str())),
                        workspace.name,
                        workspace.id
                    )
                })
            })
        }
        WorkspaceCommands::Describe { name } => {
            let workspace = match name {
                Some(name) => client.get_workspace(&name)?,
                None => client.active_workspace()?,
            };
            output.emit(&workspace, || {
                format!(
                    "Workspace '{}'\n  id: {}\n  description: {}\n  created: {}",
                    workspace.name, workspace.id, workspace.description, workspace.created
                )
            })
        }
        WorkspaceCommands::Create {
            name,
            description,
            set,
        } => {
            let workspace = client.create_workspace(&name, &description)?;
            if set {
                client.set_active_workspace(&workspace.name)?;
            }
            output.emit(&workspace, || format!("Created workspace '{}'", workspace.name))
        }
        WorkspaceCommands::Update {
            name,
            new_name,
            description,
        } => {
            let workspace = client.update_workspace(
                &name,
                &WorkspaceUpdate {
                    name: new_name,
                    description,
                },
            )?;
            output.emit(&workspace, || format!("Updated workspace '{}'", workspace.name))
        }
        WorkspaceCommands::Delete { name } => {
            client.delete_workspace(&name)?;
            output.message(format!("Deleted workspace '{name}'"))
        }
        WorkspaceCommands::Set { name } => {
            let workspace = client.set_active_workspace(&name)?;
            output.emit(&workspace, || {
                format!("Set active workspace to '{}'", workspace.name)
            })
        }
    }
}

// ---------- users ----------

fn user_command(action: UserCommands, output: Output) -> Result<()> {
    let client = open_client()?;
    match action {
        UserCommands::List(args) => {
            let page = client.list_users(&args.filter())?;
            output.emit(&page, || {
                render_page(&page, |user| {
                    format!(
                        "  {:<24} {:<24} {}",
                        user.name,
                        user.email.as_deref().unwrap_or("-"),
                        user.id
                    )
                })
            })
        }
        UserCommands::Describe { name } => {
            let user = match name {
                Some(name) => client.get_user(&name)?,
                None => client.active_user()?,
            };
            output.emit(&user, || {
                format!(
                    "User '{}'\n  id: {}\n  full name: {}\n  email: {}\n  active: {}",
                    user.name,
                    user.id,
                    user.full_name,
                    user.email.as_deref().unwrap_or("-"),
                    user.active
                )
            })
        }
        UserCommands::Create {
            name,
            full_name,
            email,
            password,
            role,
        } => {
            let user =
                client.create_user(&name, &full_name, email.as_deref(), password.as_deref())?;
            if let Some(role) = role {
                client
                    .assign_role(&role, Some(user.name.as_str()), None, None)
                    .with_context(|| {
                        format!("Created user '{}' but could not assign role '{role}'", user.name)
                    })?;
            }
            output.emit(&user, || format!("Created user '{}'", user.name))
        }
        UserCommands::Update {
            name,
            new_name,
            full_name,
            email,
            password,
        } => {
            let user = client.update_user(
                &name,
                UserUpdate {
                    name: new_name,
                    full_name,
                    email,
                    ..UserUpdate::default()
                },
                password.as_deref(),
            )?;
            output.emit(&user, || format!("Updated user '{}'", user.name))
        }
        UserCommands::Delete { name } => {
            client.delete_user(&name)?;
            output.message(format!("Deleted user '{name}'"))
        }
    }
}

// ---------- teams ----------

fn team_command(action: TeamCommands, output: Output) -> Result<()> {
    let client = open_client()?;
    match action {
        TeamCommands::List(args) => {
            let page = client.list_teams(&args.filter())?;
            output.emit(&page, || {
                render_page(&page, |team| {
                    format!("  {:<24} {:<4} {}", team.name, team.users.len(), team.id)
                })
            })
        }
        TeamCommands::Describe { name } => {
            let team = client.get_team(&name)?;
            output.emit(&team, || describe_team(&team))
        }
        TeamCommands::Create { name, users } => {
            let team = client.create_team(&name, &users)?;
            output.emit(&team, || format!("Created team '{}'", team.name))
        }
        TeamCommands::Update { name, new_name } => {
            let team = client.rename_team(&name, &new_name)?;
            output.emit(&team, || format!("Updated team '{}'", team.name))
        }
        TeamCommands::Delete { name } => {
            client.delete_team(&name)?;
            output.message(format!("Deleted team '{name}'"))
        }
        TeamCommands::Add { name, users } => {
            let team = client.add_team_members(&name, &users)?;
            output.emit(&team, || {
                format!("Added {} to team '{}'", users.join(", "), team.name)
            })
        }
        TeamCommands::Remove { name, users } => {
            let team = client.remove_team_members(&name, &users)?;
            output.emit(&team, || {
                format!("Removed {} from team '{}'", users.join(", "), team.name)
            })
        }
    }
}

fn describe_team(team: &Team) -> String {
    if team.users.is_empty() {
        return format!("Team '{}' has no users", team.name);
    }
    let names: Vec<_> = team.users.iter().map(|user| user.name.as_str()).collect();
    format!("Team '{}' has the following users: {}", team.name, names.join(", "))
}

// ---------- roles ----------

#[derive(Serialize)]
struct RoleDescription<'a> {
    #[serde(flatten)]
    role: &'a Role,
    assignments: &'a [RoleAssignment],
}

fn role_command(action: RoleCommands, output: Output) -> Result<()> {
    let client = open_client()?;
    match action {
        RoleCommands::List(args) => {
            let page = client.list_roles(&args.filter())?;
            output.emit(&page, || {
                render_page(&page, |role| {
                    format!("  {:<24} {:<16} {}", role.name, permission_list(role), role.id)
                })
            })
        }
        RoleCommands::Describe { name } => {
            let role = client.get_role(&name)?;
            let assignments = client.role_assignments(Some(role.name.as_str()))?;
            let description = RoleDescription {
                role: &role,
                assignments: &assignments,
            };
            output.emit(&description, || {
                let mut lines = vec![
                    format!("Role '{}'", role.name),
                    format!("  id: {}", role.id),
                    format!("  permissions: {}", permission_list(&role)),
                ];
                for assignment in &assignments {
                    let (kind, id) = match assignment.assignee {
                        Assignee::User(id) => ("user", id),
                        Assignee::Team(id) => ("team", id),
                    };
                    let scope = assignment
                        .workspace_id
                        .map(|id| format!("workspace {id}"))
                        .unwrap_or_else(|| "all workspaces".to_string());
                    lines.push(format!("  assigned to {kind} {id} in {scope}"));
                }
                lines.join("\n")
            })
        }
        RoleCommands::Create { name, permissions } => {
            let role = client.create_role(&name, &permissions)?;
            output.emit(&role, || format!("Created role '{}'", role.name))
        }
        RoleCommands::Update {
            name,
            new_name,
            add,
            remove,
        } => {
            let role = client.update_role(&name, new_name.as_deref(), &add, &remove)?;
            output.emit(&role, || format!("Updated role '{}'", role.name))
        }
        RoleCommands::Delete { name } => {
            client.delete_role(&name)?;
            output.message(format!("Deleted role '{name}'"))
        }
        RoleCommands::Assign { role, target } => {
            let assignment = client.assign_role(
                &role,
                target.user.as_deref(),
                target.team.as_deref(),
                target.workspace.as_deref(),
            )?;
            output.emit(&assignment, || format!("Assigned role '{role}'"))
        }
        RoleCommands::Revoke { role, target } => {
            client.revoke_role(
                &role,
                target.user.as_deref(),
                target.team.as_deref(),
                target.workspace.as_deref(),
            )?;
            output.message(format!("Revoked role '{role}'"))
        }
    }
}

fn permission_list(role: &Role) -> String {
    let names: Vec<_> = role.permissions.iter().map(Permission::as_str).collect();
    names.join(",")
}

// ---------- flavors ----------

fn flavor_command(action: FlavorCommands, output: Output) -> Result<()> {
    match action {
        FlavorCommands::List { component_type } => {
            let flavors = zenml::flavors::FlavorRegistry::builtin().list(component_type);
            output.emit(&flavors, || {
                flavors
                    .iter()
                    .map(|flavor| {
                        format!(
                            "{:<20} {:<20} {:<14} {}",
                            flavor.component_type, flavor.name, flavor.integration, flavor.description
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
    }
}

// ---------- stack components ----------

fn component_command(action: ComponentCommands, output: Output) -> Result<()> {
    let client = open_client()?;
    match action {
        ComponentCommands::List {
            component_type,
            list,
        } => {
            let page = client.list_components(component_type, &list.filter())?;
            let active = client.active_stack()?;
            output.emit(&page, || {
                render_page(&page, |component| {
                    let in_use = active
                        .component(component.component_type)
                        .is_some_and(|used| used.id == component.id);
                    format!(
                        "{} {:<20} {:<24} {:<16} {}",
                        active_marker(in_use),
                        component.component_type,
                        component.name,
                        component.flavor,
                        component.id
                    )
                })
            })
        }
        ComponentCommands::Describe {
            component_type,
            name,
        } => {
            let component = match name {
                Some(name) => client.get_component(component_type, &name)?,
                None => client.active_stack()?.component(component_type).cloned().ok_or_else(
                    || anyhow!("The active stack has no {}", component_type.label()),
                )?,
            };
            let local_path = client.component_local_path(&component);
            output.emit(&component, || describe_component(&component, local_path))
        }
        ComponentCommands::Register {
            component_type,
            name,
            flavor,
            attributes,
            share,
        } => {
            let flavor_spec = client.get_flavor(component_type, &flavor)?;
            let configuration = parse_attributes(flavor_spec, &attributes)?;
            let component =
                client.register_component(component_type, &name, &flavor, configuration, share)?;
            output.emit(&component, || {
                format!(
                    "Registered {} '{}' with flavor '{}'",
                    component_type.label(),
                    component.name,
                    component.flavor
                )
            })
        }
        ComponentCommands::Update {
            component_type,
            name,
            attributes,
            share,
        } => {
            let existing = client.get_component(component_type, &name)?;
            let flavor_spec = client.get_flavor(component_type, &existing.flavor)?;
            let patch = parse_attributes(flavor_spec, &attributes)?;
            let component = client.update_component(component_type, &name, patch, share)?;
            output.emit(&component, || {
                format!("Updated {} '{}'", component_type.label(), component.name)
            })
        }
        ComponentCommands::RemoveAttribute {
            component_type,
            name,
            keys,
        } => {
            let component = client.remove_component_attributes(component_type, &name, &keys)?;
            output.emit(&component, || {
                format!(
                    "Removed {} from {} '{}'",
                    keys.join(", "),
                    component_type.label(),
                    component.name
                )
            })
        }
        ComponentCommands::Rename {
            component_type,
            name,
            new_name,
        } => {
            let component = client.rename_component(component_type, &name, &new_name)?;
            output.emit(&component, || {
                format!(
                    "Renamed {} '{name}' to '{}'",
                    component_type.label(),
                    component.name
                )
            })
        }
        ComponentCommands::Delete {
            component_type,
            name,
        } => {
            client.delete_component(component_type, &name)?;
            output.message(format!("Deleted {} '{name}'", component_type.label()))
        }
    }
}

fn parse_attributes(flavor: &Flavor, attributes: &[String]) -> Result<ComponentConfig> {
    let mut configuration = ComponentConfig::new();
    for attribute in attributes {
        let (key, raw) = attribute
            .split_once('=')
            .with_context(|| format!("Expected key=value, got '{attribute}'"))?;
        let value = match flavor.field(key) {
            Some(field) => field.kind.parse(raw).with_context(|| {
                format!("Invalid value '{raw}' for attribute '{key}' ({:?})", field.kind)
            })?,
            // Unknown keys are rejected by the flavor schema with a better message.
            None => Value::String(raw.to_string()),
        };
        configuration.insert(key.to_string(), value);
    }
    Ok(configuration)
}

fn describe_component(component: &ComponentModel, local_path: Option<PathBuf>) -> String {
    let mut lines = vec![
        format!("{} '{}'", component.component_type.label(), component.name),
        format!("  id: {}", component.id),
        format!("  flavor: {}", component.flavor),
        format!("  shared: {}", component.is_shared),
    ];
    if let Some(path) = local_path {
        lines.push(format!("  local store: {}", path.display()));
    }
    if !component.configuration.is_empty() {
        lines.push("  configuration:".to_string());
        for (key, value) in &component.configuration {
            lines.push(format!("    {key}: {value}"));
        }
    }
    lines.join("\n")
}

// ---------- stacks ----------

fn stack_command(action: StackCommands, output: Output) -> Result<()> {
    let mut client = open_client()?;
    match action {
        StackCommands::List(args) => {
            let page = client.list_stacks(&args.filter())?;
            let active = client.active_stack()?;
            output.emit(&page, || {
                render_page(&page, |stack| {
                    let kinds: Vec<_> = stack.components.keys().map(|kind| kind.as_str()).collect();
                    format!(
                        "{} {:<24} {} [{}]",
                        active_marker(stack.id == active.id),
                        stack.name,
                        stack.id,
                        kinds.join(", ")
                    )
                })
            })
        }
        StackCommands::Describe { name } => {
            let stack = client.get_stack(name.as_deref())?;
            let active = client.active_stack()?.id == stack.id;
            output.emit(&stack, || describe_stack(&stack, active))
        }
        StackCommands::Register {
            name,
            description,
            components,
            set,
            share,
        } => {
            let stack = client.register_stack(&name, &description, &components.selection(), share)?;
            if set {
                client.set_active_stack(&stack.name)?;
            }
            output.emit(&stack, || format!("Registered stack '{}'", stack.name))
        }
        StackCommands::Update {
            name,
            description,
            components,
        } => {
            let stack = client.update_stack(
                name.as_deref(),
                &components.selection(),
                description.as_deref(),
            )?;
            output.emit(&stack, || format!("Updated stack '{}'", stack.name))
        }
        StackCommands::RemoveComponent { name, kinds } => {
            let stack = client.remove_stack_components(name.as_deref(), &kinds)?;
            output.emit(&stack, || format!("Updated stack '{}'", stack.name))
        }
        StackCommands::Rename { name, new_name } => {
            let stack = client.rename_stack(&name, &new_name)?;
            output.emit(&stack, || format!("Renamed stack '{name}' to '{}'", stack.name))
        }
        StackCommands::Set { name } => {
            let stack = client.set_active_stack(&name)?;
            output.emit(&stack, || format!("Set active stack to '{}'", stack.name))
        }
        StackCommands::Get => {
            let stack = client.active_stack()?;
            output.emit(&stack, || format!("The active stack is '{}'", stack.name))
        }
        StackCommands::Delete { name } => {
            client.delete_stack(&name)?;
            output.message(format!("Deleted stack '{name}'"))
        }
        StackCommands::Export { file, stack } => {
            let export = stack_io::export_stack(&client, stack.as_deref(), &file)
                .with_context(|| format!("Failed to export stack to {}", file.display()))?;
            output.emit(&export, || {
                format!(
                    "Exported stack '{}' to {}",
                    export.stack_name,
                    file.display()
                )
            })
        }
        StackCommands::Import { file, name, set } => {
            let stack = stack_io::import_stack(&client, &file, name.as_deref())
                .with_context(|| format!("Failed to import stack from {}", file.display()))?;
            if set {
                client.set_active_stack(&stack.name)?;
            }
            output.emit(&stack, || format!("Imported stack '{}'", stack.name))
        }
    }
}

fn describe_stack(stack: &StackModel, active: bool) -> String {
    let mut lines = vec![format!(
        "Stack '{}'{}\n  id: {}",
        stack.name,
        if active { " (active)" } else { "" },
        stack.id
    )];
    if !stack.description.is_empty() {
        lines.push(format!("  description: {}", stack.description));
    }
    for (kind, component) in &stack.components {
        lines.push(format!(
            "  {:<20} {} ({})",
            kind.as_str(),
            component.name,
            component.flavor
        ));
    }
    lines.join("\n")
}

// ---------- reset ----------

fn clean(yes: bool, output: Output) -> Result<()> {
    if !yes {
        bail!("This deletes all stacks, components and local stores; pass --yes to confirm");
    }
    let root = paths::config_directory();
    Client::reset_at(&root).with_context(|| format!("Failed to reset {}", root.display()))?;
    output.message(format!("Reset global configuration at {}", root.display()))
}

fn render_page<T>(page: &Page<T>, row: impl Fn(&T) -> String) -> String {
    if page.is_empty() {
        return "Nothing to show".to_string();
    }
    let mut lines: Vec<String> = page.items.iter().map(row).collect();
    if page.total_pages() > 1 {
        lines.push(format!(
            "Page {} of {} ({} total)",
            page.index,
            page.total_pages(),
            page.total
        ));
    }
    lines.join("\n")
}

fn active_marker(active: bool) -> &'static str {
    if active { "*" } else { " " }
}

#[derive(Parser)]
#[command(
    name = "zenml",
    version,
    about = "Manage the local global configuration, stacks and stack components"
)]
struct Cli {
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Analytics {
        #[command(subcommand)]
        action: AnalyticsCommands,
    },
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
    Workspace {
        #[command(subcommand)]
        action: WorkspaceCommands,
    },
    User {
        #[command(subcommand)]
        action: UserCommands,
    },
    Team {
        #[command(subcommand)]
        action: TeamCommands,
    },
    Role {
        #[command(subcommand)]
        action: RoleCommands,
    },
    Flavor {
        #[command(subcommand)]
        action: FlavorCommands,
    },
    Component {
        #[command(subcommand)]
        action: ComponentCommands,
    },
    Stack {
        #[command(subcommand)]
        action: StackCommands,
    },
    /// Delete all local state and start from the defaults.
    Clean {
        #[arg(long)]
        yes: bool,
    },
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
struct ListArgs {
    /// Name filter, e.g. `contains:prod` or `startswith:aws`.
    #[arg(long)]
    name: Option<StringFilter>,
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    size: u32,
    #[arg(long = "sort-by", default_value = "created")]
    sort_by: SortBy,
}

impl ListArgs {
    fn filter(&self) -> ListFilter {
        ListFilter {
            name: self.name.clone(),
            page: self.page,
            size: self.size,
            sort_by: self.sort_by,
        }
    }
}

#[derive(Subcommand)]
enum AnalyticsCommands {
    Get,
    OptIn,
    OptOut,
}

#[derive(Subcommand)]
enum ConfigCommands {
    Show,
    Path,
    /// Point the configuration at another SQLite database (`sqlite:///<path>`).
    SetStore { url: String },
}

#[derive(Subcommand)]
enum WorkspaceCommands {
    List(ListArgs),
    Describe {
        name: Option<String>,
    },
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        set: bool,
    },
    Update {
        name: String,
        #[arg(long = "name")]
        new_name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        name: String,
    },
    Set {
        name: String,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    List(ListArgs),
    Describe {
        name: Option<String>,
    },
    Create {
        name: String,
        #[arg(long = "full-name", default_value = "")]
        full_name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        /// Grant this role in every workspace once the user exists.
        #[arg(short, long)]
        role: Option<String>,
    },
    Update {
        name: String,
        #[arg(long = "name")]
        new_name: Option<String>,
        #[arg(long = "full-name")]
        full_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    Delete {
        name: String,
    },
}

#[derive(Subcommand)]
enum TeamCommands {
    List(ListArgs),
    /// List the users in a team.
    Describe {
        name: String,
    },
    Create {
        name: String,
        #[arg(long = "user")]
        users: Vec<String>,
    },
    Update {
        name: String,
        #[arg(short, long = "name")]
        new_name: String,
    },
    Delete {
        name: String,
    },
    Add {
        name: String,
        #[arg(long = "user", required = true)]
        users: Vec<String>,
    },
    Remove {
        name: String,
        #[arg(long = "user", required = true)]
        users: Vec<String>,
    },
}

#[derive(Args)]
struct AssignmentTarget {
    #[arg(long, conflicts_with = "team", required_unless_present = "team")]
    user: Option<String>,
    #[arg(long)]
    team: Option<String>,
    /// Limit the grant to one workspace instead of all of them.
    #[arg(long)]
    workspace: Option<String>,
}

#[derive(Subcommand)]
enum RoleCommands {
    List(ListArgs),
    Describe {
        name: String,
    },
    Create {
        name: String,
        #[arg(short, long, value_delimiter = ',', required = true)]
        permissions: Vec<Permission>,
    },
    Update {
        name: String,
        #[arg(short, long = "name")]
        new_name: Option<String>,
        #[arg(long = "add-permission")]
        add: Vec<Permission>,
        #[arg(long = "remove-permission")]
        remove: Vec<Permission>,
    },
    Delete {
        name: String,
    },
    Assign {
        role: String,
        #[command(flatten)]
        target: AssignmentTarget,
    },
    Revoke {
        role: String,
        #[command(flatten)]
        target: AssignmentTarget,
    },
}

#[derive(Subcommand)]
enum FlavorCommands {
    List {
        #[arg(long = "type")]
        component_type: Option<ComponentType>,
    },
}

#[derive(Subcommand)]
enum ComponentCommands {
    List {
        #[arg(long = "type")]
        component_type: Option<ComponentType>,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Describe a component, or the active stack's component of this type.
    Describe {
        #[arg(long = "type")]
        component_type: ComponentType,
        name: Option<String>,
    },
    Register {
        #[arg(long = "type")]
        component_type: ComponentType,
        name: String,
        #[arg(short, long)]
        flavor: String,
        /// Configuration as `key=value` pairs.
        attributes: Vec<String>,
        #[arg(long)]
        share: bool,
    },
    Update {
        #[arg(long = "type")]
        component_type: ComponentType,
        name: String,
        attributes: Vec<String>,
        #[arg(long)]
        share: Option<bool>,
    },
    RemoveAttribute {
        #[arg(long = "type")]
        component_type: ComponentType,
        name: String,
        #[arg(required = true)]
        keys: Vec<String>,
    },
    Rename {
        #[arg(long = "type")]
        component_type: ComponentType,
        name: String,
        new_name: String,
    },
    Delete {
        #[arg(long = "type")]
        component_type: ComponentType,
        name: String,
    },
}

#[derive(Args, Default)]
struct StackComponentArgs {
    #[arg(short = 'o', long)]
    orchestrator: Option<String>,
    #[arg(short = 'a', long)]
    artifact_store: Option<String>,
    #[arg(short = 'm', long)]
    metadata_store: Option<String>,
    #[arg(short = 'c', long)]
    container_registry: Option<String>,
    #[arg(short = 'x', long)]
    secrets_manager: Option<String>,
    #[arg(long)]
    data_validator: Option<String>,
    #[arg(short = 'e', long)]
    experiment_tracker: Option<String>,
    #[arg(short = 's', long)]
    step_operator: Option<String>,
    #[arg(short = 'd', long)]
    model_deployer: Option<String>,
    #[arg(short = 'f', long)]
    feature_store: Option<String>,
    #[arg(long)]
    alerter: Option<String>,
    #[arg(long)]
    annotator: Option<String>,
    #[arg(short = 'i', long)]
    image_builder: Option<String>,
}

impl StackComponentArgs {
    fn selection(&self) -> BTreeMap<ComponentType, String> {
        [
            (ComponentType::Orchestrator, &self.orchestrator),
            (ComponentType::ArtifactStore, &self.artifact_store),
            (ComponentType::MetadataStore, &self.metadata_store),
            (ComponentType::ContainerRegistry, &self.container_registry),
            (ComponentType::SecretsManager, &self.secrets_manager),
            (ComponentType::DataValidator, &self.data_validator),
            (ComponentType::ExperimentTracker, &self.experiment_tracker),
            (ComponentType::StepOperator, &self.step_operator),
            (ComponentType::ModelDeployer, &self.model_deployer),
            (ComponentType::FeatureStore, &self.feature_store),
            (ComponentType::Alerter, &self.alerter),
            (ComponentType::Annotator, &self.annotator),
            (ComponentType::ImageBuilder, &self.image_builder),
        ]
        .into_iter()
        .filter_map(|(kind, name)| name.clone().map(|name| (kind, name)))
        .collect()
    }
}

#[derive(Subcommand)]
enum StackCommands {
    List(ListArgs),
    /// Describe a stack, the active one by default.
    Describe {
        name: Option<String>,
    },
    Register {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[command(flatten)]
        components: StackComponentArgs,
        #[arg(long)]
        set: bool,
        #[arg(long)]
        share: bool,
    },
    /// Swap components of a stack, the active one by default.
    Update {
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[command(flatten)]
        components: StackComponentArgs,
    },
    RemoveComponent {
        name: Option<String>,
        #[arg(long = "type", required = true)]
        kinds: Vec<ComponentType>,
    },
    Rename {
        name: String,
        new_name: String,
    },
    Set {
        name: String,
    },
    Get,
    Delete {
        name: String,
    },
    Export {
        file: PathBuf,
        #[arg(long)]
        stack: Option<String>,
    },
    Import {
        file: PathBuf,
        /// Register under this name instead of the one in the file.
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        set: bool,
    },
}
