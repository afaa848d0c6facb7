use std::collections::BTreeMap;
use std::fs;

use serde_json::json;
use tempfile::tempdir;
use zenml::client::Client;
use zenml::error::StoreError;
use zenml::filter::{ListFilter, StringFilter};
use zenml::models::{Assignee, ComponentConfig, ComponentType, Permission, UserUpdate, WorkspaceUpdate};
use zenml::paths;

fn config(value: serde_json::Value) -> ComponentConfig {
    value.as_object().cloned().unwrap_or_default()
}

fn selection(pairs: &[(ComponentType, &str)]) -> BTreeMap<ComponentType, String> {
    pairs
        .iter()
        .map(|(kind, name)| (*kind, name.to_string()))
        .collect()
}

/// Register a second local artifact store and a stack using it.
fn register_local_stack(client: &Client, stack: &str, store: &str) {
    client
        .register_component(
            ComponentType::ArtifactStore,
            store,
            "local",
            ComponentConfig::new(),
            false,
        )
        .expect("register artifact store");
    client
        .register_stack(
            stack,
            "",
            &selection(&[
                (ComponentType::Orchestrator, "default"),
                (ComponentType::ArtifactStore, store),
            ]),
            false,
        )
        .expect("register stack");
}

#[test]
fn first_open_creates_defaults_on_disk() {
    let temp = tempdir().unwrap();
    let client = Client::open_at(temp.path()).expect("open client");

    assert!(paths::config_file(temp.path()).is_file());
    assert!(paths::default_database(temp.path()).is_file());
    assert_eq!(client.config().active_stack_name.as_deref(), Some("default"));
    assert_eq!(
        client.config().active_workspace_name.as_deref(),
        Some("default")
    );

    let stack = client.active_stack().unwrap();
    assert!(stack.is_valid());
    let store = stack.component(ComponentType::ArtifactStore).unwrap();
    assert_eq!(store.flavor, "local");
    assert!(paths::local_store_path(temp.path(), store.id).is_dir());
}

#[test]
fn reopening_keeps_the_same_defaults() {
    let temp = tempdir().unwrap();
    let first = Client::open_at(temp.path()).unwrap().active_stack().unwrap();
    let second = Client::open_at(temp.path()).unwrap().active_stack().unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.component_ids(), second.component_ids());
}

#[test]
fn dangling_active_stack_falls_back_to_default() {
    let temp = tempdir().unwrap();
    {
        let client = Client::open_at(temp.path()).unwrap();
        let mut config = client.config().clone();
        config.set_active_stack("ghost");
        config.save(temp.path()).unwrap();
    }
    let client = Client::open_at(temp.path()).unwrap();
    assert_eq!(client.config().active_stack_name.as_deref(), Some("default"));
}

#[test]
fn default_stack_is_protected() {
    let temp = tempdir().unwrap();
    let mut client = Client::open_at(temp.path()).unwrap();

    let err = client.delete_stack("default").unwrap_err();
    assert!(matches!(err, StoreError::IllegalOperation(_)));
    let err = client
        .update_stack(Some("default"), &BTreeMap::new(), Some("changed"))
        .unwrap_err();
    assert!(matches!(err, StoreError::IllegalOperation(_)));
    let err = client.rename_stack("default", "other").unwrap_err();
    assert!(matches!(err, StoreError::IllegalOperation(_)));
}

#[test]
fn active_stack_cannot_be_deleted() {
    let temp = tempdir().unwrap();
    let mut client = Client::open_at(temp.path()).unwrap();
    register_local_stack(&client, "dev", "dev_store");

    client.set_active_stack("dev").unwrap();
    let err = client.delete_stack("dev").unwrap_err();
    assert!(matches!(err, StoreError::IllegalOperation(_)));

    client.set_active_stack("default").unwrap();
    client.delete_stack("dev").expect("inactive stack can be deleted");
    assert!(client.get_stack(Some("dev")).unwrap_err().is_not_found());
}

#[test]
fn renaming_the_active_stack_updates_the_config() {
    let temp = tempdir().unwrap();
    let mut client = Client::open_at(temp.path()).unwrap();
    register_local_stack(&client, "dev", "dev_store");
    client.set_active_stack("dev").unwrap();

    client.rename_stack("dev", "staging").unwrap();
    assert_eq!(client.config().active_stack_name.as_deref(), Some("staging"));

    let reopened = Client::open_at(temp.path()).unwrap();
    assert_eq!(reopened.active_stack().unwrap().name, "staging");
}

#[test]
fn components_in_use_cannot_be_deleted() {
    let temp = tempdir().unwrap();
    let client = Client::open_at(temp.path()).unwrap();
    register_local_stack(&client, "dev", "dev_store");

    let store = client
        .get_component(ComponentType::ArtifactStore, "dev_store")
        .unwrap();
    let local_dir = paths::local_store_path(temp.path(), store.id);
    assert!(local_dir.is_dir());

    let err = client
        .delete_component(ComponentType::ArtifactStore, "dev_store")
        .unwrap_err();
    assert!(matches!(err, StoreError::IllegalOperation(_)));

    client.delete_stack("dev").unwrap();
    client
        .delete_component(ComponentType::ArtifactStore, "dev_store")
        .expect("unused component can be deleted");
    assert!(!local_dir.exists());
}

#[test]
fn default_components_cannot_be_renamed_or_deleted() {
    let temp = tempdir().unwrap();
    let client = Client::open_at(temp.path()).unwrap();

    let err = client
        .rename_component(ComponentType::Orchestrator, "default", "mine")
        .unwrap_err();
    assert!(matches!(err, StoreError::IllegalOperation(_)));
    let err = client
        .delete_component(ComponentType::ArtifactStore, "default")
        .unwrap_err();
    assert!(matches!(err, StoreError::IllegalOperation(_)));
}

#[test]
fn secret_references_are_not_valid_component_names() {
    let temp = tempdir().unwrap();
    let client = Client::open_at(temp.path()).unwrap();
    let err = client
        .register_component(
            ComponentType::ArtifactStore,
            "{{aws.secret}}",
            "local",
            ComponentConfig::new(),
            false,
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
}

#[test]
fn component_configuration_is_validated_and_merged() {
    let temp = tempdir().unwrap();
    let client = Client::open_at(temp.path()).unwrap();

    let err = client
        .register_component(
            ComponentType::ContainerRegistry,
            "registry",
            "default",
            config(json!({ "url": "localhost:5000" })),
            false,
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidConfig(_)));

    client
        .register_component(
            ComponentType::Orchestrator,
            "kfp",
            "kubeflow",
            config(json!({ "kubernetes_context": "k3d-zenml" })),
            false,
        )
        .unwrap();
    let updated = client
        .update_component(
            ComponentType::Orchestrator,
            "kfp",
            config(json!({ "kubeflow_pipelines_ui_port": 9090 })),
            None,
        )
        .unwrap();
    assert_eq!(updated.configuration["kubernetes_context"], "k3d-zenml");
    assert_eq!(updated.configuration["kubeflow_pipelines_ui_port"], 9090);

    let err = client
        .remove_component_attributes(
            ComponentType::Orchestrator,
            "kfp",
            &["kubernetes_context".to_string()],
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::IllegalOperation(_)));
}

#[test]
fn remote_orchestrator_with_local_artifact_store_is_rejected() {
    let temp = tempdir().unwrap();
    let client = Client::open_at(temp.path()).unwrap();
    client
        .register_component(
            ComponentType::Orchestrator,
            "kfp",
            "kubeflow",
            config(json!({ "kubernetes_context": "gke-prod" })),
            false,
        )
        .unwrap();
    client
        .register_component(
            ComponentType::ContainerRegistry,
            "gcr",
            "default",
            config(json!({ "uri": "gcr.io/project" })),
            false,
        )
        .unwrap();

    let components = selection(&[
        (ComponentType::Orchestrator, "kfp"),
        (ComponentType::ArtifactStore, "default"),
        (ComponentType::ContainerRegistry, "gcr"),
    ]);
    let err = client
        .register_stack("remote", "", &components, false)
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    client
        .update_component(
            ComponentType::Orchestrator,
            "kfp",
            config(json!({ "skip_local_validations": true })),
            None,
        )
        .unwrap();
    client
        .register_stack("remote", "", &components, false)
        .expect("skipped local validations only warn");
}

#[test]
fn optional_components_can_be_removed_from_a_stack() {
    let temp = tempdir().unwrap();
    let client = Client::open_at(temp.path()).unwrap();
    register_local_stack(&client, "dev", "dev_store");
    client
        .register_component(
            ComponentType::ContainerRegistry,
            "local_registry",
            "default",
            config(json!({ "uri": "localhost:5000" })),
            false,
        )
        .unwrap();

    let stack = client
        .update_stack(
            Some("dev"),
            &selection(&[(ComponentType::ContainerRegistry, "local_registry")]),
            None,
        )
        .unwrap();
    assert!(stack.component(ComponentType::ContainerRegistry).is_some());

    let err = client
        .remove_stack_components(Some("dev"), &[ComponentType::ArtifactStore])
        .unwrap_err();
    assert!(matches!(err, StoreError::IllegalOperation(_)));

    let stack = client
        .remove_stack_components(Some("dev"), &[ComponentType::ContainerRegistry])
        .unwrap();
    assert!(stack.component(ComponentType::ContainerRegistry).is_none());
    assert!(stack.is_valid());
}

#[test]
fn stacks_resolve_by_id_prefix() {
    let temp = tempdir().unwrap();
    let client = Client::open_at(temp.path()).unwrap();
    let stack = client.active_stack().unwrap();
    let prefix = &stack.id.to_string()[..8];
    assert_eq!(client.get_stack(Some(prefix)).unwrap().id, stack.id);
}

#[test]
fn stack_listing_filters_by_name() {
    let temp = tempdir().unwrap();
    let client = Client::open_at(temp.path()).unwrap();
    register_local_stack(&client, "prod-eu", "eu_store");
    register_local_stack(&client, "prod-us", "us_store");

    let filter = ListFilter::default().with_name("startswith:prod".parse::<StringFilter>().unwrap());
    let page = client.list_stacks(&filter).unwrap();
    assert_eq!(page.total, 2);
    assert!(page.items.iter().all(|stack| stack.name.starts_with("prod")));
}

#[test]
fn default_workspace_and_user_are_protected() {
    let temp = tempdir().unwrap();
    let mut client = Client::open_at(temp.path()).unwrap();

    let err = client
        .update_workspace(
            "default",
            &WorkspaceUpdate {
                name: Some("renamed".into()),
                ..WorkspaceUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::IllegalOperation(_)));
    assert!(matches!(
        client.delete_workspace("default").unwrap_err(),
        StoreError::IllegalOperation(_)
    ));

    let err = client
        .update_user(
            "default",
            UserUpdate {
                name: Some("admin".into()),
                ..UserUpdate::default()
            },
            None,
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::IllegalOperation(_)));
    assert!(matches!(
        client.delete_user("default").unwrap_err(),
        StoreError::IllegalOperation(_)
    ));

    client
        .create_user("aria", "Aria", Some("aria@example.com"), Some("catnip"))
        .unwrap();
    client.delete_user("aria").expect("regular users can be deleted");
}

#[test]
fn workspaces_get_their_own_default_stack() {
    let temp = tempdir().unwrap();
    let mut client = Client::open_at(temp.path()).unwrap();
    let default_stack = client.active_stack().unwrap();

    client.create_workspace("research", "experiments").unwrap();
    client.set_active_workspace("research").unwrap();
    let stack = client.active_stack().unwrap();
    assert_eq!(stack.name, "default");
    assert_ne!(stack.id, default_stack.id);

    let err = client.delete_workspace("research").unwrap_err();
    assert!(matches!(err, StoreError::IllegalOperation(_)));

    client.set_active_workspace("default").unwrap();
    client.delete_workspace("research").unwrap();
    assert_eq!(client.active_stack().unwrap().id, default_stack.id);
}

#[test]
fn analytics_setting_persists() {
    let temp = tempdir().unwrap();
    let mut client = Client::open_at(temp.path()).unwrap();
    client.set_analytics(false).unwrap();
    let reopened = Client::open_at(temp.path()).unwrap();
    assert!(!reopened.config().analytics_opt_in);
}

#[test]
fn set_store_moves_state_to_another_database() {
    let temp = tempdir().unwrap();
    let mut client = Client::open_at(temp.path()).unwrap();
    register_local_stack(&client, "dev", "dev_store");

    let other = temp.path().join("other").join("store.db");
    client
        .set_store(&format!("sqlite:///{}", other.display()))
        .unwrap();
    assert!(other.is_file());
    assert!(client.get_stack(Some("dev")).unwrap_err().is_not_found());
    assert_eq!(client.active_stack().unwrap().name, "default");
}

#[test]
fn reset_removes_all_local_state() {
    let temp = tempdir().unwrap();
    let client = Client::open_at(temp.path()).unwrap();
    register_local_stack(&client, "dev", "dev_store");
    let old_user = client.config().user_id;
    fs::write(
        paths::local_stores_root(temp.path()).join("stray.txt"),
        "left over",
    )
    .unwrap();

    let client = client.reset().unwrap();
    assert!(client.get_stack(Some("dev")).unwrap_err().is_not_found());
    assert_ne!(client.config().user_id, old_user);
    assert!(!paths::local_stores_root(temp.path()).join("stray.txt").exists());
    assert_eq!(client.active_stack().unwrap().name, "default");
}

#[test]
fn full_ids_resolve_only_within_the_requested_type() {
    let temp = tempdir().unwrap();
    let client = Client::open_at(temp.path()).unwrap();
    let kfp = client
        .register_component(
            ComponentType::Orchestrator,
            "kfp",
            "kubeflow",
            config(json!({ "kubernetes_context": "k3d-local" })),
            false,
        )
        .unwrap();
    let id = kfp.id.to_string();

    let err = client
        .get_component(ComponentType::ArtifactStore, &id)
        .unwrap_err();
    assert!(err.is_not_found(), "{err}");
    assert!(client
        .delete_component(ComponentType::ArtifactStore, &id)
        .unwrap_err()
        .is_not_found());
    assert!(client
        .rename_component(ComponentType::ArtifactStore, &id, "renamed")
        .unwrap_err()
        .is_not_found());

    let survivor = client.get_component(ComponentType::Orchestrator, &id).unwrap();
    assert_eq!(survivor.name, "kfp");
}

#[test]
fn stacks_of_other_workspaces_cannot_be_activated_by_id() {
    let temp = tempdir().unwrap();
    let mut client = Client::open_at(temp.path()).unwrap();
    client.create_workspace("other", "").unwrap();
    client.set_active_workspace("other").unwrap();
    register_local_stack(&client, "prod", "prod_store");
    let prod = client.get_stack(Some("prod")).unwrap();

    client.set_active_workspace("default").unwrap();
    let id = prod.id.to_string();
    assert!(client.get_stack(Some(&id)).unwrap_err().is_not_found());
    assert!(client.set_active_stack(&id).unwrap_err().is_not_found());
    assert!(client.delete_stack(&id).unwrap_err().is_not_found());

    let active = client.active_stack().expect("active stack still resolves");
    assert_eq!(active.name, "default");
    let reopened = Client::open_at(temp.path()).unwrap();
    assert_eq!(reopened.config().active_stack_name.as_deref(), Some("default"));
}

#[test]
fn reset_at_recovers_from_a_corrupt_config() {
    let temp = tempdir().unwrap();
    {
        let client = Client::open_at(temp.path()).unwrap();
        register_local_stack(&client, "dev", "dev_store");
    }
    fs::write(paths::config_file(temp.path()), "store: [not: valid").unwrap();
    assert!(Client::open_at(temp.path()).is_err());

    let client = Client::reset_at(temp.path()).expect("reset ignores the broken config");
    assert_eq!(client.active_stack().unwrap().name, "default");
    assert!(client.get_stack(Some("dev")).unwrap_err().is_not_found());
    assert!(Client::open_at(temp.path()).is_ok());
}

#[test]
fn default_roles_are_protected() {
    let temp = tempdir().unwrap();
    let client = Client::open_at(temp.path()).unwrap();

    let err = client
        .update_role("admin", None, &[], &[Permission::Write])
        .unwrap_err();
    assert!(matches!(err, StoreError::IllegalOperation(_)));
    assert!(matches!(
        client.delete_role("guest").unwrap_err(),
        StoreError::IllegalOperation(_)
    ));

    let default_user = client.active_user().unwrap();
    let grants = client.role_assignments(Some("admin")).unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].assignee, Assignee::User(default_user.id));
}

#[test]
fn role_permissions_can_be_granted_and_withdrawn() {
    let temp = tempdir().unwrap();
    let client = Client::open_at(temp.path()).unwrap();
    client.create_role("cat_feeder", &[Permission::Read]).unwrap();
    assert!(matches!(
        client.create_role("cat_feeder", &[Permission::Read]).unwrap_err(),
        StoreError::AlreadyExists { .. }
    ));

    let role = client
        .update_role("cat_feeder", Some("cat_groomer"), &[Permission::Write], &[Permission::Read])
        .unwrap();
    assert_eq!(role.name, "cat_groomer");
    assert_eq!(role.permissions.iter().copied().collect::<Vec<_>>(), vec![Permission::Write]);

    let err = client
        .update_role("cat_groomer", None, &[Permission::Me], &[Permission::Me])
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    client.delete_role("cat_groomer").unwrap();
    assert!(client.get_role("cat_groomer").unwrap_err().is_not_found());
}

#[test]
fn roles_are_assigned_to_exactly_one_user_or_team() {
    let temp = tempdir().unwrap();
    let client = Client::open_at(temp.path()).unwrap();
    client.create_user("aria", "", None, Some("catnip")).unwrap();
    client.create_team("cats", &["aria".to_string()]).unwrap();

    let err = client
        .assign_role("guest", Some("aria"), Some("cats"), None)
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert!(client.assign_role("guest", None, None, None).is_err());

    client
        .assign_role("guest", None, Some("cats"), Some("default"))
        .unwrap();
    client.assign_role("guest", Some("aria"), None, None).unwrap();
    assert_eq!(client.role_assignments(Some("guest")).unwrap().len(), 2);

    // Revoking needs the same workspace scope the grant was made with.
    assert!(client
        .revoke_role("guest", None, Some("cats"), None)
        .unwrap_err()
        .is_not_found());
    client
        .revoke_role("guest", None, Some("cats"), Some("default"))
        .unwrap();
    client.delete_user("aria").unwrap();
    assert!(client.role_assignments(Some("guest")).unwrap().is_empty());
}

#[test]
fn team_members_are_added_and_removed() {
    let temp = tempdir().unwrap();
    let client = Client::open_at(temp.path()).unwrap();
    client.create_user("aria", "", None, None).unwrap();
    client.create_user("blupus", "", None, None).unwrap();

    let team = client.create_team("cats", &["aria".to_string()]).unwrap();
    assert_eq!(team.users.len(), 1);
    assert!(matches!(
        client.create_team("cats", &[]).unwrap_err(),
        StoreError::AlreadyExists { .. }
    ));
    assert!(client
        .create_team("dogs", &["rex".to_string()])
        .unwrap_err()
        .is_not_found());

    let team = client
        .add_team_members("cats", &["blupus".to_string()])
        .unwrap();
    let names: Vec<_> = team.users.iter().map(|user| user.name.as_str()).collect();
    assert_eq!(names, vec!["aria", "blupus"]);

    let team = client
        .remove_team_members("cats", &["aria".to_string()])
        .unwrap();
    assert_eq!(team.users.len(), 1);

    let team = client.rename_team("cats", "felines").unwrap();
    assert_eq!(team.name, "felines");
    client.delete_team("felines").unwrap();
    assert!(client.get_team("felines").unwrap_err().is_not_found());
}
