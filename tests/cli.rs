use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;
use tempfile::tempdir;

fn zenml(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("zenml").expect("binary present");
    cmd.env("ZENML_CONFIG_PATH", config).env("RUST_LOG", "warn");
    cmd
}

fn json_output(config: &Path, args: &[&str]) -> Value {
    let output = zenml(config)
        .arg("--json")
        .args(args)
        .output()
        .expect("run zenml");
    assert!(
        output.status.success(),
        "zenml {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json output")
}

fn text_output(config: &Path, args: &[&str]) -> String {
    let output = zenml(config).args(args).output().expect("run zenml");
    assert!(
        output.status.success(),
        "zenml {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn config_path_honours_environment_override() {
    let temp = tempdir().unwrap();
    let output = json_output(temp.path(), &["config", "path"]);
    assert_eq!(output["path"], temp.path().display().to_string());
}

#[test]
fn first_command_initializes_the_config_directory() {
    let temp = tempdir().unwrap();
    let stdout = text_output(temp.path(), &["stack", "get"]);
    assert!(stdout.contains("'default'"), "{stdout}");

    assert!(temp.path().join("config.yaml").is_file());
    assert!(temp.path().join("zenml.db").is_file());
    assert!(temp.path().join("local_stores").is_dir());
}

#[test]
fn analytics_opt_out_is_persisted() {
    let temp = tempdir().unwrap();
    zenml(temp.path())
        .args(["analytics", "opt-out"])
        .assert()
        .success();
    let output = json_output(temp.path(), &["analytics", "get"]);
    assert_eq!(output["analytics_opt_in"], false);

    let config = std::fs::read_to_string(temp.path().join("config.yaml")).unwrap();
    assert!(config.contains("analytics_opt_in: false"));
}

#[test]
fn register_and_activate_a_stack() {
    let temp = tempdir().unwrap();
    zenml(temp.path())
        .args([
            "component",
            "register",
            "--type",
            "artifact-store",
            "local_store",
            "--flavor",
            "local",
        ])
        .assert()
        .success();
    zenml(temp.path())
        .args([
            "component",
            "register",
            "--type",
            "container_registry",
            "registry",
            "--flavor",
            "default",
            "uri=localhost:5000",
        ])
        .assert()
        .success();
    zenml(temp.path())
        .args([
            "stack",
            "register",
            "dev",
            "-o",
            "default",
            "-a",
            "local_store",
            "-c",
            "registry",
            "--set",
        ])
        .assert()
        .success();

    let active = json_output(temp.path(), &["stack", "get"]);
    assert_eq!(active["name"], "dev");
    assert_eq!(
        active["components"]["container_registry"]["configuration"]["uri"],
        "localhost:5000"
    );

    let stacks = json_output(temp.path(), &["stack", "list"]);
    assert_eq!(stacks["total"], 2);
}

#[test]
fn default_stack_cannot_be_deleted() {
    let temp = tempdir().unwrap();
    zenml(temp.path())
        .args(["stack", "delete", "default"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn unknown_flavor_fails_with_available_list() {
    let temp = tempdir().unwrap();
    let output = zenml(temp.path())
        .args([
            "component",
            "register",
            "--type",
            "orchestrator",
            "airflow",
            "--flavor",
            "airflow",
        ])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("kubeflow"), "{stderr}");
}

#[test]
fn component_attributes_can_be_updated_and_removed() {
    let temp = tempdir().unwrap();
    zenml(temp.path())
        .args([
            "component",
            "register",
            "--type",
            "orchestrator",
            "docker",
            "--flavor",
            "local_docker",
            "run_args=--rm,--network=host",
        ])
        .assert()
        .success();

    let component = json_output(
        temp.path(),
        &["component", "describe", "--type", "orchestrator", "docker"],
    );
    assert_eq!(
        component["configuration"]["run_args"],
        serde_json::json!(["--rm", "--network=host"])
    );

    let component = json_output(
        temp.path(),
        &[
            "component",
            "remove-attribute",
            "--type",
            "orchestrator",
            "docker",
            "run_args",
        ],
    );
    assert!(component["configuration"].get("run_args").is_none());

    zenml(temp.path())
        .args([
            "component",
            "update",
            "--type",
            "orchestrator",
            "docker",
            "unknown=1",
        ])
        .assert()
        .failure();
}

#[test]
fn export_then_import_into_another_config() {
    let temp = tempdir().unwrap();
    let source = temp.path().join("source");
    let target = temp.path().join("target");
    let file = temp.path().join("stack.yaml");

    zenml(&source)
        .args([
            "component",
            "register",
            "--type",
            "artifact_store",
            "bucket",
            "--flavor",
            "gcp",
            "path=gs://team-bucket",
        ])
        .assert()
        .success();
    zenml(&source)
        .args(["stack", "register", "cloud", "-o", "default", "-a", "bucket"])
        .assert()
        .success();
    zenml(&source)
        .args(["stack", "export", "--stack", "cloud"])
        .arg(&file)
        .assert()
        .success();

    zenml(&target)
        .args(["stack", "import", "--set"])
        .arg(&file)
        .assert()
        .success();
    let active = json_output(&target, &["stack", "get"]);
    assert_eq!(active["name"], "cloud");
    assert_eq!(
        active["components"]["artifact_store"]["configuration"]["path"],
        "gs://team-bucket"
    );
}

#[test]
fn clean_requires_confirmation_and_resets() {
    let temp = tempdir().unwrap();
    zenml(temp.path())
        .args(["workspace", "create", "research"])
        .assert()
        .success();

    zenml(temp.path()).arg("clean").assert().failure();
    zenml(temp.path())
        .args(["clean", "--yes"])
        .assert()
        .success();

    let workspaces = json_output(temp.path(), &["workspace", "list"]);
    assert_eq!(workspaces["total"], 1);
    assert_eq!(workspaces["items"][0]["name"], "default");
}

#[test]
fn completions_are_generated() {
    let temp = tempdir().unwrap();
    let script = text_output(temp.path(), &["completions", "bash"]);
    assert!(script.contains("zenml"));
}

#[test]
fn clean_recovers_from_a_corrupt_config_and_honours_json() {
    let temp = tempdir().unwrap();
    text_output(temp.path(), &["stack", "get"]);
    std::fs::write(temp.path().join("config.yaml"), "store: [not: valid").unwrap();
    zenml(temp.path()).args(["stack", "get"]).assert().failure();

    let output = json_output(temp.path(), &["clean", "--yes"]);
    assert!(
        output["message"]
            .as_str()
            .is_some_and(|message| message.starts_with("Reset global configuration")),
        "{output}"
    );
    let config = std::fs::read_to_string(temp.path().join("config.yaml")).unwrap();
    assert!(config.contains("active_stack_name: default"), "{config}");
}

#[test]
fn attribute_values_may_start_with_dashes() {
    let temp = tempdir().unwrap();
    zenml(temp.path())
        .args([
            "component",
            "register",
            "--type",
            "orchestrator",
            "docker",
            "--flavor",
            "local_docker",
        ])
        .assert()
        .success();
    zenml(temp.path())
        .args(["component", "update", "--type", "orchestrator", "docker", "--", "--run_args=--rm"])
        .assert()
        .failure();

    let component = json_output(
        temp.path(),
        &["component", "update", "--type", "orchestrator", "docker", "run_args=--rm"],
    );
    assert_eq!(component["configuration"]["run_args"], serde_json::json!(["--rm"]));
}

#[test]
fn roles_are_managed_from_the_command_line() {
    let temp = tempdir().unwrap();
    let role = json_output(
        temp.path(),
        &["role", "create", "cat_feeder", "--permissions", "read,me"],
    );
    assert_eq!(role["permissions"], serde_json::json!(["read", "me"]));
    zenml(temp.path())
        .args(["role", "create", "cat_feeder", "--permissions", "read"])
        .assert()
        .failure()
        .code(1);

    zenml(temp.path())
        .args([
            "role",
            "update",
            "cat_feeder",
            "--add-permission",
            "write",
            "--remove-permission",
            "write",
        ])
        .assert()
        .failure();
    zenml(temp.path())
        .args(["role", "update", "admin", "--remove-permission", "write"])
        .assert()
        .failure();
    zenml(temp.path())
        .args(["role", "delete", "admin"])
        .assert()
        .failure();

    zenml(temp.path())
        .args(["user", "create", "aria", "--password", "catnip", "--role", "cat_feeder"])
        .assert()
        .success();
    let described = json_output(temp.path(), &["role", "describe", "cat_feeder"]);
    assert_eq!(described["name"], "cat_feeder");
    assert_eq!(described["assignments"].as_array().map(Vec::len), Some(1));
    assert_eq!(described["assignments"][0]["assignee"]["kind"], "user");

    zenml(temp.path())
        .args(["role", "revoke", "cat_feeder", "--user", "aria"])
        .assert()
        .success();
    zenml(temp.path())
        .args(["role", "delete", "cat_feeder"])
        .assert()
        .success();
}

#[test]
fn teams_are_managed_from_the_command_line() {
    let temp = tempdir().unwrap();
    for user in ["aria", "blupus"] {
        zenml(temp.path())
            .args(["user", "create", user])
            .assert()
            .success();
    }
    zenml(temp.path())
        .args(["team", "create", "cats", "--user", "aria"])
        .assert()
        .success();
    zenml(temp.path())
        .args(["team", "add", "cats", "--user", "blupus"])
        .assert()
        .success();

    let described = text_output(temp.path(), &["team", "describe", "cats"]);
    assert!(described.contains("aria, blupus"), "{described}");

    zenml(temp.path())
        .args(["team", "remove", "cats", "--user", "aria"])
        .assert()
        .success();
    zenml(temp.path())
        .args(["team", "update", "cats", "--name", "felines"])
        .assert()
        .success();
    let teams = json_output(temp.path(), &["team", "list"]);
    assert_eq!(teams["total"], 1);
    assert_eq!(teams["items"][0]["name"], "felines");
    assert_eq!(teams["items"][0]["users"][0]["name"], "blupus");

    zenml(temp.path())
        .args(["team", "delete", "felines"])
        .assert()
        .success();
    zenml(temp.path())
        .args(["team", "describe", "felines"])
        .assert()
        .failure();
}
