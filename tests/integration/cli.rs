use predicates::prelude::*;
use serde_json::Value;

use crate::common::TestProject;

#[test]
fn test_list_templates() {
    let project = TestProject::new().unwrap();
    project
        .declkit()
        .args(["list", "--detailed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("examples/simple_http"))
        .stdout(predicate::str::contains("examples/with_pool"))
        .stdout(predicate::str::contains("lb_method"));
}

#[test]
fn test_schema_command() {
    let project = TestProject::new().unwrap();
    let output = project.declkit().args(["schema", "examples/with_pool"]).output().unwrap();
    assert!(output.status.success());

    let schema: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(schema["properties"]["lb_method"]["default"], "round-robin");
}

#[test]
fn test_render_from_stdin() {
    let project = TestProject::new().unwrap();
    let output = project
        .declkit()
        .args(["render", "examples/simple_http", "--params", "-"])
        .write_stdin(r#"{"tenant_name": "prod", "pool_members": "10.0.0.5"}"#)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let declaration: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        declaration["prod"]["app1"]["web_pool"]["members"][0]["serverAddresses"],
        serde_json::json!(["10.0.0.5"])
    );
}

#[test]
fn test_validate_failure_exits_nonzero() {
    let project = TestProject::new().unwrap();
    let params = project.write_file("params.json", r#"{"virtual_port": "eighty"}"#).unwrap();
    project
        .declkit()
        .args(["validate", "examples/simple_http", "--params"])
        .arg(&params)
        .assert()
        .failure()
        .stdout(predicate::str::contains("/virtual_port"))
        .stderr(predicate::str::contains("validation issue"));
}

#[test]
fn test_unknown_template_suggests_name() {
    let project = TestProject::new().unwrap();
    project
        .declkit()
        .args(["render", "examples/simple_htp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("examples/simple_http"));
}

#[test]
fn test_upload_sets_and_remove() {
    let project = TestProject::new().unwrap();

    project.declkit().args(["upload", "examples", "extra"]).assert().success();
    assert!(project.store_path().is_file());

    project
        .declkit()
        .arg("sets")
        .assert()
        .success()
        .stdout(predicate::str::contains("supported"))
        .stdout(predicate::str::contains("custom"));

    // Rendering from the store works after a restart of the binary.
    project
        .declkit()
        .args(["render", "extra/plain", "--store"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"remark\":\"\""));

    project.declkit().args(["remove", "extra"]).assert().success();
    let output = project.declkit().args(["sets", "--format", "json"]).output().unwrap();
    let reports: Value = serde_json::from_slice(&output.stdout).unwrap();
    let extra = reports.as_array().unwrap().iter().find(|r| r["name"] == "extra").unwrap();
    assert!(extra["stored"].is_null());

    project.declkit().args(["remove", "extra"]).assert().failure();
}

#[test]
fn test_invalid_settings_file() {
    let project = TestProject::new().unwrap();
    project.write_config("cache_limit = 0\n").unwrap();
    project
        .declkit()
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cache_limit"));
}

#[test]
fn test_templates_dir_override() {
    let project = TestProject::new().unwrap();
    let empty = tempfile::TempDir::new().unwrap();
    project
        .declkit()
        .arg("list")
        .arg("--templates-dir")
        .arg(empty.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No templates found."));
}
