use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

/// The workspace's own plugin directories, which carry real manifests
fn plugins_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../plugins")
}

/// A `capstan` command with isolated state, run from an empty directory
fn capstan(state: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("capstan").expect("capstan binary");
    cmd.current_dir(state.path())
        .env_remove("CAPSTAN_LOG")
        .arg("--plugins-dir")
        .arg(plugins_dir())
        .arg("--state-dir")
        .arg(state.path().join("state"));
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn test_plugin_list_shows_bundled_plugins() -> Result<(), Box<dyn std::error::Error>> {
    let state = tempfile::tempdir()?;

    capstan(&state)
        .args(["plugin", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("core-docs"))
        .stdout(predicate::str::contains("analytics"))
        .stdout(predicate::str::contains("discovered"));

    Ok(())
}

#[test]
fn test_enable_persists_across_invocations() -> Result<(), Box<dyn std::error::Error>> {
    let state = tempfile::tempdir()?;

    capstan(&state)
        .args(["tools"])
        .assert()
        .success()
        .stdout(predicate::str::contains("doc_get").not());

    capstan(&state)
        .args(["plugin", "enable", "core-docs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("doc_get, doc_list"));
    assert!(state.path().join("state").join("state.json").is_file());

    capstan(&state)
        .args(["tools"])
        .assert()
        .success()
        .stdout(predicate::str::contains("doc_get"))
        .stdout(predicate::str::contains("doc_list"));

    capstan(&state).args(["plugin", "disable", "core-docs"]).assert().success();

    capstan(&state)
        .args(["tools"])
        .assert()
        .success()
        .stdout(predicate::str::contains("doc_get").not());

    Ok(())
}

#[test]
fn test_enable_unknown_plugin_fails() -> Result<(), Box<dyn std::error::Error>> {
    let state = tempfile::tempdir()?;

    capstan(&state)
        .args(["plugin", "enable", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Plugin not found: 'ghost'"));

    Ok(())
}

#[test]
fn test_call_success_prints_payload() -> Result<(), Box<dyn std::error::Error>> {
    let state = tempfile::tempdir()?;
    capstan(&state).args(["plugin", "enable", "core-docs"]).assert().success();

    let output = capstan(&state)
        .args(["call", "doc_get", "--args", r#"{"id": "plugins/enable"}"#])
        .output()?;

    assert!(output.status.success());
    let result = stdout_json(&output);
    assert_eq!(result["outcome"], "success");
    assert_eq!(result["payload"]["id"], "plugins/enable");
    Ok(())
}

#[test]
fn test_call_outcomes_and_exit_codes() -> Result<(), Box<dyn std::error::Error>> {
    let state = tempfile::tempdir()?;
    capstan(&state).args(["plugin", "enable", "analytics"]).assert().success();

    let missing = capstan(&state).args(["call", "nope"]).output()?;
    assert!(!missing.status.success());
    assert_eq!(stdout_json(&missing)["outcome"], "not_found");

    let args = r#"{"op": "sum", "values": [1, 2, 3]}"#;
    let denied = capstan(&state).args(["call", "run_query", "--args", args]).output()?;
    assert!(!denied.status.success());
    assert_eq!(stdout_json(&denied)["outcome"], "permission_denied");

    let invalid = capstan(&state)
        .args(["call", "run_query", "--args", r#"{"op": "sum"}"#, "--subject", "carol", "--role", "analyst"])
        .output()?;
    assert_eq!(stdout_json(&invalid)["outcome"], "validation_error");

    let allowed = capstan(&state)
        .args(["call", "run_query", "--args", args, "--subject", "carol", "--role", "analyst"])
        .output()?;
    assert!(allowed.status.success());
    assert_eq!(stdout_json(&allowed)["payload"]["result"], 6.0);
    Ok(())
}

#[test]
fn test_tools_filters_by_role() -> Result<(), Box<dyn std::error::Error>> {
    let state = tempfile::tempdir()?;
    capstan(&state).args(["plugin", "enable", "analytics"]).assert().success();

    capstan(&state)
        .args(["tools"])
        .assert()
        .success()
        .stdout(predicate::str::contains("run_query").not());

    capstan(&state)
        .args(["tools", "--role", "analyst", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"run_query\""));

    Ok(())
}

#[test]
fn test_call_rejects_malformed_args() -> Result<(), Box<dyn std::error::Error>> {
    let state = tempfile::tempdir()?;

    capstan(&state)
        .args(["call", "doc_get", "--args", "{not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--args is not valid JSON"));

    Ok(())
}

#[test]
fn test_refresh_reports_json() -> Result<(), Box<dyn std::error::Error>> {
    let state = tempfile::tempdir()?;
    capstan(&state).args(["plugin", "enable", "core-docs"]).assert().success();

    let output = capstan(&state).args(["plugin", "refresh"]).output()?;
    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["enabled"], serde_json::json!(["core-docs"]));
    assert_eq!(report["discovered"], 2);
    Ok(())
}

#[test]
fn test_missing_config_file_fails() -> Result<(), Box<dyn std::error::Error>> {
    let state = tempfile::tempdir()?;

    capstan(&state)
        .args(["--config", "does-not-exist.toml", "plugin", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load settings"));

    Ok(())
}

#[test]
fn test_settings_file_in_working_directory() -> Result<(), Box<dyn std::error::Error>> {
    let state = tempfile::tempdir()?;
    let empty_plugins = state.path().join("empty");
    std::fs::create_dir_all(&empty_plugins)?;
    std::fs::write(
        state.path().join("capstan.toml"),
        format!("plugins_dir = {:?}\n", empty_plugins.display().to_string()),
    )?;

    let mut cmd = Command::cargo_bin("capstan")?;
    cmd.current_dir(state.path())
        .args(["plugin", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No plugins found"));

    Ok(())
}
