//! CLI integration tests
//!
//! End-to-end tests for CLI commands using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Get the policyset binary for testing
fn policyset_cmd() -> Command {
    let mut cmd = Command::cargo_bin("policyset").unwrap();
    cmd.env_remove("POLICYSET_LOG_LEVEL")
        .env_remove("POLICYSET_ENDPOINT")
        .env_remove("POLICYSET_FILTER_STRATEGY");
    cmd
}

fn write_config(dir: &Path, endpoint: &str) -> PathBuf {
    let path = dir.join("policyset.toml");
    std::fs::write(
        &path,
        format!(
            r#"
[connection]
endpoint = "{}"

[logging]
level = "warn"

[policy_set]
name = "Standard"

[[policy_set.policies]]
name = "Base"

[[policy_set.policies.settings]]
name = "IcaRtt"
use_default = true
"#,
            endpoint
        ),
    )
    .unwrap();
    path
}

#[test]
fn test_version_output() {
    policyset_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("policyset"));
}

#[test]
fn test_help_shows_all_commands() {
    policyset_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_plan_help() {
    policyset_cmd()
        .args(["plan", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--json"))
        .stdout(predicate::str::contains("--filter-strategy"));
}

#[test]
fn test_config_init_creates_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("policyset.toml");

    policyset_cmd()
        .args(["config", "init", "-o", config_path.to_str().unwrap()])
        .assert()
        .success();

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[policy_set]"));
}

#[test]
fn test_config_init_no_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("policyset.toml");
    std::fs::write(&config_path, "existing content").unwrap();

    policyset_cmd()
        .args(["config", "init", "-o", config_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert_eq!(content, "existing content");
}

#[test]
fn test_config_init_force_overwrites() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("policyset.toml");
    std::fs::write(&config_path, "existing content").unwrap();

    policyset_cmd()
        .args([
            "config",
            "init",
            "-o",
            config_path.to_str().unwrap(),
            "--force",
        ])
        .assert()
        .success();

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[connection]"));
}

#[test]
fn test_plan_missing_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("absent.toml");

    policyset_cmd()
        .args(["plan", "-c", config_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn test_plan_without_token() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), "https://api.example.com");

    policyset_cmd()
        .env_remove("POLICYSET_API_TOKEN")
        .args(["plan", "-c", config_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("POLICYSET_API_TOKEN"));
}

#[test]
fn test_invalid_filter_strategy() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), "https://api.example.com");

    policyset_cmd()
        .args([
            "plan",
            "-c",
            config_path.to_str().unwrap(),
            "--filter-strategy",
            "sometimes",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reconcile.filter_strategy"));
}

#[test]
fn test_destroy_requires_yes() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), "https://api.example.com");

    policyset_cmd()
        .args(["destroy", "-c", config_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));
}

#[test]
fn test_invalid_command() {
    policyset_cmd()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_completions_bash() {
    policyset_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("complete"));
}

#[test]
fn test_completions_zsh() {
    policyset_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("compdef"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_plan_json_against_service() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cvad/manage/policy-sets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cvad/manage/setting-definitions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"settingName": "IcaRtt", "isUserSetting": false}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cvad/manage/delivery-groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), &server.uri());

    let output = policyset_cmd()
        .env("POLICYSET_API_TOKEN", "test-token")
        .args(["plan", "--json", "-c", config_path.to_str().unwrap()])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["policy_set"], "Standard");
    assert_eq!(plan["up_to_date"], false);
    assert_eq!(plan["changes"][0]["kind"], "create");
    assert_eq!(plan["changes"][1]["target"], "Base");

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.method.as_str() == "GET"));
}
