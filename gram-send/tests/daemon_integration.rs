//! Integration tests for the gram-send daemon

use assert_cmd::Command;
use chrono::{Duration, Utc};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn unix(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

/// Write a complete config into a temp dir; returns (dir, config path)
fn setup_test_env(graph_url: &str, app_id: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let media_dir = temp_dir.path().join("media");
    fs::create_dir_all(&media_dir).unwrap();

    let config_content = format!(
        r#"
[media]
directory = "{media}"

[hashtags]
file = "{hashtags}"

[staging]
host = "127.0.0.1"
port = 1
username = "poster"
password = "hunter2"
remote_dir = "/public_html/uploads/"
public_base_url = "http://127.0.0.1:1/uploads/"

[graph]
base_url = "{graph_url}"
account_id = "1784"
app_id = "{app_id}"
app_secret = "app-secret"

[token]
file = "{token}"
"#,
        media = unix(&media_dir),
        hashtags = unix(&temp_dir.path().join("hashtags.txt")),
        token = unix(&temp_dir.path().join("token.json")),
        graph_url = graph_url,
        app_id = app_id,
    );

    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, config_content).unwrap();
    (temp_dir, config_path)
}

fn write_token(dir: &TempDir, expires_in_days: i64) {
    let state = serde_json::json!({
        "access_token": "test-token",
        "expires_at": (Utc::now() + Duration::days(expires_in_days)).to_rfc3339(),
        "last_updated": null,
    });
    fs::write(dir.path().join("token.json"), state.to_string()).unwrap();
}

fn gram_send() -> Command {
    let mut cmd = Command::cargo_bin("gram-send").unwrap();
    cmd.env_remove("GRAMCAST_BOOTSTRAP_TOKEN")
        .env_remove("GRAMCAST_CONFIG")
        .env_remove("GRAMCAST_LOG_FORMAT")
        .env_remove("GRAMCAST_LOG_LEVEL")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_describes_daemon() {
    gram_send()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("EXIT CODES"))
        .stdout(predicate::str::contains("--once"));
}

#[test]
fn test_invalid_config_is_configuration_error() {
    let temp_dir = TempDir::new().unwrap();
    let invalid_config = temp_dir.path().join("invalid.toml");
    fs::write(&invalid_config, "this is not valid toml [[[").unwrap();

    gram_send()
        .env("GRAMCAST_CONFIG", &invalid_config)
        .arg("--once")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("parse config"));
}

#[test]
fn test_missing_config_file_is_configuration_error() {
    let temp_dir = TempDir::new().unwrap();

    gram_send()
        .arg("--config")
        .arg(temp_dir.path().join("nope.toml"))
        .arg("--once")
        .assert()
        .code(2);
}

#[test]
fn test_placeholder_credentials_are_rejected() {
    let (_temp_dir, config_path) = setup_test_env("http://127.0.0.1:1", "your-app-id");

    gram_send()
        .arg("--config")
        .arg(&config_path)
        .arg("--once")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("graph.app_id"));
}

#[test]
fn test_missing_token_exits_with_configuration_error() {
    let (_temp_dir, config_path) = setup_test_env("http://127.0.0.1:1", "1234");

    gram_send()
        .arg("--config")
        .arg(&config_path)
        .arg("--once")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("gram-setup"));
}

#[test]
fn test_expiring_token_exits_with_configuration_error() {
    let (temp_dir, config_path) = setup_test_env("http://127.0.0.1:1", "1234");
    write_token(&temp_dir, 2);

    gram_send()
        .arg("--config")
        .arg(&config_path)
        .arg("--once")
        .assert()
        .code(2);
}

#[test]
fn test_once_with_empty_media_directory_succeeds() {
    let (temp_dir, config_path) = setup_test_env("http://127.0.0.1:1", "1234");
    write_token(&temp_dir, 30);

    gram_send()
        .arg("--config")
        .arg(&config_path)
        .arg("--once")
        .arg("--verbose")
        .assert()
        .success()
        .stderr(predicate::str::contains("No file to post"));
}

#[test]
fn test_once_with_json_logs() {
    let (temp_dir, config_path) = setup_test_env("http://127.0.0.1:1", "1234");
    write_token(&temp_dir, 30);

    gram_send()
        .arg("--config")
        .arg(&config_path)
        .args(["--once", "--log-format", "json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("\"level\":\"INFO\""));
}

#[test]
fn test_oversized_file_is_skipped_and_kept() {
    let (temp_dir, config_path) = setup_test_env("http://127.0.0.1:1", "1234");
    write_token(&temp_dir, 30);
    let big = temp_dir.path().join("media").join("huge.png");
    fs::File::create(&big)
        .unwrap()
        .set_len(9 * 1024 * 1024)
        .unwrap();

    gram_send()
        .arg("--config")
        .arg(&config_path)
        .arg("--once")
        .assert()
        .success()
        .stderr(predicate::str::contains("Image too large (max 8MB)"));

    assert!(big.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bootstrap_token_from_environment_is_saved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v18.0/me"))
        .and(query_param("access_token", "boot-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "1"})))
        .expect(1)
        .mount(&server)
        .await;

    let (temp_dir, config_path) = setup_test_env(&server.uri(), "1234");

    gram_send()
        .env("GRAMCAST_BOOTSTRAP_TOKEN", "boot-token")
        .arg("--config")
        .arg(&config_path)
        .arg("--once")
        .assert()
        .success();

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(temp_dir.path().join("token.json")).unwrap())
            .unwrap();
    assert_eq!(saved["access_token"], "boot-token");
}
