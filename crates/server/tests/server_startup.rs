use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

use reqwest::Client;
use tempfile::{NamedTempFile, TempDir};
use tokio::time::{sleep, timeout};

fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// No managed instances; only the special-category loop and the status server run.
fn minimal_config(port: u16, dir: &TempDir) -> String {
    format!(
        r#"
[settings]
appdata_folder = "{appdata}"
completed_download_folder = "{completed}"
internet_check_urls = []

[qbittorrent]
url = "http://127.0.0.1:1"

[status]
enabled = true
host = "127.0.0.1"
port = {port}
"#,
        appdata = dir.path().join("appdata").display(),
        completed = dir.path().join("completed").display(),
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

async fn spawn_server(config_path: &std::path::Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_reconcilarr"))
        .arg("--config")
        .arg(config_path)
        .env("RUST_LOG", "error")
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_status_server_starts_and_creates_folders() {
    let dir = TempDir::new().unwrap();
    let port = get_available_port();
    let config = write_config(&minimal_config(port, &dir));

    let mut server = spawn_server(config.path()).await;
    assert!(wait_for_server(port, 60).await, "Server did not start in time");

    let client = Client::new();
    let json: serde_json::Value = client
        .get(format!("http://127.0.0.1:{}/api/health", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["status"], "ok");

    let status: serde_json::Value = client
        .get(format!("http://127.0.0.1:{}/api/status", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(status.as_object().unwrap().is_empty());

    assert!(dir.path().join("appdata").is_dir());
    assert!(dir.path().join("completed").is_dir());

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_reconcilarr"))
            .env("RECONCILARR_CONFIG", "/nonexistent/config.toml")
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_reserved_category_exits_with_error() {
    let config = write_config(
        r#"
[qbittorrent]
url = "http://127.0.0.1:1"

[[instances]]
name = "failed"
kind = "sonarr"
managed = true
uri = "http://127.0.0.1:2"
api_key = "key"
"#,
    );

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_reconcilarr"))
            .arg("--config")
            .arg(config.path())
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}
