// ABOUTME: Tests for configuration loading from file, environment, and CLI overrides
// ABOUTME: Env-mutating tests run serially to avoid contaminating each other

use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;
use wa_bridge::config::{Config, Overrides};

/// Helper to clear all config-related env vars
fn clear_config_env_vars() {
    std::env::remove_var("WA_BRIDGE_CONFIG");
    std::env::remove_var("WA_BRIDGE_HOST");
    std::env::remove_var("WA_BRIDGE_PORT");
    std::env::remove_var("WA_BRIDGE_SESSION_DIR");
    std::env::remove_var("WA_BRIDGE_MEDIA_DIR");
    std::env::remove_var("WA_BRIDGE_DRIVER");
}

fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("wa-bridge.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
#[serial]
fn test_config_loads_from_explicit_file() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[server]
port = 9100
heartbeat_secs = 10

[session]
session_dir = "/var/lib/wa/sessions"
reconnect_delay_secs = 0

[driver]
command = "bun"
args = ["driver.ts"]
"#,
    );

    let config = Config::load(Some(&path), Overrides::default()).unwrap();
    assert_eq!(config.server.port, 9100);
    assert_eq!(config.server.heartbeat_secs, 10);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(
        config.session.session_dir,
        PathBuf::from("/var/lib/wa/sessions")
    );
    assert_eq!(config.session.reconnect_delay_secs, 0);
    assert_eq!(config.driver.command, "bun");
    assert_eq!(config.driver.args, vec!["driver.ts".to_string()]);
}

#[test]
#[serial]
fn test_config_file_from_env_var() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[server]\nport = 9200\n");
    std::env::set_var("WA_BRIDGE_CONFIG", &path);

    let config = Config::load(None, Overrides::default()).unwrap();
    assert_eq!(config.server.port, 9200);

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_env_overrides_file_and_cli_overrides_env() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[server]\nport = 9300\nhost = \"127.0.0.1\"\n");
    std::env::set_var("WA_BRIDGE_PORT", "9301");
    std::env::set_var("WA_BRIDGE_MEDIA_DIR", "/tmp/from-env");

    let config = Config::load(
        Some(&path),
        Overrides {
            media_dir: Some(PathBuf::from("/tmp/from-cli")),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(config.server.port, 9301);
    assert_eq!(config.session.media_dir, PathBuf::from("/tmp/from-cli"));

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_invalid_port_env_var_is_an_error() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "");
    std::env::set_var("WA_BRIDGE_PORT", "not-a-port");

    let err = Config::load(Some(&path), Overrides::default()).unwrap_err();
    assert!(err.to_string().contains("WA_BRIDGE_PORT"));

    clear_config_env_vars();
}

#[test]
#[serial]
fn test_malformed_file_is_an_error() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[server\nport = ");

    let err = Config::load(Some(&path), Overrides::default()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse"));
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    clear_config_env_vars();
    let err = Config::load(
        Some(std::path::Path::new("/nonexistent/wa-bridge.toml")),
        Overrides::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("Failed to read"));
}

#[test]
#[serial]
fn test_empty_driver_from_env_fails_validation() {
    clear_config_env_vars();
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "");
    std::env::set_var("WA_BRIDGE_DRIVER", "");

    let err = Config::load(Some(&path), Overrides::default()).unwrap_err();
    assert!(err.to_string().contains("driver.command"));

    clear_config_env_vars();
}
