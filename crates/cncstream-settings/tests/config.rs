//! Tests for config::Config

use cncstream_settings::{Config, ConfigError, SettingsError, DEFAULT_REPORT_PERIOD_MS};
use std::path::PathBuf;
use tempfile::TempDir;

const SAMPLE_TOML: &str = r#"
[network.http_batch_server]
port = 8081

[network.http_status_server]
port = 8084

[network.http_sd_upload_server]
port = 8085
root = "/sd"
quota_bytes = 1048576

[runtime]
tick_interval_ms = 2
"#;

#[test]
fn test_load_toml_sections() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, SAMPLE_TOML).unwrap();

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(config.network.http_batch_server.as_ref().unwrap().port, 8081);
    assert!(config.network.http_log_server.is_none());

    let status = config.network.http_status_server.as_ref().unwrap();
    assert_eq!(status.report_period_ms, DEFAULT_REPORT_PERIOD_MS);

    let upload = config.network.http_sd_upload_server.as_ref().unwrap();
    assert_eq!(upload.root, PathBuf::from("/sd"));
    assert_eq!(upload.quota_bytes, Some(1048576));

    assert_eq!(config.runtime.tick_interval_ms, 2);
    assert_eq!(config.runtime.log_level, "info");
    assert_eq!(
        config.network.enabled_ports(),
        vec![
            ("http_batch_server", 8081),
            ("http_status_server", 8084),
            ("http_sd_upload_server", 8085)
        ]
    );
}

#[test]
fn test_zero_port_is_disabled() {
    let config: Config = toml::from_str(
        r#"
[network.http_log_server]
port = 0
"#,
    )
    .unwrap();
    assert!(config.network.enabled_ports().is_empty());
    assert!(config.validate().is_ok());
}

#[test]
fn test_port_conflict_rejected() {
    let config: Config = toml::from_str(
        r#"
[network.http_batch_server]
port = 9000

[network.http_realtime_server]
port = 9000
"#,
    )
    .unwrap();

    assert_eq!(
        config.validate(),
        Err(ConfigError::PortConflict {
            port: 9000,
            first: "http_batch_server".to_string(),
            second: "http_realtime_server".to_string(),
        })
    );
}

#[test]
fn test_upload_requires_root() {
    let config: Config = toml::from_str(
        r#"
[network.http_localfs_upload_server]
port = 8086
"#,
    )
    .unwrap();

    assert_eq!(
        config.validate(),
        Err(ConfigError::MissingKey(
            "network.http_localfs_upload_server.root".to_string()
        ))
    );
}

#[test]
fn test_save_and_reload_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::new();
    config.network.http_batch_server = Some(Default::default());
    config.network.http_batch_server.as_mut().unwrap().port = 8081;
    config.save_to_file(&path).unwrap();

    let reloaded = Config::load_from_file(&path).unwrap();
    assert_eq!(reloaded, config);
}

#[test]
fn test_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "network: {}").unwrap();

    let err = Config::load_from_file(&path).unwrap_err();
    assert!(matches!(
        err,
        SettingsError::Config(ConfigError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_load_or_default_missing_file() {
    let dir = TempDir::new().unwrap();
    let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
}
