//! Integration tests for the configuration consumed by `dockscan config`.
//!
//! Tests config validation and display functionality with real TOML files.

use std::fs;

use dockscan_core::config::DockscanConfig;
use dockscan_core::error::{ConfigError, DockscanError};
use tempfile::TempDir;

#[tokio::test]
async fn test_config_validate_valid_toml() {
    // Given: A valid config file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("dockscan.toml");

    let valid_config = r#"
[general]
log_level = "info"
log_format = "json"

[engine]
timeout_secs = 60

[image_scan]
scanner_image = "registry.example.com/agent:2"
tag_prefix = "scan"
pull = false

[orchestrator]
max_concurrency = 4
target_timeout_secs = 600
"#;

    fs::write(&config_path, valid_config).expect("should write config");

    // When: Loading the config
    let config = DockscanConfig::load(&config_path)
        .await
        .expect("valid config should load successfully");

    // Then: Values come from the file
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.engine.timeout_secs, 60);
    assert!(!config.image_scan.pull);
    assert!(config.image_scan.pull_parent, "unset keys keep defaults");
    assert_eq!(config.orchestrator.max_concurrency, 4);
}

#[tokio::test]
async fn test_config_validate_invalid_toml_syntax() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("invalid.toml");

    fs::write(&config_path, "[general\nlog_level = ").expect("should write config");

    let result = DockscanConfig::load(&config_path).await;

    assert!(
        matches!(result, Err(DockscanError::Config(ConfigError::ParseFailed { .. }))),
        "invalid TOML syntax should fail with a parse error"
    );
}

#[tokio::test]
async fn test_config_validate_invalid_log_level() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("dockscan.toml");

    fs::write(&config_path, "[general]\nlog_level = \"loud\"\n").expect("should write config");

    let err = DockscanConfig::load(&config_path)
        .await
        .err()
        .expect("invalid log level should fail validation");

    assert!(err.to_string().contains("general.log_level"));
}

#[tokio::test]
async fn test_config_validate_rejects_zero_engine_timeout() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("dockscan.toml");

    fs::write(&config_path, "[engine]\ntimeout_secs = 0\n").expect("should write config");

    let err = DockscanConfig::load(&config_path)
        .await
        .err()
        .expect("zero engine timeout should fail validation");

    assert!(err.to_string().contains("engine.timeout_secs"));
}

#[tokio::test]
async fn test_config_missing_explicit_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("nonexistent.toml");

    let result = DockscanConfig::load(&config_path).await;

    assert!(
        matches!(
            result,
            Err(DockscanError::Config(ConfigError::FileNotFound { .. }))
        ),
        "missing file should be reported as not found"
    );
}

#[tokio::test]
async fn test_config_missing_default_file_falls_back() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("dockscan.toml");

    let config = DockscanConfig::load_or_default(&config_path)
        .await
        .expect("missing default file should yield defaults");

    assert_eq!(config.orchestrator.max_concurrency, 0);
    assert_eq!(config.orchestrator.target_timeout_secs, 0);
}

#[test]
fn test_config_show_serializes_all_sections() {
    let config = DockscanConfig::default();

    let rendered = toml::to_string_pretty(&config).expect("config should serialize");

    for section in ["[general]", "[engine]", "[image_scan]", "[orchestrator]"] {
        assert!(rendered.contains(section), "missing {section}");
    }

    // Round-trips through the parser with validation intact
    let reparsed = DockscanConfig::parse(&rendered).expect("rendered config should parse");
    assert_eq!(
        reparsed.image_scan.scanner_image,
        config.image_scan.scanner_image
    );
}

#[test]
fn test_config_empty_file_is_defaults() {
    let config = DockscanConfig::parse("").expect("empty config should parse");
    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.image_scan.tag_prefix, "scan");
}
