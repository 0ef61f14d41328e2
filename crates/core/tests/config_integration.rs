//! dockscan.toml 통합 설정 테스트
//!
//! - dockscan.toml.example 파싱 테스트
//! - 파일 로딩 + 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use std::fs;

use dockscan_core::config::DockscanConfig;
use dockscan_core::error::{ConfigError, DockscanError};
use serial_test::serial;
use tempfile::TempDir;

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../dockscan.toml.example");
    let config = DockscanConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.engine.docker_socket, "");
    assert_eq!(config.engine.timeout_secs, 120);
}

#[test]
fn example_config_matches_defaults() {
    let content = include_str!("../../../dockscan.toml.example");
    let config = DockscanConfig::parse(content).expect("should parse");
    let defaults = DockscanConfig::default();

    assert_eq!(config.image_scan.scanner_image, defaults.image_scan.scanner_image);
    assert_eq!(config.image_scan.tag_prefix, defaults.image_scan.tag_prefix);
    assert_eq!(config.image_scan.pull, defaults.image_scan.pull);
    assert_eq!(
        config.orchestrator.max_concurrency,
        defaults.orchestrator.max_concurrency
    );
    config
        .validate()
        .expect("example config should pass validation");
}

#[tokio::test]
#[serial]
async fn load_reads_file_and_validates() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("dockscan.toml");
    fs::write(
        &path,
        r#"
[image_scan]
pull = false

[orchestrator]
max_concurrency = 3
target_timeout_secs = 600
"#,
    )
    .expect("should write config");

    let config = DockscanConfig::load(&path).await.expect("should load");
    assert!(!config.image_scan.pull);
    assert_eq!(config.orchestrator.max_concurrency, 3);
    assert_eq!(config.orchestrator.target_timeout_secs, 600);
}

#[tokio::test]
#[serial]
async fn env_overrides_take_precedence_over_file() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("dockscan.toml");
    fs::write(&path, "[orchestrator]\nmax_concurrency = 3\n").expect("should write config");

    // SAFETY: serial 테스트로 실행되므로 환경변수 조작이 다른 테스트와 겹치지 않습니다.
    unsafe { std::env::set_var("DOCKSCAN_ORCHESTRATOR_MAX_CONCURRENCY", "16") };
    let result = DockscanConfig::load(&path).await;
    unsafe { std::env::remove_var("DOCKSCAN_ORCHESTRATOR_MAX_CONCURRENCY") };

    let config = result.expect("should load");
    assert_eq!(config.orchestrator.max_concurrency, 16);
}

#[tokio::test]
#[serial]
async fn env_override_can_invalidate_config() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("dockscan.toml");
    fs::write(&path, "").expect("should write config");

    // SAFETY: serial 테스트로 실행되므로 환경변수 조작이 다른 테스트와 겹치지 않습니다.
    unsafe { std::env::set_var("DOCKSCAN_GENERAL_LOG_FORMAT", "xml") };
    let result = DockscanConfig::load(&path).await;
    unsafe { std::env::remove_var("DOCKSCAN_GENERAL_LOG_FORMAT") };

    let err = result.expect_err("xml log format should be rejected");
    assert!(err.to_string().contains("log_format"));
}

#[tokio::test]
#[serial]
async fn empty_file_uses_defaults() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("empty.toml");
    fs::write(&path, "").expect("should write empty file");

    let config = DockscanConfig::load(&path).await.expect("empty file is valid");
    assert_eq!(config.image_scan.tag_prefix, "scan");
}

#[tokio::test]
async fn malformed_file_is_parse_error() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[general\nlog_level = \"info\"\n").expect("should write bad config");

    let err = DockscanConfig::from_file(&path).await.unwrap_err();
    assert!(matches!(
        err,
        DockscanError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let err = DockscanConfig::load("/nonexistent/dockscan.toml")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DockscanError::Config(ConfigError::FileNotFound { .. })
    ));
}
