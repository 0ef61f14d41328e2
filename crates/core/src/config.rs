//! 설정 관리 -- dockscan.toml 파싱 및 런타임 설정
//!
//! [`DockscanConfig`]는 모든 섹션의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DOCKSCAN_ORCHESTRATOR_MAX_CONCURRENCY=8` 형식)
//! 3. 설정 파일 (`dockscan.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! 스캐닝 에이전트 토큰은 비밀값이므로 이 구조체에 포함하지 않습니다.
//! 토큰은 호출 단위로 전달됩니다.
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), dockscan_core::error::DockscanError> {
//! use dockscan_core::config::DockscanConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = DockscanConfig::load("dockscan.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = DockscanConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DockscanError};

/// 기본 스캐닝 에이전트 이미지
pub const DEFAULT_SCANNER_IMAGE: &str = "ehazlett/microscanner:latest";

/// 설정 상한값 상수
const MAX_ENGINE_TIMEOUT_SECS: u64 = 3600;
const MAX_CONCURRENCY: usize = 1024;
const MAX_TARGET_TIMEOUT_SECS: u64 = 86_400;

/// dockscan 통합 설정
///
/// `dockscan.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockscanConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 컨테이너 엔진 연결 설정
    #[serde(default)]
    pub engine: EngineConfig,
    /// 이미지 스캔 파이프라인 설정
    #[serde(default)]
    pub image_scan: ImageScanConfig,
    /// 오케스트레이터 설정
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl DockscanConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DockscanError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없으면 기본값에서 시작하는 [`load`](Self::load) 변형입니다.
    ///
    /// CLI가 기본 경로를 사용할 때 쓰입니다. 명시적으로 지정한 경로는
    /// [`load`](Self::load)로 읽어 파일 부재를 에러로 보고해야 합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, DockscanError> {
        let mut config = match Self::from_file(path).await {
            Ok(config) => config,
            Err(DockscanError::Config(ConfigError::FileNotFound { .. })) => Self::default(),
            Err(e) => return Err(e),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DockscanError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DockscanError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DockscanError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DockscanError> {
        toml::from_str(toml_str).map_err(|e| {
            DockscanError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DOCKSCAN_{SECTION}_{FIELD}`
    /// 예: `DOCKSCAN_IMAGE_SCAN_PULL=false`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DOCKSCAN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DOCKSCAN_GENERAL_LOG_FORMAT");

        // Engine
        override_string(
            &mut self.engine.docker_socket,
            "DOCKSCAN_ENGINE_DOCKER_SOCKET",
        );
        override_u64(&mut self.engine.timeout_secs, "DOCKSCAN_ENGINE_TIMEOUT_SECS");

        // Image scan
        override_string(
            &mut self.image_scan.scanner_image,
            "DOCKSCAN_IMAGE_SCAN_SCANNER_IMAGE",
        );
        override_string(
            &mut self.image_scan.tag_prefix,
            "DOCKSCAN_IMAGE_SCAN_TAG_PREFIX",
        );
        override_bool(&mut self.image_scan.pull, "DOCKSCAN_IMAGE_SCAN_PULL");
        override_bool(
            &mut self.image_scan.pull_parent,
            "DOCKSCAN_IMAGE_SCAN_PULL_PARENT",
        );

        // Orchestrator
        override_usize(
            &mut self.orchestrator.max_concurrency,
            "DOCKSCAN_ORCHESTRATOR_MAX_CONCURRENCY",
        );
        override_u64(
            &mut self.orchestrator.target_timeout_secs,
            "DOCKSCAN_ORCHESTRATOR_TARGET_TIMEOUT_SECS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DockscanError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.engine.timeout_secs == 0 || self.engine.timeout_secs > MAX_ENGINE_TIMEOUT_SECS {
            return Err(invalid(
                "engine.timeout_secs",
                format!("must be 1-{MAX_ENGINE_TIMEOUT_SECS}"),
            ));
        }

        if self.image_scan.scanner_image.trim().is_empty() {
            return Err(invalid(
                "image_scan.scanner_image",
                "scanner image must not be empty".to_owned(),
            ));
        }

        if !is_valid_tag_prefix(&self.image_scan.tag_prefix) {
            return Err(invalid(
                "image_scan.tag_prefix",
                "must be 1-64 chars of [a-z0-9_.-], starting with [a-z0-9]".to_owned(),
            ));
        }

        if self.orchestrator.max_concurrency > MAX_CONCURRENCY {
            return Err(invalid(
                "orchestrator.max_concurrency",
                format!("must be 0-{MAX_CONCURRENCY} (0 = unbounded)"),
            ));
        }

        if self.orchestrator.target_timeout_secs > MAX_TARGET_TIMEOUT_SECS {
            return Err(invalid(
                "orchestrator.target_timeout_secs",
                format!("must be 0-{MAX_TARGET_TIMEOUT_SECS} (0 = no deadline)"),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> DockscanError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 빌드 태그 접두어는 이미지 이름 컴포넌트 규칙을 따라야 합니다.
fn is_valid_tag_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
        _ => return false,
    }
    prefix.len() <= 64
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "_.-".contains(c))
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 컨테이너 엔진 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Docker 소켓 경로 (비어 있으면 플랫폼 기본값)
    pub docker_socket: String,
    /// 엔진 API 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            docker_socket: String::new(),
            timeout_secs: 120,
        }
    }
}

/// 이미지 스캔 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageScanConfig {
    /// 스캐닝 에이전트 바이너리를 제공하는 이미지
    pub scanner_image: String,
    /// 임시 스캔 이미지 태그 접두어
    pub tag_prefix: String,
    /// 스캔 전 대상 이미지 pull 여부
    pub pull: bool,
    /// 빌드 시 베이스 이미지 pull 여부
    pub pull_parent: bool,
}

impl Default for ImageScanConfig {
    fn default() -> Self {
        Self {
            scanner_image: DEFAULT_SCANNER_IMAGE.to_owned(),
            tag_prefix: "scan".to_owned(),
            pull: true,
            pull_parent: true,
        }
    }
}

/// 오케스트레이터 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// 동시에 엔진을 사용하는 스캔 태스크 최대 수 (0 = 제한 없음)
    pub max_concurrency: usize,
    /// 대상별 마감 시간 (초, 0 = 없음)
    pub target_timeout_secs: u64,
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
