//! 스캐너 설정
//!
//! [`ScannerConfig`]는 core의 [`DockscanConfig`](dockscan_core::config::DockscanConfig)
//! 섹션들을 스캐너가 사용하는 평탄한 구조로 모읍니다.
//!
//! # 사용 예시
//! ```ignore
//! use dockscan_core::config::DockscanConfig;
//! use dockscan_scanner::config::ScannerConfig;
//!
//! let core_config = DockscanConfig::default();
//! let config = ScannerConfig::from_core(&core_config);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use dockscan_core::config::{DEFAULT_SCANNER_IMAGE, DockscanConfig};

use crate::error::ScanError;

/// 스캐너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Docker 소켓 경로 (비어 있으면 플랫폼 기본값)
    pub docker_socket: String,
    /// 엔진 API 요청 타임아웃 (초)
    pub engine_timeout_secs: u64,
    /// 스캐닝 에이전트 이미지
    pub scanner_image: String,
    /// 임시 스캔 이미지 태그 접두어
    pub tag_prefix: String,
    /// 대상 이미지 pull 여부
    pub pull: bool,
    /// 빌드 시 베이스 이미지 pull 여부
    pub pull_parent: bool,
    /// 동시에 엔진을 사용하는 태스크 최대 수 (0 = 제한 없음)
    pub max_concurrency: usize,
    /// 대상별 마감 시간 (초, 0 = 없음)
    pub target_timeout_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            docker_socket: String::new(),
            engine_timeout_secs: 120,
            scanner_image: DEFAULT_SCANNER_IMAGE.to_owned(),
            tag_prefix: "scan".to_owned(),
            pull: true,
            pull_parent: true,
            max_concurrency: 0,
            target_timeout_secs: 0,
        }
    }
}

const MAX_ENGINE_TIMEOUT_SECS: u64 = 3600;
const MAX_CONCURRENCY: usize = 1024;
const MAX_TARGET_TIMEOUT_SECS: u64 = 86_400;

impl ScannerConfig {
    /// core 설정에서 스캐너 설정을 생성합니다.
    pub fn from_core(core: &DockscanConfig) -> Self {
        Self {
            docker_socket: core.engine.docker_socket.clone(),
            engine_timeout_secs: core.engine.timeout_secs,
            scanner_image: core.image_scan.scanner_image.clone(),
            tag_prefix: core.image_scan.tag_prefix.clone(),
            pull: core.image_scan.pull,
            pull_parent: core.image_scan.pull_parent,
            max_concurrency: core.orchestrator.max_concurrency,
            target_timeout_secs: core.orchestrator.target_timeout_secs,
        }
    }

    /// 대상별 마감 시간을 반환합니다 (설정되지 않았으면 `None`).
    pub fn target_timeout(&self) -> Option<Duration> {
        (self.target_timeout_secs > 0).then(|| Duration::from_secs(self.target_timeout_secs))
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.engine_timeout_secs == 0 || self.engine_timeout_secs > MAX_ENGINE_TIMEOUT_SECS {
            return Err(ScanError::Config {
                field: "engine_timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_ENGINE_TIMEOUT_SECS}"),
            });
        }

        if self.scanner_image.trim().is_empty() {
            return Err(ScanError::Config {
                field: "scanner_image".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.tag_prefix.is_empty()
            || !self
                .tag_prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "_.-".contains(c))
        {
            return Err(ScanError::Config {
                field: "tag_prefix".to_owned(),
                reason: "must be non-empty lowercase [a-z0-9_.-]".to_owned(),
            });
        }

        if self.max_concurrency > MAX_CONCURRENCY {
            return Err(ScanError::Config {
                field: "max_concurrency".to_owned(),
                reason: format!("must be 0-{MAX_CONCURRENCY}"),
            });
        }

        if self.target_timeout_secs > MAX_TARGET_TIMEOUT_SECS {
            return Err(ScanError::Config {
                field: "target_timeout_secs".to_owned(),
                reason: format!("must be 0-{MAX_TARGET_TIMEOUT_SECS}"),
            });
        }

        Ok(())
    }
}

/// 스캐너 설정 빌더
#[derive(Default)]
pub struct ScannerConfigBuilder {
    config: ScannerConfig,
}

impl ScannerConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// Docker 소켓 경로를 설정합니다.
    pub fn docker_socket(mut self, socket: impl Into<String>) -> Self {
        self.config.docker_socket = socket.into();
        self
    }

    /// 엔진 API 타임아웃(초)을 설정합니다.
    pub fn engine_timeout_secs(mut self, secs: u64) -> Self {
        self.config.engine_timeout_secs = secs;
        self
    }

    /// 스캐닝 에이전트 이미지를 설정합니다.
    pub fn scanner_image(mut self, image: impl Into<String>) -> Self {
        self.config.scanner_image = image.into();
        self
    }

    /// 스캔 이미지 태그 접두어를 설정합니다.
    pub fn tag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.tag_prefix = prefix.into();
        self
    }

    /// 대상 이미지 pull 여부를 설정합니다.
    pub fn pull(mut self, pull: bool) -> Self {
        self.config.pull = pull;
        self
    }

    /// 베이스 이미지 pull 여부를 설정합니다.
    pub fn pull_parent(mut self, pull_parent: bool) -> Self {
        self.config.pull_parent = pull_parent;
        self
    }

    /// 동시 실행 상한을 설정합니다 (0 = 제한 없음).
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.config.max_concurrency = max;
        self
    }

    /// 대상별 마감 시간(초)을 설정합니다 (0 = 없음).
    pub fn target_timeout_secs(mut self, secs: u64) -> Self {
        self.config.target_timeout_secs = secs;
        self
    }

    /// 설정을 검증하고 `ScannerConfig`를 생성합니다.
    pub fn build(self) -> Result<ScannerConfig, ScanError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        ScannerConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let mut core = DockscanConfig::default();
        core.engine.docker_socket = "/run/docker.sock".to_owned();
        core.image_scan.pull = false;
        core.orchestrator.max_concurrency = 6;
        core.orchestrator.target_timeout_secs = 900;

        let config = ScannerConfig::from_core(&core);
        assert_eq!(config.docker_socket, "/run/docker.sock");
        assert!(!config.pull);
        assert_eq!(config.max_concurrency, 6);
        assert_eq!(config.target_timeout(), Some(Duration::from_secs(900)));
    }

    #[test]
    fn zero_target_timeout_means_no_deadline() {
        assert!(ScannerConfig::default().target_timeout().is_none());
    }

    #[test]
    fn validate_rejects_zero_engine_timeout() {
        let config = ScannerConfig {
            engine_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_tag_prefix() {
        let config = ScannerConfig {
            tag_prefix: "Scan/Tmp".to_owned(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tag_prefix"));
    }

    #[test]
    fn validate_rejects_excessive_concurrency() {
        let config = ScannerConfig {
            max_concurrency: 2048,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_all_setters() {
        let config = ScannerConfigBuilder::new()
            .docker_socket("/custom/docker.sock")
            .engine_timeout_secs(30)
            .scanner_image("registry.local/microscanner:1")
            .tag_prefix("dockscan")
            .pull(false)
            .pull_parent(false)
            .max_concurrency(4)
            .target_timeout_secs(60)
            .build()
            .unwrap();

        assert_eq!(config.docker_socket, "/custom/docker.sock");
        assert_eq!(config.engine_timeout_secs, 30);
        assert_eq!(config.scanner_image, "registry.local/microscanner:1");
        assert_eq!(config.tag_prefix, "dockscan");
        assert!(!config.pull);
        assert!(!config.pull_parent);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.target_timeout_secs, 60);
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let result = ScannerConfigBuilder::new().scanner_image("").build();
        assert!(result.is_err());
    }
}
