//! 스캐너 에러 타입
//!
//! [`EngineError`]는 컨테이너 엔진 호출 실패를, [`ScanError`]는 어떤 스캔 단계에서
//! 실패했는지를 태그로 붙인 대상 단위 실패를 표현합니다.
//! `From<ScanError> for DockscanError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use std::fmt;

use dockscan_core::error::{ConfigError, DockscanError};

/// 스캔 파이프라인 단계
///
/// 실패 태그와 메트릭 레이블에 사용됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanStage {
    /// 대상 이미지 pull
    Pull,
    /// 빌드 레시피 생성
    Recipe,
    /// 빌드 컨텍스트 아카이브 생성
    Context,
    /// 스캔 이미지 빌드
    Build,
    /// 스캔 컨테이너 생성/시작
    Run,
    /// 출력 수집 및 디코딩
    Collect,
    /// 컨테이너 런타임 설정 조회
    Inspect,
    /// 임시 아티팩트 정리
    Cleanup,
    /// 컨테이너 나열, 연결 확인 등 대상 이전의 엔진 호출
    Engine,
    /// 스캔 태스크 스케줄링
    Schedule,
    /// 설정 검증
    Config,
}

impl ScanStage {
    /// 메트릭 태그용 고정된 단계명을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Recipe => "recipe",
            Self::Context => "context",
            Self::Build => "build",
            Self::Run => "run",
            Self::Collect => "collect",
            Self::Inspect => "inspect",
            Self::Cleanup => "cleanup",
            Self::Engine => "engine",
            Self::Schedule => "schedule",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for ScanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 컨테이너 엔진 호출 에러
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// 엔진 API 호출 실패
    #[error("engine api error: {0}")]
    Api(String),

    /// 대상 객체가 존재하지 않음 (404)
    #[error("not found: {0}")]
    NotFound(String),

    /// 엔진 연결 실패
    #[error("engine connection error: {0}")]
    Connection(String),

    /// 이미지 빌드 실패 (지금까지 받은 빌드 로그 포함)
    #[error("build failed: {reason}")]
    Build {
        /// 실패 사유
        reason: String,
        /// 부분 빌드 로그
        log: String,
    },
}

/// 대상 단위 스캔 실패
///
/// 오류가 발생한 단계와 원인을 담습니다. 실패는 보관되지 않고
/// 실패 채널로 한 번 전달된 뒤 버려집니다.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// 대상 이미지 pull 실패
    #[error("error pulling image {image}: {reason}")]
    Pull { image: String, reason: String },

    /// 빌드 레시피 생성 실패
    #[error("error synthesizing scan recipe for {image}: {reason}")]
    Recipe { image: String, reason: String },

    /// 빌드 컨텍스트 생성 실패
    #[error("error packaging build context for {image}: {reason}")]
    Context { image: String, reason: String },

    /// 스캔 이미지 빌드 실패
    #[error("error building scan image {image}: {reason}{}", format_build_log(.build_log))]
    Build {
        image: String,
        reason: String,
        /// 진단용 부분 빌드 로그
        build_log: String,
    },

    /// 스캔 컨테이너 생성 또는 시작 실패
    #[error("error running scan container for {image}: {reason}")]
    Run { image: String, reason: String },

    /// 스캔 출력 읽기 또는 디코딩 실패
    #[error("error collecting scan output for {image}: {reason}")]
    Collect { image: String, reason: String },

    /// 컨테이너 inspect 실패
    #[error("error inspecting container {container_id}: {reason}")]
    Inspect {
        container_id: String,
        reason: String,
    },

    /// 임시 아티팩트 정리 실패 (로그로만 남기며 주 결과로 전파하지 않음)
    #[error("error removing {resource}: {reason}")]
    Cleanup { resource: String, reason: String },

    /// 공유 취소 토큰에 의해 중단됨
    #[error("scan of {target} cancelled during {stage}")]
    Cancelled { target: String, stage: ScanStage },

    /// 대상별 마감 시간 초과
    #[error("scan of {target} timed out after {timeout_secs}s during {stage}")]
    TimedOut {
        target: String,
        stage: ScanStage,
        timeout_secs: u64,
    },

    /// 결과 없이 종료된 스캔 태스크
    #[error("scan task for {target} terminated abnormally: {reason}")]
    TaskPanicked { target: String, reason: String },

    /// 대상과 무관한 엔진 호출 실패 (컨테이너 나열, 연결 확인)
    #[error("engine error: {0}")]
    Engine(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config { field: String, reason: String },
}

fn format_build_log(log: &str) -> String {
    let log = log.trim_end();
    if log.is_empty() {
        String::new()
    } else {
        format!(": build result: {log}")
    }
}

impl ScanError {
    /// 실패가 발생한 단계를 반환합니다.
    pub fn stage(&self) -> ScanStage {
        match self {
            Self::Pull { .. } => ScanStage::Pull,
            Self::Recipe { .. } => ScanStage::Recipe,
            Self::Context { .. } => ScanStage::Context,
            Self::Build { .. } => ScanStage::Build,
            Self::Run { .. } => ScanStage::Run,
            Self::Collect { .. } => ScanStage::Collect,
            Self::Inspect { .. } => ScanStage::Inspect,
            Self::Cleanup { .. } => ScanStage::Cleanup,
            Self::Cancelled { stage, .. } | Self::TimedOut { stage, .. } => *stage,
            Self::TaskPanicked { .. } => ScanStage::Schedule,
            Self::Engine(_) => ScanStage::Engine,
            Self::Config { .. } => ScanStage::Config,
        }
    }

    /// 실패한 대상 식별자를 반환합니다 (대상과 무관한 에러는 `None`).
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Pull { image, .. }
            | Self::Recipe { image, .. }
            | Self::Context { image, .. }
            | Self::Build { image, .. }
            | Self::Run { image, .. }
            | Self::Collect { image, .. } => Some(image),
            Self::Inspect { container_id, .. } => Some(container_id),
            Self::Cancelled { target, .. }
            | Self::TimedOut { target, .. }
            | Self::TaskPanicked { target, .. } => Some(target),
            Self::Cleanup { .. } | Self::Engine(_) | Self::Config { .. } => None,
        }
    }
}

impl From<ScanError> for DockscanError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::Config { field, reason } => {
                DockscanError::Config(ConfigError::InvalidValue { field, reason })
            }
            other => DockscanError::Scan(other.to_string()),
        }
    }
}
