//! 에러 타입 -- 도메인별 에러 정의

/// dockscan 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum DockscanError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 스캔 실행 에러 (스캐너 크레이트의 에러를 문자열로 보존)
    #[error("scan error: {0}")]
    Scan(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_into_top_level() {
        let err: DockscanError = ConfigError::ParseFailed {
            reason: "bad toml".to_owned(),
        }
        .into();
        assert!(matches!(err, DockscanError::Config(_)));
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn invalid_value_names_the_field() {
        let err = ConfigError::InvalidValue {
            field: "orchestrator.max_concurrency".to_owned(),
            reason: "must be 0-1024".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("orchestrator.max_concurrency"));
        assert!(msg.contains("0-1024"));
    }

    #[test]
    fn io_error_converts_into_top_level() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: DockscanError = io.into();
        assert!(matches!(err, DockscanError::Io(_)));
    }
}
