//! 에러 타입 -- 도메인별 에러 정의

/// 에이전트 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 패킷 캡처 에러
    #[error("capture error: {0}")]
    Capture(String),

    /// 버스 발행 에러
    #[error("publish error: {0}")]
    Publish(String),

    /// 로그 테일링 에러
    #[error("tail error: {0}")]
    Tail(String),

    /// 직렬화 에러
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

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
