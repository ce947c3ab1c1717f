//! 캡처 도메인 에러 타입

use wiregate_core::error::AgentError;

/// 패킷 캡처 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// 인터페이스 열기 실패
    #[error("failed to open interface '{device}': {reason}")]
    Open {
        /// 인터페이스 이름
        device: String,
        /// 실패 사유
        reason: String,
    },

    /// 인터페이스 열거 실패
    #[error("failed to enumerate interfaces: {0}")]
    Enumerate(String),

    /// 워커 내부 채널 에러
    #[error("channel error: {0}")]
    Channel(String),
}

impl From<CaptureError> for AgentError {
    fn from(err: CaptureError) -> Self {
        AgentError::Capture(err.to_string())
    }
}
