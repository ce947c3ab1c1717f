//! 로그 테일링 에러 타입

use wiregate_core::error::AgentError;

/// 로그 테일링 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    /// 파일 읽기 실패
    #[error("failed to read '{path}': {reason}")]
    Read {
        /// 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 오프셋 계산 오버플로우
    #[error("offset overflow while reading '{path}'")]
    OffsetOverflow {
        /// 파일 경로
        path: String,
    },

    /// 글롭 패턴 컴파일 실패
    #[error("invalid glob pattern '{pattern}': {reason}")]
    Pattern {
        /// 원본 패턴
        pattern: String,
        /// 실패 사유
        reason: String,
    },
}

impl From<TailError> for AgentError {
    fn from(err: TailError) -> Self {
        AgentError::Tail(err.to_string())
    }
}
