//! 버스 발행 에러 타입

use wiregate_core::error::AgentError;

/// 버스 발행 도메인 에러
///
/// `From<PublishError> for AgentError` 변환이 구현되어 있어
/// 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// 프로듀서 생성 실패
    #[error("producer init failed: {0}")]
    Producer(String),

    /// 메시지 전달 실패 (브로커 거부, 타임아웃 등)
    #[error("delivery to '{topic}' failed: {reason}")]
    Delivery {
        /// 대상 토픽
        topic: String,
        /// 실패 사유
        reason: String,
    },

    /// 재시도 한도 소진
    #[error("gave up after {attempts} attempts: {reason}")]
    Exhausted {
        /// 시도한 횟수
        attempts: u32,
        /// 마지막 실패 사유
        reason: String,
    },
}

impl From<PublishError> for AgentError {
    fn from(err: PublishError) -> Self {
        AgentError::Publish(err.to_string())
    }
}
