#![doc = include_str!("../README.md")]

pub mod error;
pub mod kafka;

// --- 주요 타입 re-export ---

pub use error::PublishError;
pub use kafka::KafkaPublisher;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// dyn-compatible Future 타입 별칭
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 버스 발행 seam
///
/// 배처는 이 trait만 바라보고 메시지를 발행합니다.
/// 프로덕션에서는 [`KafkaPublisher`]가, 테스트에서는 mock이 구현합니다.
pub trait BusPublisher: Send + Sync {
    /// 직렬화된 메시지 하나를 버스에 발행합니다.
    ///
    /// 발행이 확인(ack)되거나 에러가 날 때까지 대기합니다.
    fn publish(&self, payload: &[u8])
    -> impl Future<Output = Result<(), PublishError>> + Send;
}

/// dyn-compatible 발행자 trait
///
/// `BusPublisher`는 RPITIT를 사용하므로 `dyn BusPublisher`가 불가합니다.
/// `DynBusPublisher`는 `BoxFuture`를 반환하여 `Arc<dyn DynBusPublisher>`로
/// 발행자를 배처에 주입할 수 있게 합니다. `BusPublisher` 구현 타입은
/// blanket impl으로 자동으로 이 trait도 구현합니다.
pub trait DynBusPublisher: Send + Sync {
    /// 직렬화된 메시지 하나를 버스에 발행합니다.
    fn publish<'a>(&'a self, payload: &'a [u8]) -> BoxFuture<'a, Result<(), PublishError>>;
}

impl<T: BusPublisher> DynBusPublisher for T {
    fn publish<'a>(&'a self, payload: &'a [u8]) -> BoxFuture<'a, Result<(), PublishError>> {
        Box::pin(BusPublisher::publish(self, payload))
    }
}

/// 유계 재시도 발행
///
/// 최대 `attempts`회 발행을 시도하고, 시도 사이에 `backoff`만큼 대기합니다.
/// 모든 시도가 실패하면 [`PublishError::Exhausted`]를 반환하며,
/// 메시지를 디스크에 스풀하지 않고 버릴지는 호출자가 결정합니다.
/// 성공한 뒤에는 재시도하지 않습니다.
pub async fn publish_with_retry(
    publisher: &dyn DynBusPublisher,
    payload: &[u8],
    attempts: u32,
    backoff: Duration,
) -> Result<(), PublishError> {
    let mut last_reason = String::new();

    for attempt in 1..=attempts.max(1) {
        match publisher.publish(payload).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::error!(
                    attempt,
                    error = %e,
                    "failed to publish message to bus"
                );
                last_reason = e.to_string();
            }
        }
        if attempt < attempts {
            tokio::time::sleep(backoff).await;
        }
    }

    Err(PublishError::Exhausted {
        attempts: attempts.max(1),
        reason: last_reason,
    })
}
