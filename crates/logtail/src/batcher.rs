//! 로그 배처 -- 테일러들이 공유하는 배치 버퍼
//!
//! 패킷 배처와 같은 카운트/타임아웃 플러시 규율을 따르지만,
//! 플러시마다 드레인한 레코드를 센서 식별자가 붙은 외피로 감싸
//! 메시지 하나로 발행합니다. 로그 줄은 작다고 가정하므로 재귀
//! 분할은 하지 않습니다 -- 외피가 상한을 넘으면 발행이 실패하고
//! 재시도 한도 소진 후 배치가 버려집니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use wiregate_bus::{DynBusPublisher, publish_with_retry};
use wiregate_core::metrics::EVENTS_BATCH_SIZE;
use wiregate_core::{Envelope, LogRecord};

/// 락이 함께 보호하는 배처 내부 상태
struct LogBatcherInner {
    records: Vec<LogRecord>,
    timer: Option<JoinHandle<()>>,
}

/// 로그 레코드 배처
#[derive(Clone)]
pub struct LogBatcher {
    inner: Arc<Mutex<LogBatcherInner>>,
    publisher: Arc<dyn DynBusPublisher>,
    batch_size: usize,
    batch_timeout: Duration,
    publish_attempts: u32,
    retry_backoff: Duration,
    sensor_id: String,
}

impl LogBatcher {
    /// 새 로그 배처를 생성합니다.
    ///
    /// 센서 식별자는 호스트 이름으로 한 번 결정됩니다.
    pub fn new(
        publisher: Arc<dyn DynBusPublisher>,
        batch_size: usize,
        batch_timeout: Duration,
        publish_attempts: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self::with_sensor_id(
            publisher,
            batch_size,
            batch_timeout,
            publish_attempts,
            retry_backoff,
            sensor_id(),
        )
    }

    /// 센서 식별자를 지정하여 생성합니다 (테스트용).
    pub fn with_sensor_id(
        publisher: Arc<dyn DynBusPublisher>,
        batch_size: usize,
        batch_timeout: Duration,
        publish_attempts: u32,
        retry_backoff: Duration,
        sensor_id: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogBatcherInner {
                records: Vec::with_capacity(batch_size),
                timer: None,
            })),
            publisher,
            batch_size,
            batch_timeout,
            publish_attempts,
            retry_backoff,
            sensor_id: sensor_id.into(),
        }
    }

    /// 로그 레코드 하나를 배치에 수락합니다.
    pub async fn admit(&self, record: LogRecord) {
        let mut inner = self.inner.lock().await;

        inner.records.push(record);

        if inner.records.len() >= self.batch_size {
            metrics::histogram!(EVENTS_BATCH_SIZE).record(self.batch_size as f64);
            self.flush_locked(&mut inner).await;
        } else if inner.timer.is_none() {
            let batcher = self.clone();
            let timeout = self.batch_timeout;
            inner.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                batcher.timer_fire().await;
            }));
        }
    }

    /// 타이머 발화 -- 현재 쌓인 만큼 플러시합니다.
    async fn timer_fire(&self) {
        let mut inner = self.inner.lock().await;
        inner.timer = None;
        if !inner.records.is_empty() {
            metrics::histogram!(EVENTS_BATCH_SIZE).record(inner.records.len() as f64);
        }
        self.flush_locked(&mut inner).await;
    }

    /// 쌓인 레코드를 모두 플러시합니다.
    pub async fn flush(&self) {
        let mut inner = self.inner.lock().await;
        self.flush_locked(&mut inner).await;
    }

    /// 현재 버퍼 길이를 반환합니다.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    /// 버퍼가 비어있는지 확인합니다.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.records.is_empty()
    }

    async fn flush_locked(&self, inner: &mut LogBatcherInner) {
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        if inner.records.is_empty() {
            return;
        }

        let snapshot: Vec<LogRecord> = inner.records.drain(..).collect();
        let envelope = Envelope::logs(self.sensor_id.clone(), snapshot);

        let payload = match serde_json::to_vec(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize log envelope");
                return;
            }
        };

        if let Err(e) = publish_with_retry(
            self.publisher.as_ref(),
            &payload,
            self.publish_attempts,
            self.retry_backoff,
        )
        .await
        {
            tracing::error!(
                error = %e,
                bytes = payload.len(),
                "dropping log batch after exhausting publish attempts"
            );
        }
    }
}

/// 센서 식별자 -- 호스트 이름, 조회 실패 시 "unknown"
fn sensor_id() -> String {
    hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_owned())
}
