//! 패킷 배처 -- 캡처 워커들이 공유하는 배치 버퍼
//!
//! 모든 캡처 워커가 하나의 배처에 레코드를 수락시킵니다.
//! 버퍼와 대기 타이머는 단일 락이 함께 보호하며, 락은
//! {수락, 타이머 발화, 명시적 플러시} 각각의 전체 구간 동안
//! (직렬화와 발행을 포함하여) 유지됩니다.
//!
//! # 플러시 조건
//! - 버퍼가 `batch_size`에 도달하면 수락 경로에서 즉시 플러시
//! - 빈 버퍼에 첫 레코드가 수락되면 `batch_timeout` 뒤 발화하는
//!   일회성 타이머를 장전
//!
//! # 크기 상한
//! 직렬화 크기가 `max_message_bytes`를 넘으면 배치를 재귀 분할하여
//! 각 그룹을 독립적으로 발행합니다. 수락 순서는 분할 그룹을
//! 가로질러 보존됩니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use wiregate_bus::{DynBusPublisher, publish_with_retry};
use wiregate_core::PacketRecord;
use wiregate_core::metrics::EVENTS_BATCH_SIZE;

/// 락이 함께 보호하는 배처 내부 상태
struct BatcherInner {
    /// 수락 순서대로 쌓이는 레코드 버퍼
    records: Vec<PacketRecord>,
    /// 대기 중인 일회성 플러시 타이머
    timer: Option<JoinHandle<()>>,
}

/// 패킷 레코드 배처
///
/// `Clone`은 동일한 버퍼를 공유하는 핸들을 만듭니다.
/// 워커들은 `Arc<PacketBatcher>`로 공유 핸들을 받습니다.
#[derive(Clone)]
pub struct PacketBatcher {
    inner: Arc<Mutex<BatcherInner>>,
    publisher: Arc<dyn DynBusPublisher>,
    batch_size: usize,
    batch_timeout: Duration,
    max_message_bytes: usize,
    publish_attempts: u32,
    retry_backoff: Duration,
}

impl PacketBatcher {
    /// 새 배처를 생성합니다.
    pub fn new(
        publisher: Arc<dyn DynBusPublisher>,
        batch_size: usize,
        batch_timeout: Duration,
        max_message_bytes: usize,
        publish_attempts: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BatcherInner {
                records: Vec::with_capacity(batch_size),
                timer: None,
            })),
            publisher,
            batch_size,
            batch_timeout,
            max_message_bytes,
            publish_attempts,
            retry_backoff,
        }
    }

    /// 레코드 하나를 배치에 수락합니다.
    ///
    /// 페이로드 상한은 디섹션과 별개로 여기서 한 번 더 강제됩니다.
    /// 버퍼가 `batch_size`에 도달하면 이 호출 안에서 플러시됩니다.
    pub async fn admit(&self, mut record: PacketRecord) {
        let mut inner = self.inner.lock().await;

        record.enforce_payload_limit();
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
    ///
    /// 종료 시퀀스에서 잔여 배치를 내보낼 때 호출됩니다.
    /// 빈 배처에 대해서는 no-op이며 타이머 상태만 정리됩니다.
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

    async fn flush_locked(&self, inner: &mut BatcherInner) {
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        if inner.records.is_empty() {
            return;
        }

        // 스냅샷을 빼내고 버퍼는 용량을 유지한 채 비움
        let snapshot: Vec<PacketRecord> = inner.records.drain(..).collect();

        let data = match serde_json::to_vec(&snapshot) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize packet batch");
                return;
            }
        };

        if data.len() > self.max_message_bytes {
            let groups = match split_batch(&snapshot, self.max_message_bytes) {
                Ok(groups) => groups,
                Err(e) => {
                    tracing::error!(error = %e, "failed to split packet batch");
                    return;
                }
            };
            for group in groups {
                let payload = match serde_json::to_vec(&group) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize packet group");
                        continue;
                    }
                };
                self.publish(payload).await;
            }
        } else {
            self.publish(data).await;
        }
    }

    async fn publish(&self, payload: Vec<u8>) {
        if let Err(e) = publish_with_retry(
            self.publisher.as_ref(),
            &payload,
            self.publish_attempts,
            self.retry_backoff,
        )
        .await
        {
            // 디스크 스풀 없음 -- 한도 소진 시 배치는 버려짐
            tracing::error!(
                error = %e,
                bytes = payload.len(),
                "dropping packet batch after exhausting publish attempts"
            );
        }
    }
}

/// 직렬화 크기가 상한을 넘는 배치를 왼쪽부터 누적하며 분할합니다.
///
/// 누적 그룹이 상한을 넘으면 마지막 레코드를 빼서 그룹을 확정하고,
/// 뺀 레코드로 새 그룹을 시작합니다. 레코드 하나만으로 상한을 넘는
/// 경우 그 레코드를 단독 그룹으로 내보냅니다 -- 수신 거부 판단은
/// 버스에 맡깁니다.
fn split_batch<'a>(
    batch: &'a [PacketRecord],
    max_bytes: usize,
) -> Result<Vec<Vec<&'a PacketRecord>>, serde_json::Error> {
    let mut groups: Vec<Vec<&PacketRecord>> = Vec::new();
    let mut current: Vec<&PacketRecord> = Vec::new();

    for record in batch {
        current.push(record);
        let size = serde_json::to_vec(&current)?.len();
        if size > max_bytes {
            if current.len() == 1 {
                groups.push(std::mem::take(&mut current));
            } else if let Some(last) = current.pop() {
                groups.push(std::mem::replace(&mut current, vec![last]));
            }
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiregate_bus::{BusPublisher, PublishError};
    use wiregate_core::{MAX_MESSAGE_BYTES, MAX_PAYLOAD_BYTES};

    /// 발행된 메시지를 기록하는 mock 발행자
    struct RecordingPublisher {
        messages: StdMutex<Vec<Vec<u8>>>,
        fail_attempts: AtomicU32,
        calls: AtomicU32,
    }

    impl RecordingPublisher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                messages: StdMutex::new(Vec::new()),
                fail_attempts: AtomicU32::new(0),
                calls: AtomicU32::new(0),
            })
        }

        fn failing(attempts: u32) -> Arc<Self> {
            let publisher = Self::new();
            publisher.fail_attempts.store(attempts, Ordering::SeqCst);
            publisher
        }

        fn messages(&self) -> Vec<Vec<u8>> {
            self.messages.lock().unwrap().clone()
        }

        fn decoded(&self) -> Vec<Vec<PacketRecord>> {
            self.messages()
                .iter()
                .map(|m| serde_json::from_slice(m).unwrap())
                .collect()
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl BusPublisher for RecordingPublisher {
        async fn publish(&self, payload: &[u8]) -> Result<(), PublishError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_attempts.load(Ordering::SeqCst) > 0 {
                self.fail_attempts.fetch_sub(1, Ordering::SeqCst);
                return Err(PublishError::Delivery {
                    topic: "test".to_owned(),
                    reason: "simulated failure".to_owned(),
                });
            }
            self.messages.lock().unwrap().push(payload.to_vec());
            Ok(())
        }
    }

    fn record(tag: u32) -> PacketRecord {
        PacketRecord {
            src_port: 1,
            sequence_number: tag,
            ..PacketRecord::new(Utc::now(), "eth0")
        }
    }

    fn batcher(
        publisher: Arc<RecordingPublisher>,
        batch_size: usize,
        timeout: Duration,
        max_bytes: usize,
    ) -> PacketBatcher {
        PacketBatcher::new(
            publisher,
            batch_size,
            timeout,
            max_bytes,
            3,
            Duration::from_millis(5),
        )
    }

    #[tokio::test]
    async fn flush_on_count_at_exact_batch_size() {
        let publisher = RecordingPublisher::new();
        let batcher = batcher(
            publisher.clone(),
            3,
            Duration::from_secs(60),
            MAX_MESSAGE_BYTES,
        );

        batcher.admit(record(1)).await;
        batcher.admit(record(2)).await;
        assert!(publisher.messages().is_empty());

        batcher.admit(record(3)).await;
        let batches = publisher.decoded();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
        assert!(batcher.is_empty().await);
    }

    #[tokio::test]
    async fn flush_on_timer_before_batch_size() {
        let publisher = RecordingPublisher::new();
        let batcher = batcher(
            publisher.clone(),
            100,
            Duration::from_millis(50),
            MAX_MESSAGE_BYTES,
        );

        batcher.admit(record(1)).await;
        batcher.admit(record(2)).await;
        assert!(publisher.messages().is_empty());

        tokio::time::sleep(Duration::from_millis(150)).await;
        let batches = publisher.decoded();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert!(batcher.is_empty().await);
    }

    #[tokio::test]
    async fn count_flush_cancels_pending_timer() {
        let publisher = RecordingPublisher::new();
        let batcher = batcher(
            publisher.clone(),
            2,
            Duration::from_millis(50),
            MAX_MESSAGE_BYTES,
        );

        batcher.admit(record(1)).await;
        batcher.admit(record(2)).await; // 카운트 플러시, 타이머 취소

        tokio::time::sleep(Duration::from_millis(150)).await;
        // 타이머가 추가 메시지를 만들지 않아야 함
        assert_eq!(publisher.decoded().len(), 1);
    }

    #[tokio::test]
    async fn admit_enforces_payload_limit_again() {
        let publisher = RecordingPublisher::new();
        let batcher = batcher(
            publisher.clone(),
            1,
            Duration::from_secs(60),
            MAX_MESSAGE_BYTES,
        );

        // 디섹터를 우회해 과대 페이로드를 직접 주입
        let mut oversized = record(1);
        oversized.payload = vec![0xFF; 10 * 1024];
        oversized.payload_size = 10 * 1024;
        batcher.admit(oversized).await;

        let batches = publisher.decoded();
        assert_eq!(batches[0][0].payload.len(), MAX_PAYLOAD_BYTES);
        assert_eq!(batches[0][0].payload_size, MAX_PAYLOAD_BYTES);
    }

    #[tokio::test]
    async fn explicit_flush_drains_partial_batch() {
        let publisher = RecordingPublisher::new();
        let batcher = batcher(
            publisher.clone(),
            100,
            Duration::from_secs(60),
            MAX_MESSAGE_BYTES,
        );

        for tag in 0..42 {
            batcher.admit(record(tag)).await;
        }
        batcher.flush().await;

        let batches = publisher.decoded();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 42);
        assert_eq!(batcher.len().await, 0);
    }

    #[tokio::test]
    async fn flush_on_empty_batcher_is_noop() {
        let publisher = RecordingPublisher::new();
        let batcher = batcher(
            publisher.clone(),
            100,
            Duration::from_secs(60),
            MAX_MESSAGE_BYTES,
        );

        batcher.flush().await;
        batcher.flush().await;
        assert!(publisher.messages().is_empty());
        assert_eq!(publisher.calls(), 0);
    }

    #[tokio::test]
    async fn oversize_batch_splits_preserving_order() {
        let publisher = RecordingPublisher::new();
        // 레코드 하나가 대략 1.4KB로 직렬화되도록 꽉 찬 페이로드 사용
        let max_bytes = 4000;
        let batcher = batcher(publisher.clone(), 100, Duration::from_secs(60), max_bytes);

        for tag in 0..8 {
            let mut r = record(tag);
            r.payload = vec![0xAA; MAX_PAYLOAD_BYTES];
            r.payload_size = MAX_PAYLOAD_BYTES;
            batcher.admit(r).await;
        }
        batcher.flush().await;

        let batches = publisher.decoded();
        assert!(batches.len() > 1, "batch should have been split");

        // 각 메시지는 상한 이하여야 함
        for message in publisher.messages() {
            assert!(message.len() <= max_bytes);
        }

        // 수락 순서가 분할 그룹을 가로질러 보존되어야 함
        let tags: Vec<u32> = batches
            .iter()
            .flatten()
            .map(|r| r.sequence_number)
            .collect();
        assert_eq!(tags, (0..8).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn single_record_over_limit_is_published_anyway() {
        let publisher = RecordingPublisher::new();
        // 레코드 하나의 직렬화 크기보다 작은 상한
        let batcher = batcher(publisher.clone(), 100, Duration::from_secs(60), 200);

        let mut r = record(1);
        r.payload = vec![0xBB; MAX_PAYLOAD_BYTES];
        r.payload_size = MAX_PAYLOAD_BYTES;
        batcher.admit(r).await;
        let mut r = record(2);
        r.payload = vec![0xCC; MAX_PAYLOAD_BYTES];
        r.payload_size = MAX_PAYLOAD_BYTES;
        batcher.admit(r).await;
        batcher.flush().await;

        // 단독으로도 상한을 넘는 레코드는 각각 1건짜리 메시지로 발행
        let batches = publisher.decoded();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[1].len(), 1);
        assert_eq!(batches[0][0].sequence_number, 1);
        assert_eq!(batches[1][0].sequence_number, 2);
    }

    #[tokio::test]
    async fn publish_failure_retries_then_drops() {
        let publisher = RecordingPublisher::failing(u32::MAX);
        let batcher = batcher(
            publisher.clone(),
            1,
            Duration::from_secs(60),
            MAX_MESSAGE_BYTES,
        );

        batcher.admit(record(1)).await;
        // 정확히 3번 시도 후 포기
        assert_eq!(publisher.calls(), 3);
        assert!(publisher.messages().is_empty());
        // 드롭 후 버퍼는 비어 있어야 함 (재시도 대상 아님)
        assert!(batcher.is_empty().await);

        // 다음 배치는 새로 시도
        publisher.fail_attempts.store(0, Ordering::SeqCst);
        batcher.admit(record(2)).await;
        assert_eq!(publisher.decoded().len(), 1);
        assert_eq!(publisher.calls(), 4);
    }

    #[tokio::test]
    async fn admission_order_is_preserved() {
        let publisher = RecordingPublisher::new();
        let batcher = batcher(
            publisher.clone(),
            50,
            Duration::from_secs(60),
            MAX_MESSAGE_BYTES,
        );

        for tag in 0..50 {
            batcher.admit(record(tag)).await;
        }

        let batches = publisher.decoded();
        let tags: Vec<u32> = batches[0].iter().map(|r| r.sequence_number).collect();
        assert_eq!(tags, (0..50).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn concurrent_admits_do_not_lose_records() {
        let publisher = RecordingPublisher::new();
        let batcher = Arc::new(batcher(
            publisher.clone(),
            1000,
            Duration::from_secs(60),
            MAX_MESSAGE_BYTES,
        ));

        let mut handles = Vec::new();
        for worker in 0..4u32 {
            let batcher = Arc::clone(&batcher);
            handles.push(tokio::spawn(async move {
                for i in 0..100 {
                    batcher.admit(record(worker * 1000 + i)).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        batcher.flush().await;

        let total: usize = publisher.decoded().iter().map(Vec::len).sum();
        assert_eq!(total, 400);
    }

    #[test]
    fn split_batch_exact_boundary_is_single_message() {
        let records: Vec<PacketRecord> = (0..4).map(record).collect();
        let serialized = serde_json::to_vec(&records).unwrap();

        // 정확히 경계 크기면 분할하지 않음
        let groups = split_batch(&records, serialized.len()).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 4);
    }

    #[test]
    fn split_batch_handles_empty_input() {
        let groups = split_batch(&[], 100).unwrap();
        assert!(groups.is_empty());
    }
}
