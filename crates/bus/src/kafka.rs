//! Kafka 발행자 구현
//!
//! `rdkafka`의 [`FutureProducer`]로 [`BusPublisher`](crate::BusPublisher)를
//! 구현합니다. 압축은 gzip 코덱을 사용하며, 메시지 크기 상한은
//! 발행 전 배처가 직렬화 크기로 이미 보장합니다 (압축 전 기준).

use std::time::Duration;

use rdkafka::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;

use wiregate_core::config::BusConfig;

use crate::BusPublisher;
use crate::error::PublishError;

/// 프로듀서 측 메시지 크기 상한 (바이트)
///
/// 배처의 상한(5 MiB)보다 여유를 두어, 단일 초과 레코드의 거부 판정이
/// 로컬이 아닌 브로커에서 내려지도록 합니다.
const PRODUCER_MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

/// 토픽 하나에 발행하는 Kafka 프로듀서 핸들
///
/// 내부 프로듀서는 스레드 안전하므로 `Arc`로 감싸 여러 워커가
/// 참조로 공유합니다.
pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaPublisher {
    /// 버스 설정과 대상 토픽으로 발행자를 생성합니다.
    ///
    /// 프로듀서는 지연 연결이므로 브로커 접속은 첫 발행 시점에 일어납니다.
    pub fn new(config: &BusConfig, topic: impl Into<String>) -> Result<Self, PublishError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("compression.type", "gzip")
            .set(
                "message.max.bytes",
                PRODUCER_MAX_MESSAGE_BYTES.to_string(),
            )
            .set(
                "message.timeout.ms",
                config.message_timeout.as_millis().to_string(),
            )
            .create()
            .map_err(|e| PublishError::Producer(e.to_string()))?;

        Ok(Self {
            producer,
            topic: topic.into(),
            timeout: config.message_timeout,
        })
    }

    /// 발행 대상 토픽 이름을 반환합니다.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 전송 대기 중인 메시지를 모두 내보냅니다.
    ///
    /// 종료 시퀀스에서 마지막 플러시 이후에 호출됩니다.
    pub fn flush(&self) -> Result<(), PublishError> {
        self.producer
            .flush(Timeout::After(self.timeout))
            .map_err(|e| PublishError::Delivery {
                topic: self.topic.clone(),
                reason: e.to_string(),
            })
    }
}

impl BusPublisher for KafkaPublisher {
    async fn publish(&self, payload: &[u8]) -> Result<(), PublishError> {
        let record = FutureRecord::<(), [u8]>::to(&self.topic).payload(payload);

        self.producer
            .send(record, Timeout::After(self.timeout))
            .await
            .map(|_| ())
            .map_err(|(err, _message)| PublishError::Delivery {
                topic: self.topic.clone(),
                reason: err.to_string(),
            })
    }
}
