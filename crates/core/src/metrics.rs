//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `wiregate_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency)

// ─── 레이블 키/값 상수 ─────────────────────────────────────────────

/// 이벤트 종류 레이블 키 (network, log)
pub const LABEL_TYPE: &str = "type";

/// 네트워크 이벤트 레이블 값
pub const TYPE_NETWORK: &str = "network";

/// 로그 이벤트 레이블 값
pub const TYPE_LOG: &str = "log";

// ─── 메트릭 이름 ────────────────────────────────────────────────────

/// 처리된 전체 이벤트 수 (counter, label: type)
pub const EVENTS_PROCESSED_TOTAL: &str = "wiregate_events_processed_total";

/// 버스로 플러시된 배치의 크기 분포 (histogram)
pub const EVENTS_BATCH_SIZE: &str = "wiregate_events_batch_size";

/// 이벤트 하나의 처리 소요 시간 (histogram, 초, label: type)
pub const EVENT_PROCESSING_DURATION_SECONDS: &str =
    "wiregate_event_processing_duration_seconds";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 배치 크기 히스토그램 버킷 -- 0부터 50 간격의 선형 20개
pub const BATCH_SIZE_BUCKETS: [f64; 20] = [
    0.0, 50.0, 100.0, 150.0, 200.0, 250.0, 300.0, 350.0, 400.0, 450.0, 500.0, 550.0, 600.0,
    650.0, 700.0, 750.0, 800.0, 850.0, 900.0, 950.0,
];

/// 처리 시간 히스토그램 버킷 -- 1ms부터 2배 간격의 지수 10개 (초)
pub const PROCESSING_DURATION_BUCKETS: [f64; 10] = [
    0.001, 0.002, 0.004, 0.008, 0.016, 0.032, 0.064, 0.128, 0.256, 0.512,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// `metrics::describe_counter!()`, `describe_histogram!()`을 호출하여
/// Prometheus HELP 텍스트를 설정합니다. 전역 레코더 설치 후
/// 한 번만 호출해야 하며, 일반적으로 에이전트 기동 시점에 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        EVENTS_PROCESSED_TOTAL,
        "Total number of events processed by type"
    );
    describe_histogram!(
        EVENTS_BATCH_SIZE,
        "Size of event batches flushed to the bus"
    );
    describe_histogram!(
        EVENT_PROCESSING_DURATION_SECONDS,
        "Time spent processing a single event in seconds"
    );
}
