//! 캡처 워커 -- 인터페이스 하나당 하나의 캡처 루프
//!
//! pcap 읽기는 블로킹이므로 전용 블로킹 스레드에서 수행하고,
//! 읽힌 프레임은 채널을 거쳐 비동기 태스크에서 디섹션·수락됩니다.
//! 핸들은 1초 읽기 타임아웃으로 열어, 타임아웃마다 취소 토큰을
//! 재확인하여 종료가 한 타임아웃 주기 안에 관측되도록 합니다.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use pcap::Capture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use wiregate_core::config::CaptureConfig;
use wiregate_core::metrics::{
    EVENT_PROCESSING_DURATION_SECONDS, EVENTS_PROCESSED_TOTAL, LABEL_TYPE, TYPE_NETWORK,
};

use crate::batcher::PacketBatcher;
use crate::dissect::dissect;
use crate::error::CaptureError;

/// 리더 → 프로세서 채널 용량
const FRAME_CHANNEL_CAPACITY: usize = 1024;

/// 핸들 읽기 타임아웃 (밀리초) -- 취소 토큰 확인 주기를 결정
const READ_TIMEOUT_MS: i32 = 1000;

/// 리더가 프로세서로 넘기는 원시 프레임
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// 캡처 시각 (UTC)
    pub timestamp: DateTime<Utc>,
    /// 프레임 바이트
    pub data: Vec<u8>,
}

/// 캡처 가능한 인터페이스 이름을 열거합니다.
///
/// 열거 실패는 기동 단계의 치명적 에러입니다.
pub fn enumerate_interfaces() -> Result<Vec<String>, CaptureError> {
    let devices = pcap::Device::list().map_err(|e| CaptureError::Enumerate(e.to_string()))?;
    Ok(devices.into_iter().map(|d| d.name).collect())
}

/// 인터페이스 하나의 캡처 워커
pub struct CaptureWorker {
    device: String,
    config: CaptureConfig,
    batcher: Arc<PacketBatcher>,
    cancel: CancellationToken,
}

impl CaptureWorker {
    /// 새 캡처 워커를 생성합니다.
    pub fn new(
        device: impl Into<String>,
        config: CaptureConfig,
        batcher: Arc<PacketBatcher>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            device: device.into(),
            config,
            batcher,
            cancel,
        }
    }

    /// 캡처 루프를 실행합니다.
    ///
    /// 핸들을 열지 못하면 로그만 남기고 조용히 종료합니다 --
    /// 다른 인터페이스의 워커는 계속 동작합니다. 리더가 종료하여
    /// 채널이 닫히면 잔여 프레임을 처리한 뒤 반환합니다.
    pub async fn run(self) {
        let (frame_tx, frame_rx) = mpsc::channel::<RawFrame>(FRAME_CHANNEL_CAPACITY);

        let device = self.device.clone();
        let config = self.config.clone();
        let cancel = self.cancel.clone();
        let reader = tokio::task::spawn_blocking(move || {
            read_frames(&device, &config, &cancel, &frame_tx);
        });

        process_frames(&self.device, frame_rx, &self.batcher).await;

        if let Err(e) = reader.await {
            tracing::error!(device = %self.device, error = %e, "capture reader task failed");
        }
        tracing::debug!(device = %self.device, "capture worker exited");
    }
}

/// 블로킹 캡처 루프 -- 프레임을 읽어 채널로 보냅니다.
fn read_frames(
    device: &str,
    config: &CaptureConfig,
    cancel: &CancellationToken,
    frame_tx: &mpsc::Sender<RawFrame>,
) {
    let inactive = match Capture::from_device(device) {
        Ok(inactive) => inactive,
        Err(e) => {
            tracing::error!(device, error = %e, "failed to open device");
            return;
        }
    };

    let mut capture = match inactive
        .promisc(config.promiscuous)
        .snaplen(config.snaplen)
        .timeout(READ_TIMEOUT_MS)
        .open()
    {
        Ok(capture) => capture,
        Err(e) => {
            tracing::error!(device, error = %e, "failed to open capture handle");
            return;
        }
    };

    tracing::info!(device, "capture started");

    while !cancel.is_cancelled() {
        match capture.next_packet() {
            Ok(packet) => {
                let frame = RawFrame {
                    timestamp: capture_timestamp(packet.header),
                    data: packet.data.to_vec(),
                };
                if frame_tx.blocking_send(frame).is_err() {
                    // 프로세서가 사라짐 -- 워커 종료
                    break;
                }
            }
            // 이 타임아웃 구간에 프레임 없음 -- 취소 토큰만 재확인
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(e) => {
                tracing::error!(device, error = %e, "capture read error, stopping worker");
                break;
            }
        }
    }
}

/// 프레임 처리 루프 -- 디섹션하고 배처에 수락시킵니다.
///
/// 채널이 닫히면 (리더 종료) 잔여 프레임을 모두 처리하고 반환합니다.
pub(crate) async fn process_frames(
    device: &str,
    mut frame_rx: mpsc::Receiver<RawFrame>,
    batcher: &PacketBatcher,
) {
    while let Some(frame) = frame_rx.recv().await {
        let started = Instant::now();

        let record = dissect(device, frame.timestamp, &frame.data);
        batcher.admit(record).await;

        metrics::histogram!(EVENT_PROCESSING_DURATION_SECONDS, LABEL_TYPE => TYPE_NETWORK)
            .record(started.elapsed().as_secs_f64());
        metrics::counter!(EVENTS_PROCESSED_TOTAL, LABEL_TYPE => TYPE_NETWORK).increment(1);
    }
}

/// pcap 헤더의 timeval을 UTC 시각으로 변환합니다.
fn capture_timestamp(header: &pcap::PacketHeader) -> DateTime<Utc> {
    let secs = header.ts.tv_sec as i64;
    let nanos = (header.ts.tv_usec as u32).saturating_mul(1000);
    DateTime::from_timestamp(secs, nanos).unwrap_or_else(Utc::now)
}
