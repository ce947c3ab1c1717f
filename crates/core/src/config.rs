//! 설정 관리 -- wiregate.toml 파싱 및 런타임 설정
//!
//! 모든 값은 기동 시점에 확정됩니다. 설정 파일이 없으면 기본값으로
//! 동작하며, CLI 플래그가 파일 값을 덮어씁니다 (에이전트 바이너리 담당).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 에이전트 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// 일반 설정
    pub general: GeneralConfig,
    /// 패킷 캡처 설정
    pub capture: CaptureConfig,
    /// 로그 테일링 설정
    pub logs: LogTailConfig,
    /// 버스(Kafka) 설정
    pub bus: BusConfig,
    /// 메트릭 엔드포인트 설정
    pub metrics: MetricsConfig,
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨
    pub log_level: String,
    /// 로그 형식 (json, pretty, compact)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 패킷 캡처 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 배치 최대 레코드 수 -- 도달 시 즉시 플러시
    pub batch_size: usize,
    /// 배치 타임아웃 -- 첫 수락 이후 이 시간이 지나면 플러시
    #[serde(with = "humantime_serde")]
    pub batch_timeout: Duration,
    /// 캡처 스냅샷 길이 (바이트)
    pub snaplen: i32,
    /// 무차별 모드 여부
    pub promiscuous: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 100,
            batch_timeout: Duration::from_secs(1),
            snaplen: 65535,
            promiscuous: true,
        }
    }
}

/// 로그 테일링 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogTailConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 탐색할 디렉토리 목록 (하위 디렉토리는 내려가지 않음)
    pub directories: Vec<String>,
    /// 포함 글롭 패턴 -- 파일 이름 기준
    pub file_patterns: Vec<String>,
    /// 제외 글롭 패턴 -- 포함된 파일에서 다시 제거
    pub exclude_patterns: Vec<String>,
    /// 배치 최대 레코드 수
    pub batch_size: usize,
    /// 배치 타임아웃
    #[serde(with = "humantime_serde")]
    pub batch_timeout: Duration,
    /// 파일 상태 폴링 주기
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for LogTailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directories: vec![
                "/var/log".to_owned(),
                "/var/log/audit".to_owned(),
                "/var/log/journal".to_owned(),
                "/var/www/logs".to_owned(),
                "/var/log/apache2".to_owned(),
                "/var/log/httpd".to_owned(),
                "/var/log/samba".to_owned(),
            ],
            file_patterns: vec![
                "*.log".to_owned(),
                "*.syslog".to_owned(),
                "messages".to_owned(),
                "secure".to_owned(),
            ],
            exclude_patterns: vec!["*.gz".to_owned(), "*.zip".to_owned()],
            batch_size: 100,
            batch_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// 버스(Kafka) 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// 브로커 주소 목록
    pub brokers: Vec<String>,
    /// 네트워크 이벤트 토픽
    pub network_topic: String,
    /// 로그 이벤트 토픽
    pub log_topic: String,
    /// 메시지당 발행 시도 횟수
    pub publish_attempts: u32,
    /// 발행 재시도 간격
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
    /// 메시지 전송 타임아웃
    #[serde(with = "humantime_serde")]
    pub message_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_owned()],
            network_topic: "wiregate-network-events".to_owned(),
            log_topic: "wiregate-log-events".to_owned(),
            publish_attempts: 3,
            retry_backoff: Duration::from_secs(1),
            message_timeout: Duration::from_secs(10),
        }
    }
}

/// 메트릭 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// HTTP 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "0.0.0.0".to_owned(),
            port: 9100,
        }
    }
}

impl AgentConfig {
    /// 설정 파일을 읽어 파싱합니다.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::FileNotFound {
                path: path.display().to_string(),
            })?;

        Self::parse(&raw)
    }

    /// TOML 문자열을 파싱합니다.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const MAX_BATCH_SIZE: usize = 100_000;
        const MAX_BATCH_TIMEOUT: Duration = Duration::from_secs(3600);

        for (field, batch_size) in [
            ("capture.batch_size", self.capture.batch_size),
            ("logs.batch_size", self.logs.batch_size),
        ] {
            if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: format!("must be 1-{MAX_BATCH_SIZE}"),
                });
            }
        }

        for (field, timeout) in [
            ("capture.batch_timeout", self.capture.batch_timeout),
            ("logs.batch_timeout", self.logs.batch_timeout),
        ] {
            if timeout.is_zero() || timeout > MAX_BATCH_TIMEOUT {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "must be between 1ms and 1h".to_owned(),
                });
            }
        }

        if self.logs.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "logs.poll_interval".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.capture.snaplen <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "capture.snaplen".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.bus.brokers.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "bus.brokers".to_owned(),
                reason: "at least one broker is required".to_owned(),
            });
        }

        if self.bus.network_topic.is_empty() || self.bus.log_topic.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "bus.topics".to_owned(),
                reason: "topic names must not be empty".to_owned(),
            });
        }

        if self.bus.publish_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "bus.publish_attempts".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.logs.enabled && self.logs.directories.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "logs.directories".to_owned(),
                reason: "at least one directory must be configured when enabled".to_owned(),
            });
        }

        Ok(())
    }
}
