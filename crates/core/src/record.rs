//! 레코드 타입 -- 버스로 발행되는 데이터의 공통 형식
//!
//! 캡처 워커가 생성하는 [`PacketRecord`], 로그 테일러가 생성하는
//! [`LogRecord`], 로그 배치를 감싸는 [`Envelope`]를 정의합니다.
//! 모든 타입은 snake_case 필드명의 JSON으로 직렬화되며,
//! 설정되지 않은 선택 필드는 직렬화에서 생략됩니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 패킷 하나당 보존하는 최대 페이로드 크기 (바이트)
pub const MAX_PAYLOAD_BYTES: usize = 1024;

/// 버스로 발행하는 메시지 하나의 최대 직렬화 크기 (바이트, 압축 전)
pub const MAX_MESSAGE_BYTES: usize = 5 * 1024 * 1024;

/// 캡처된 패킷 하나의 구조화 레코드
///
/// 디섹터가 프레임에서 인식한 계층의 필드만 채워지며,
/// 인식하지 못한 계층의 필드는 기본값으로 남아 JSON에서 생략됩니다.
/// 디섹션 이후에는 변경되지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PacketRecord {
    /// 캡처 시각 (UTC)
    pub timestamp: DateTime<Utc>,
    /// 캡처된 인터페이스 이름
    pub device_name: String,

    // --- 링크 계층 ---
    /// 출발지 MAC (콜론 구분 16진수)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub src_mac: String,
    /// 목적지 MAC (콜론 구분 16진수)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dst_mac: String,
    /// EtherType 이름 (예: "IPv4", "ARP") 또는 16진수 표기
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ether_type: String,
    /// 802.1Q VLAN ID
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub vlan_id: u16,
    /// 멀티캐스트 여부 -- 목적지 MAC 첫 바이트의 최하위 비트
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_multicast: bool,

    // --- 네트워크 계층 ---
    /// 출발지 IP (텍스트)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub src_ip: String,
    /// 목적지 IP (텍스트)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dst_ip: String,
    /// IP 버전 태그 ("IPv4" | "IPv6")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip_version: String,
    /// TTL (IPv4) 또는 홉 리밋 (IPv6)
    #[serde(default, skip_serializing_if = "is_zero_u8")]
    pub ttl: u8,
    /// 전송 계층 프로토콜 이름 (예: "TCP", "UDP")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    /// 프래그먼트 식별자
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub fragment_id: u32,
    /// 프래그먼트 오프셋
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub fragment_offset: u16,
    /// DSCP (TOS 상위 6비트)
    #[serde(default, skip_serializing_if = "is_zero_u8")]
    pub dscp: u8,
    /// ICMP 타입
    #[serde(default, skip_serializing_if = "is_zero_u8")]
    pub icmp_type: u8,
    /// ICMP 코드
    #[serde(default, skip_serializing_if = "is_zero_u8")]
    pub icmp_code: u8,

    // --- 전송 계층 ---
    /// 출발지 포트
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub src_port: u16,
    /// 목적지 포트
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub dst_port: u16,
    /// TCP 플래그 문자열 -- "FSRPAU" 순서로 설정된 플래그의 글자만 이어붙임
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tcp_flags: String,
    /// TCP 시퀀스 번호
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub sequence_number: u32,
    /// TCP ACK 번호
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub acknowledgement_number: u32,
    /// TCP 윈도우 크기
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub window_size: u16,

    // --- 응용 계층 ---
    /// DNS 트랜잭션 ID
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub dns_id: u16,
    /// DNS opcode 이름 (예: "Query")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dns_opcode: String,
    /// DNS 질의 이름 목록
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_query: Vec<String>,
    /// HTTP 메서드 -- 다운스트림 프로세서가 채웁니다
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub http_method: String,
    /// TLS 버전 -- 다운스트림 프로세서가 채웁니다
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tls_version: String,
    /// SNI -- 다운스트림 프로세서가 채웁니다
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sni: String,

    // --- 페이로드 ---
    /// 응용 계층 페이로드 (base64, 최대 [`MAX_PAYLOAD_BYTES`])
    #[serde(
        default,
        with = "base64_bytes",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub payload: Vec<u8>,
    /// 잘라낸 뒤의 페이로드 길이
    #[serde(default, skip_serializing_if = "is_zero_usize")]
    pub payload_size: usize,
}

impl PacketRecord {
    /// 캡처 시각과 인터페이스 이름만 채운 빈 레코드를 생성합니다.
    pub fn new(timestamp: DateTime<Utc>, device_name: impl Into<String>) -> Self {
        Self {
            timestamp,
            device_name: device_name.into(),
            ..Self::default()
        }
    }

    /// 페이로드를 [`MAX_PAYLOAD_BYTES`]로 잘라내고 `payload_size`를 맞춥니다.
    ///
    /// 디섹션 시점과 배치 수락 시점 양쪽에서 호출됩니다.
    /// 잘라냈으면 `true`를 반환합니다.
    pub fn enforce_payload_limit(&mut self) -> bool {
        if self.payload.len() > MAX_PAYLOAD_BYTES {
            self.payload.truncate(MAX_PAYLOAD_BYTES);
            self.payload_size = MAX_PAYLOAD_BYTES;
            true
        } else {
            false
        }
    }
}

/// 테일링된 로그 한 줄의 레코드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// 줄을 읽은 시각 (UTC, 파일 mtime이 아님)
    pub timestamp: DateTime<Utc>,
    /// 원본 파일 경로
    pub file: String,
    /// 앞뒤 공백을 제거한 줄 내용
    pub message: String,
}

/// 로그 토픽 메시지의 외피
///
/// 센서(호스트) 식별자와 데이터 종류 태그로 로그 배치를 감쌉니다.
/// 네트워크 토픽은 외피 없이 레코드 배열을 그대로 발행합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// 센서 식별자 -- 호스트 이름, 조회 실패 시 "unknown"
    pub sensor_id: String,
    /// 데이터 종류 태그 (로그 배치는 항상 "log")
    pub data_type: String,
    /// 외피 생성 시각 (UTC)
    pub timestamp: DateTime<Utc>,
    /// 배치에 담긴 로그 레코드
    pub payload: Vec<LogRecord>,
}

impl Envelope {
    /// 로그 배치를 감싸는 외피를 생성합니다.
    pub fn logs(sensor_id: impl Into<String>, payload: Vec<LogRecord>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            data_type: "log".to_owned(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// 페이로드 바이트의 base64 직렬화 어댑터
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_zero_u8(v: &u8) -> bool {
    *v == 0
}

fn is_zero_u16(v: &u16) -> bool {
    *v == 0
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

fn is_zero_usize(v: &usize) -> bool {
    *v == 0
}
