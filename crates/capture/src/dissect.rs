//! 패킷 디섹터 -- 원시 프레임 하나를 [`PacketRecord`] 하나로 변환
//!
//! 계층은 Ethernet → 802.1Q → IPv4|IPv6 → IPv6 프래그먼트 확장 →
//! TCP|UDP → ICMPv4 → DNS → 응용 페이로드 순서로 기회주의적으로
//! 파싱합니다. 디섹션은 절대 실패하지 않습니다 -- 인식하지 못한
//! 계층의 필드는 비워 둡니다.

use chrono::{DateTime, Utc};
use etherparse::{NetHeaders, PacketHeaders, TcpHeader, TransportHeader, VlanHeader};

use wiregate_core::PacketRecord;

use crate::dns;

/// DNS 질의/응답이 오가는 포트
const DNS_PORT: u16 = 53;

/// 캡처된 프레임을 구조화 레코드로 디섹션합니다.
///
/// 반환되는 레코드의 페이로드는 이미 상한으로 잘린 상태입니다.
pub fn dissect(device_name: &str, timestamp: DateTime<Utc>, frame: &[u8]) -> PacketRecord {
    let mut record = PacketRecord::new(timestamp, device_name);

    let headers = match PacketHeaders::from_ethernet_slice(frame) {
        Ok(headers) => headers,
        // 링크 계층조차 해석할 수 없는 프레임 -- 캡처 시각과 인터페이스만 기록
        Err(_) => return record,
    };

    // 링크 계층
    if let Some(eth) = &headers.link {
        record.src_mac = format_mac(&eth.source);
        record.dst_mac = format_mac(&eth.destination);
        record.ether_type = ether_type_name(eth.ether_type.0);
        record.is_multicast = eth.destination[0] & 1 == 1;
    }

    // 802.1Q
    match &headers.vlan {
        Some(VlanHeader::Single(vlan)) => record.vlan_id = vlan.vlan_id.value(),
        Some(VlanHeader::Double(vlan)) => record.vlan_id = vlan.outer.vlan_id.value(),
        None => {}
    }

    // 네트워크 계층
    match &headers.net {
        Some(NetHeaders::Ipv4(ip, _extensions)) => {
            record.src_ip = std::net::Ipv4Addr::from(ip.source).to_string();
            record.dst_ip = std::net::Ipv4Addr::from(ip.destination).to_string();
            record.ip_version = "IPv4".to_owned();
            record.ttl = ip.time_to_live;
            record.protocol = ip_protocol_name(ip.protocol.0);
            record.fragment_id = u32::from(ip.identification);
            record.fragment_offset = ip.fragment_offset.value();
            record.dscp = ip.dscp.value();
        }
        Some(NetHeaders::Ipv6(ip, extensions)) => {
            record.src_ip = std::net::Ipv6Addr::from(ip.source).to_string();
            record.dst_ip = std::net::Ipv6Addr::from(ip.destination).to_string();
            record.ip_version = "IPv6".to_owned();
            record.ttl = ip.hop_limit;
            record.protocol = ip_protocol_name(ip.next_header.0);

            if let Some(fragment) = &extensions.fragment {
                record.fragment_id = fragment.identification;
                record.fragment_offset = fragment.fragment_offset.value();
            }
        }
        None => {}
    }

    // 전송 계층 -- TCP가 UDP보다 우선하며, ICMP는 별도 필드에 기록
    match &headers.transport {
        Some(TransportHeader::Tcp(tcp)) => {
            record.src_port = tcp.source_port;
            record.dst_port = tcp.destination_port;
            record.tcp_flags = tcp_flag_string(tcp);
            record.sequence_number = tcp.sequence_number;
            record.acknowledgement_number = tcp.acknowledgment_number;
            record.window_size = tcp.window_size;
        }
        Some(TransportHeader::Udp(udp)) => {
            record.src_port = udp.source_port;
            record.dst_port = udp.destination_port;
        }
        Some(TransportHeader::Icmpv4(icmp)) => {
            let icmp_bytes = icmp.to_bytes();
            record.icmp_type = icmp_bytes[0];
            record.icmp_code = icmp_bytes[1];
        }
        _ => {}
    }

    // DNS -- UDP 53번 포트의 페이로드만 해석
    if matches!(&headers.transport, Some(TransportHeader::Udp(_)))
        && (record.src_port == DNS_PORT || record.dst_port == DNS_PORT)
        && let Some(summary) = dns::parse(headers.payload.slice())
    {
        record.dns_id = summary.id;
        record.dns_opcode = summary.opcode;
        record.dns_query = summary.queries;
    }

    // 응용 페이로드 -- 전송 계층 위의 바이트만, 상한으로 잘라 기록
    if headers.transport.is_some() {
        let payload = headers.payload.slice();
        if !payload.is_empty() {
            record.payload = payload.to_vec();
            record.payload_size = record.payload.len();
            record.enforce_payload_limit();
        }
    }

    record
}

/// MAC 주소를 콜론 구분 16진수로 포맷합니다.
fn format_mac(mac: &[u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

/// EtherType 번호를 이름으로 변환합니다.
fn ether_type_name(ether_type: u16) -> String {
    match ether_type {
        0x0800 => "IPv4".to_owned(),
        0x0806 => "ARP".to_owned(),
        0x8100 => "Dot1Q".to_owned(),
        0x86DD => "IPv6".to_owned(),
        0x88A8 => "QinQ".to_owned(),
        other => format!("0x{other:04x}"),
    }
}

/// IP 프로토콜 번호를 이름으로 변환합니다.
fn ip_protocol_name(protocol: u8) -> String {
    match protocol {
        1 => "ICMP".to_owned(),
        2 => "IGMP".to_owned(),
        6 => "TCP".to_owned(),
        17 => "UDP".to_owned(),
        58 => "ICMPv6".to_owned(),
        other => other.to_string(),
    }
}

/// 설정된 TCP 플래그의 글자를 "FSRPAU" 순서로 이어붙입니다.
fn tcp_flag_string(tcp: &TcpHeader) -> String {
    let mut flags = String::new();
    if tcp.fin {
        flags.push('F');
    }
    if tcp.syn {
        flags.push('S');
    }
    if tcp.rst {
        flags.push('R');
    }
    if tcp.psh {
        flags.push('P');
    }
    if tcp.ack {
        flags.push('A');
    }
    if tcp.urg {
        flags.push('U');
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use etherparse::{
        Ethernet2Header, EtherType, IpFragOffset, IpHeaders, IpNumber, Ipv4Dscp, Ipv4Header,
        Ipv6FlowLabel, Ipv6FragmentHeader, Ipv6Header, PacketBuilder, SingleVlanHeader,
        UdpHeader, VlanId, VlanPcp,
    };
    use wiregate_core::MAX_PAYLOAD_BYTES;

    const SRC_MAC: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
    const DST_MAC: [u8; 6] = [0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB];
    const MULTICAST_MAC: [u8; 6] = [0x01, 0x00, 0x5E, 0x00, 0x00, 0xFB];

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn udp_frame(payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
            .ipv4([192, 168, 1, 10], [10, 0, 0, 1], 64)
            .udp(40000, 9999);
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, payload).unwrap();
        frame
    }

    #[test]
    fn dissects_ethernet_and_ipv4_udp() {
        let record = dissect("eth0", now(), &udp_frame(b"hello"));

        assert_eq!(record.device_name, "eth0");
        assert_eq!(record.src_mac, "00:11:22:33:44:55");
        assert_eq!(record.dst_mac, "66:77:88:99:aa:bb");
        assert_eq!(record.ether_type, "IPv4");
        assert!(!record.is_multicast);
        assert_eq!(record.src_ip, "192.168.1.10");
        assert_eq!(record.dst_ip, "10.0.0.1");
        assert_eq!(record.ip_version, "IPv4");
        assert_eq!(record.ttl, 64);
        assert_eq!(record.protocol, "UDP");
        assert_eq!(record.src_port, 40000);
        assert_eq!(record.dst_port, 9999);
        assert_eq!(record.payload, b"hello");
        assert_eq!(record.payload_size, 5);
    }

    #[test]
    fn multicast_bit_is_lowest_bit_of_first_dst_byte() {
        let builder = PacketBuilder::ethernet2(SRC_MAC, MULTICAST_MAC)
            .ipv4([192, 168, 1, 10], [224, 0, 0, 251], 1)
            .udp(5353, 5353);
        let mut frame = Vec::new();
        builder.write(&mut frame, b"").unwrap();

        let record = dissect("eth0", now(), &frame);
        assert!(record.is_multicast);
        assert_eq!(MULTICAST_MAC[0] & 1, 1);
    }

    #[test]
    fn dissects_tcp_flags_in_fixed_order() {
        let builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
            .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .tcp(443, 55000, 12345, 8192)
            .syn()
            .ack(777);
        let mut frame = Vec::new();
        builder.write(&mut frame, &[]).unwrap();

        let record = dissect("eth0", now(), &frame);
        assert_eq!(record.protocol, "TCP");
        assert_eq!(record.src_port, 443);
        assert_eq!(record.dst_port, 55000);
        assert_eq!(record.tcp_flags, "SA");
        assert_eq!(record.sequence_number, 12345);
        assert_eq!(record.acknowledgement_number, 777);
        assert_eq!(record.window_size, 8192);
    }

    #[test]
    fn tcp_flag_string_is_subsequence_of_fsrpau() {
        let mut tcp = TcpHeader::new(1, 2, 0, 1024);
        tcp.fin = true;
        tcp.syn = true;
        tcp.rst = true;
        tcp.psh = true;
        tcp.ack = true;
        tcp.urg = true;
        assert_eq!(tcp_flag_string(&tcp), "FSRPAU");

        tcp.syn = false;
        tcp.ack = false;
        assert_eq!(tcp_flag_string(&tcp), "FRPU");

        let empty = TcpHeader::new(1, 2, 0, 1024);
        assert_eq!(tcp_flag_string(&empty), "");
    }

    #[test]
    fn dissects_vlan_tag() {
        let payload = b"vlan";
        let ip = Ipv4Header::new(
            (UdpHeader::LEN + payload.len()) as u16,
            64,
            IpNumber::UDP,
            [10, 0, 0, 1],
            [10, 0, 0, 2],
        )
        .unwrap();
        let udp = UdpHeader::with_ipv4_checksum(4000, 5000, &ip, payload).unwrap();
        let eth = Ethernet2Header {
            source: SRC_MAC,
            destination: DST_MAC,
            ether_type: EtherType::VLAN_TAGGED_FRAME,
        };
        let vlan = SingleVlanHeader {
            pcp: VlanPcp::try_new(0).unwrap(),
            drop_eligible_indicator: false,
            vlan_id: VlanId::try_new(42).unwrap(),
            ether_type: EtherType::IPV4,
        };

        let mut frame = Vec::new();
        eth.write(&mut frame).unwrap();
        vlan.write(&mut frame).unwrap();
        ip.write(&mut frame).unwrap();
        udp.write(&mut frame).unwrap();
        frame.extend_from_slice(payload);

        let record = dissect("eth0", now(), &frame);
        assert_eq!(record.vlan_id, 42);
        assert_eq!(record.ether_type, "Dot1Q");
        assert_eq!(record.src_port, 4000);
        assert_eq!(record.payload, payload);
    }

    #[test]
    fn dscp_comes_from_ipv4_header() {
        let mut ip = Ipv4Header::new(
            UdpHeader::LEN as u16,
            64,
            IpNumber::UDP,
            [10, 0, 0, 1],
            [10, 0, 0, 2],
        )
        .unwrap();
        // TOS 0xB8 == DSCP 46 (EF)
        ip.dscp = Ipv4Dscp::try_new(46).unwrap();

        let builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
            .ip(IpHeaders::Ipv4(ip, Default::default()))
            .udp(1, 2);
        let mut frame = Vec::new();
        builder.write(&mut frame, b"").unwrap();

        let record = dissect("eth0", now(), &frame);
        assert_eq!(record.dscp, 46);
        assert_eq!(record.dscp, 0xB8 >> 2);
    }

    #[test]
    fn dissects_ipv6_and_hop_limit() {
        let builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
            .ipv6(
                [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
                [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
                33,
            )
            .udp(1000, 2000);
        let mut frame = Vec::new();
        builder.write(&mut frame, b"six").unwrap();

        let record = dissect("eth0", now(), &frame);
        assert_eq!(record.ip_version, "IPv6");
        assert_eq!(record.src_ip, "2001:db8::1");
        assert_eq!(record.dst_ip, "2001:db8::2");
        assert_eq!(record.ttl, 33);
        assert_eq!(record.src_port, 1000);
        assert_eq!(record.ether_type, "IPv6");
    }

    #[test]
    fn dissects_ipv6_fragment_header() {
        let inner = b"fragment payload";
        let fragment = Ipv6FragmentHeader {
            next_header: IpNumber::UDP,
            fragment_offset: IpFragOffset::try_new(0).unwrap(),
            more_fragments: true,
            identification: 0x00BE_EF01,
        };
        let ipv6 = Ipv6Header {
            traffic_class: 0,
            flow_label: Ipv6FlowLabel::try_new(0).unwrap(),
            payload_length: (Ipv6FragmentHeader::LEN + inner.len()) as u16,
            next_header: IpNumber(44),
            hop_limit: 64,
            source: [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
            destination: [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
        };
        let eth = Ethernet2Header {
            source: SRC_MAC,
            destination: DST_MAC,
            ether_type: EtherType::IPV6,
        };

        let mut frame = Vec::new();
        eth.write(&mut frame).unwrap();
        ipv6.write(&mut frame).unwrap();
        fragment.write(&mut frame).unwrap();
        frame.extend_from_slice(inner);

        let record = dissect("eth0", now(), &frame);
        assert_eq!(record.ip_version, "IPv6");
        assert_eq!(record.fragment_id, 0x00BE_EF01);
        assert_eq!(record.fragment_offset, 0);
    }

    #[test]
    fn dissects_icmpv4_echo() {
        let builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
            .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .icmpv4_echo_request(7, 1);
        let mut frame = Vec::new();
        builder.write(&mut frame, b"ping").unwrap();

        let record = dissect("eth0", now(), &frame);
        assert_eq!(record.protocol, "ICMP");
        // Echo request는 타입 8, 코드 0
        assert_eq!(record.icmp_type, 8);
        assert_eq!(record.icmp_code, 0);
        // ICMP는 전송 포트가 없지만 페이로드는 기록됨
        assert_eq!(record.src_port, 0);
        assert_eq!(record.dst_port, 0);
        assert_eq!(record.payload, b"ping");
    }

    #[test]
    fn dissects_dns_query_over_udp_53() {
        let mut dns_message = vec![
            0xAB, 0xCD, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        dns_message.extend_from_slice(b"\x07example\x03com\x00");
        dns_message.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);

        let builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
            .ipv4([192, 168, 0, 2], [8, 8, 8, 8], 64)
            .udp(51234, 53);
        let mut frame = Vec::new();
        builder.write(&mut frame, &dns_message).unwrap();

        let record = dissect("eth0", now(), &frame);
        assert_eq!(record.dns_id, 0xABCD);
        assert_eq!(record.dns_opcode, "Query");
        assert_eq!(record.dns_query, vec!["example.com".to_owned()]);
        // DNS 메시지 자체가 페이로드로도 기록됨
        assert_eq!(record.payload, dns_message);
    }

    #[test]
    fn non_dns_udp_payload_leaves_dns_fields_unset() {
        let record = dissect("eth0", now(), &udp_frame(b"not dns"));
        assert_eq!(record.dns_id, 0);
        assert!(record.dns_opcode.is_empty());
        assert!(record.dns_query.is_empty());
    }

    #[test]
    fn oversize_payload_is_truncated_at_dissection() {
        let big = vec![0x42u8; MAX_PAYLOAD_BYTES + 512];
        let record = dissect("eth0", now(), &udp_frame(&big));

        assert_eq!(record.payload.len(), MAX_PAYLOAD_BYTES);
        assert_eq!(record.payload_size, MAX_PAYLOAD_BYTES);
        assert_eq!(record.payload, big[..MAX_PAYLOAD_BYTES]);
    }

    #[test]
    fn garbage_frame_yields_partial_record() {
        let record = dissect("eth9", now(), &[0xDE, 0xAD]);
        assert_eq!(record.device_name, "eth9");
        assert!(record.src_mac.is_empty());
        assert!(record.src_ip.is_empty());
        assert_eq!(record.payload_size, 0);
    }

    #[test]
    fn empty_payload_is_elided() {
        let record = dissect("eth0", now(), &udp_frame(b""));
        assert!(record.payload.is_empty());
        assert_eq!(record.payload_size, 0);
    }

    #[test]
    fn protocol_and_ether_type_names() {
        assert_eq!(ip_protocol_name(6), "TCP");
        assert_eq!(ip_protocol_name(17), "UDP");
        assert_eq!(ip_protocol_name(1), "ICMP");
        assert_eq!(ip_protocol_name(132), "132");
        assert_eq!(ether_type_name(0x0806), "ARP");
        assert_eq!(ether_type_name(0x1234), "0x1234");
    }
}
