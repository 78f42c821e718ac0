use pnet::packet::Packet;
use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::vlan::VlanPacket;
use std::net::IpAddr;

use crate::packet::{DecodedPacket, NetworkHeader, StreamHeader};

/// Data-link header type of a capture, from its DLT/LINKTYPE value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet,
    /// Raw IP, version taken from the first nibble
    RawIp,
    Ipv4,
    Ipv6,
    Unsupported(i32),
}

impl LinkLayer {
    pub fn from_dlt(dlt: i32) -> Self {
        match dlt {
            1 => LinkLayer::Ethernet,
            12 | 14 | 101 => LinkLayer::RawIp,
            228 => LinkLayer::Ipv4,
            229 => LinkLayer::Ipv6,
            other => LinkLayer::Unsupported(other),
        }
    }
}

type Layers = (Option<NetworkHeader>, Option<StreamHeader>);

const NO_LAYERS: Layers = (None, None);

/// 802.1Q plus one outer QinQ tag
const MAX_VLAN_TAGS: usize = 2;

/// One captured frame with whatever headers could be decoded from it
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub timestamp: f64,
    pub captured_len: usize,
    network: Option<NetworkHeader>,
    stream: Option<StreamHeader>,
}

impl DecodedFrame {
    pub fn decode(link: LinkLayer, timestamp: f64, data: &[u8]) -> Self {
        let (network, stream) = match link {
            LinkLayer::Ethernet => decode_ethernet(data),
            LinkLayer::RawIp => decode_raw_ip(data),
            LinkLayer::Ipv4 => decode_ipv4(data),
            LinkLayer::Ipv6 => decode_ipv6(data),
            LinkLayer::Unsupported(_) => NO_LAYERS,
        };

        Self {
            timestamp,
            captured_len: data.len(),
            network,
            stream,
        }
    }
}

impl DecodedPacket for DecodedFrame {
    fn network_header(&self) -> Option<NetworkHeader> {
        self.network
    }

    fn stream_header(&self) -> Option<StreamHeader> {
        self.stream
    }
}

fn decode_ethernet(data: &[u8]) -> Layers {
    match EthernetPacket::new(data) {
        Some(ethernet) => decode_ethertype(ethernet.get_ethertype(), ethernet.payload()),
        None => NO_LAYERS,
    }
}

fn decode_ethertype(ethertype: EtherType, payload: &[u8]) -> Layers {
    let mut ethertype = ethertype;
    let mut payload = payload;
    let mut tags = 0;

    loop {
        match ethertype {
            EtherTypes::Ipv4 => return decode_ipv4(payload),
            EtherTypes::Ipv6 => return decode_ipv6(payload),
            EtherTypes::Vlan | EtherTypes::QinQ | EtherTypes::PBridge => {
                if tags == MAX_VLAN_TAGS {
                    return NO_LAYERS;
                }
                let vlan = match VlanPacket::new(payload) {
                    Some(vlan) => vlan,
                    None => return NO_LAYERS,
                };
                ethertype = vlan.get_ethertype();
                payload = &payload[VlanPacket::minimum_packet_size()..];
                tags += 1;
            }
            _ => return NO_LAYERS,
        }
    }
}

fn decode_raw_ip(data: &[u8]) -> Layers {
    match data.first().map(|byte| byte >> 4) {
        Some(4) => decode_ipv4(data),
        Some(6) => decode_ipv6(data),
        _ => NO_LAYERS,
    }
}

fn decode_ipv4(data: &[u8]) -> Layers {
    let ipv4 = match Ipv4Packet::new(data) {
        Some(ip) => ip,
        None => return NO_LAYERS,
    };
    if ipv4.get_version() != 4 || ipv4.get_header_length() < 5 {
        return NO_LAYERS;
    }

    let network = NetworkHeader {
        source: IpAddr::V4(ipv4.get_source()),
        destination: IpAddr::V4(ipv4.get_destination()),
    };

    // Only the first fragment carries the TCP header
    if ipv4.get_next_level_protocol() != IpNextHeaderProtocols::Tcp
        || ipv4.get_fragment_offset() != 0
    {
        return (Some(network), None);
    }

    (Some(network), decode_tcp(ipv4.payload()))
}

fn decode_ipv6(data: &[u8]) -> Layers {
    let ipv6 = match Ipv6Packet::new(data) {
        Some(ip) => ip,
        None => return NO_LAYERS,
    };
    if ipv6.get_version() != 6 {
        return NO_LAYERS;
    }

    let network = NetworkHeader {
        source: IpAddr::V6(ipv6.get_source()),
        destination: IpAddr::V6(ipv6.get_destination()),
    };

    if ipv6.get_next_header() != IpNextHeaderProtocols::Tcp {
        return (Some(network), None);
    }

    (Some(network), decode_tcp(ipv6.payload()))
}

fn decode_tcp(data: &[u8]) -> Option<StreamHeader> {
    TcpPacket::new(data).map(|tcp| StreamHeader {
        source_port: tcp.get_source(),
        destination_port: tcp.get_destination(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn ipv4_header(protocol: u8, fragment: u16, payload_len: usize) -> Vec<u8> {
        let total = (20 + payload_len) as u16;
        let mut header = vec![0x45, 0x00];
        header.extend_from_slice(&total.to_be_bytes());
        header.extend_from_slice(&[0x00, 0x00]);
        header.extend_from_slice(&fragment.to_be_bytes());
        header.extend_from_slice(&[0x40, protocol, 0x00, 0x00]);
        header.extend_from_slice(&[192, 168, 1, 1]);
        header.extend_from_slice(&[192, 168, 1, 100]);
        header
    }

    fn tcp_header(src_port: u16, dst_port: u16) -> Vec<u8> {
        let mut header = Vec::new();
        header.extend_from_slice(&src_port.to_be_bytes());
        header.extend_from_slice(&dst_port.to_be_bytes());
        header.extend_from_slice(&[0; 8]);
        header.extend_from_slice(&[0x50, 0x18, 0xFF, 0xFF, 0, 0, 0, 0]);
        header
    }

    fn ethernet(ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x00, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE,
        ];
        frame.extend_from_slice(&ethertype.to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    fn ipv4_tcp(src_port: u16, dst_port: u16) -> Vec<u8> {
        let tcp = tcp_header(src_port, dst_port);
        [ipv4_header(6, 0x4000, tcp.len()), tcp].concat()
    }

    #[test]
    fn test_ethernet_ipv4_tcp() {
        let data = ethernet(0x0800, &ipv4_tcp(12345, 80));
        let frame = DecodedFrame::decode(LinkLayer::Ethernet, 1.5, &data);

        let network = frame.network_header().unwrap();
        assert_eq!(network.source, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(network.destination, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 100)));
        assert_eq!(
            frame.stream_header(),
            Some(StreamHeader {
                source_port: 12345,
                destination_port: 80
            })
        );
        assert_eq!(frame.timestamp, 1.5);
        assert_eq!(frame.captured_len, 14 + 40);
    }

    #[test]
    fn test_vlan_tagged_frame() {
        let mut tagged = vec![0x00, 0x64, 0x08, 0x00];
        tagged.extend_from_slice(&ipv4_tcp(5000, 443));
        let frame = DecodedFrame::decode(LinkLayer::Ethernet, 0.0, &ethernet(0x8100, &tagged));

        assert!(frame.network_header().is_some());
        assert_eq!(frame.stream_header().map(|s| s.destination_port), Some(443));
    }

    #[test]
    fn test_double_tagged_frame() {
        let mut tagged = vec![0x00, 0x0A, 0x81, 0x00, 0x00, 0x64, 0x08, 0x00];
        tagged.extend_from_slice(&ipv4_tcp(5000, 443));
        let frame = DecodedFrame::decode(LinkLayer::Ethernet, 0.0, &ethernet(0x88A8, &tagged));

        assert_eq!(frame.stream_header().map(|s| s.destination_port), Some(443));
    }

    #[test]
    fn test_too_many_vlan_tags() {
        let mut tagged = [0x00, 0x64, 0x81, 0x00].repeat(60_000);
        tagged.extend_from_slice(&[0x00, 0x64, 0x08, 0x00]);
        tagged.extend_from_slice(&ipv4_tcp(5000, 443));
        let frame = DecodedFrame::decode(LinkLayer::Ethernet, 0.0, &ethernet(0x8100, &tagged));

        assert!(frame.network_header().is_none());
        assert!(frame.stream_header().is_none());

        let three_tags = [[0x00, 0x64, 0x81, 0x00].repeat(2), tagged[240_000..].to_vec()].concat();
        let frame = DecodedFrame::decode(LinkLayer::Ethernet, 0.0, &ethernet(0x8100, &three_tags));
        assert!(frame.network_header().is_none());
    }

    #[test]
    fn test_udp_has_network_only() {
        let udp = [0x30, 0x39, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00];
        let packet = [ipv4_header(17, 0, udp.len()), udp.to_vec()].concat();
        let frame = DecodedFrame::decode(LinkLayer::Ethernet, 0.0, &ethernet(0x0800, &packet));

        assert!(frame.network_header().is_some());
        assert!(frame.stream_header().is_none());
    }

    #[test]
    fn test_arp_has_no_headers() {
        let frame = DecodedFrame::decode(LinkLayer::Ethernet, 0.0, &ethernet(0x0806, &[0; 28]));
        assert!(frame.network_header().is_none());
        assert!(frame.stream_header().is_none());
    }

    #[test]
    fn test_truncated_tcp() {
        let packet = [ipv4_header(6, 0, 20), vec![0x30, 0x39, 0x00]].concat();
        let frame = DecodedFrame::decode(LinkLayer::Ethernet, 0.0, &ethernet(0x0800, &packet));

        assert!(frame.network_header().is_some());
        assert!(frame.stream_header().is_none());
    }

    #[test]
    fn test_truncated_ethernet() {
        let frame = DecodedFrame::decode(LinkLayer::Ethernet, 0.0, &[0x00, 0x11, 0x22]);
        assert!(frame.network_header().is_none());
    }

    #[test]
    fn test_non_initial_fragment() {
        let tcp = tcp_header(1, 2);
        let packet = [ipv4_header(6, 0x0010, tcp.len()), tcp].concat();
        let frame = DecodedFrame::decode(LinkLayer::RawIp, 0.0, &packet);

        assert!(frame.network_header().is_some());
        assert!(frame.stream_header().is_none());
    }

    #[test]
    fn test_raw_ipv6_tcp() {
        let tcp = tcp_header(40000, 22);
        let mut packet = vec![0x60, 0, 0, 0];
        packet.extend_from_slice(&(tcp.len() as u16).to_be_bytes());
        packet.extend_from_slice(&[6, 64]);
        packet.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        packet.extend_from_slice(&Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1).octets());
        packet.extend_from_slice(&tcp);

        let frame = DecodedFrame::decode(LinkLayer::RawIp, 0.0, &packet);
        assert_eq!(
            frame.network_header().map(|n| n.source),
            Some(IpAddr::V6(Ipv6Addr::LOCALHOST))
        );
        assert_eq!(frame.stream_header().map(|s| s.destination_port), Some(22));
    }

    #[test]
    fn test_link_layer_mapping() {
        assert_eq!(LinkLayer::from_dlt(1), LinkLayer::Ethernet);
        assert_eq!(LinkLayer::from_dlt(101), LinkLayer::RawIp);
        assert_eq!(LinkLayer::from_dlt(229), LinkLayer::Ipv6);
        assert_eq!(LinkLayer::from_dlt(113), LinkLayer::Unsupported(113));

        let frame = DecodedFrame::decode(LinkLayer::Unsupported(113), 0.0, &ipv4_tcp(1, 2));
        assert!(frame.network_header().is_none());
    }
}
