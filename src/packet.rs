use std::fmt;
use std::net::IpAddr;

use crate::error::{Error, Result};

/// Addresses taken from a network-layer (IPv4/IPv6) header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkHeader {
    pub source: IpAddr,
    pub destination: IpAddr,
}

/// Ports taken from a stream transport (TCP) header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHeader {
    pub source_port: u16,
    pub destination_port: u16,
}

/// Anything a packet source produces that records can be extracted from
pub trait DecodedPacket {
    fn network_header(&self) -> Option<NetworkHeader>;
    fn stream_header(&self) -> Option<StreamHeader>;
}

/// Address and port summary of one TCP/IP packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketRecord {
    src_ip: IpAddr,
    dst_ip: IpAddr,
    src_port: u16,
    dst_port: u16,
}

impl PacketRecord {
    pub fn new(network: NetworkHeader, stream: StreamHeader) -> Self {
        Self {
            src_ip: network.source,
            dst_ip: network.destination,
            src_port: stream.source_port,
            dst_port: stream.destination_port,
        }
    }

    /// Build a record from textual addresses
    pub fn parse(src_ip: &str, dst_ip: &str, src_port: u16, dst_port: u16) -> Result<Self> {
        let parse_addr = |addr: &str| {
            addr.parse::<IpAddr>()
                .map_err(|e| Error::invalid(format!("invalid address {:?}: {}", addr, e)))
        };

        Ok(Self {
            src_ip: parse_addr(src_ip)?,
            dst_ip: parse_addr(dst_ip)?,
            src_port,
            dst_port,
        })
    }

    /// Returns `None` unless the packet has both a network and a stream header
    pub fn from_packet<P: DecodedPacket + ?Sized>(packet: &P) -> Option<Self> {
        let network = packet.network_header()?;
        let stream = packet.stream_header()?;
        Some(Self::new(network, stream))
    }

    pub fn src_ip(&self) -> IpAddr {
        self.src_ip
    }

    pub fn dst_ip(&self) -> IpAddr {
        self.dst_ip
    }

    pub fn src_port(&self) -> u16 {
        self.src_port
    }

    pub fn dst_port(&self) -> u16 {
        self.dst_port
    }
}

impl fmt::Display for PacketRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<PacketRecord src_ip={} dst_ip={} src_port={} dst_port={}>",
            self.src_ip, self.dst_ip, self.src_port, self.dst_port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    struct Headers(Option<NetworkHeader>, Option<StreamHeader>);

    impl DecodedPacket for Headers {
        fn network_header(&self) -> Option<NetworkHeader> {
            self.0
        }

        fn stream_header(&self) -> Option<StreamHeader> {
            self.1
        }
    }

    fn network() -> NetworkHeader {
        NetworkHeader {
            source: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            destination: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
        }
    }

    fn stream() -> StreamHeader {
        StreamHeader {
            source_port: 12345,
            destination_port: 80,
        }
    }

    #[test]
    fn test_from_packet_requires_both_headers() {
        assert!(PacketRecord::from_packet(&Headers(Some(network()), Some(stream()))).is_some());
        assert!(PacketRecord::from_packet(&Headers(Some(network()), None)).is_none());
        assert!(PacketRecord::from_packet(&Headers(None, Some(stream()))).is_none());
        assert!(PacketRecord::from_packet(&Headers(None, None)).is_none());
    }

    #[test]
    fn test_parse_and_display() {
        let record = PacketRecord::parse("10.0.0.1", "10.0.0.2", 12345, 80).unwrap();
        assert_eq!(record, PacketRecord::new(network(), stream()));
        assert_eq!(
            record.to_string(),
            "<PacketRecord src_ip=10.0.0.1 dst_ip=10.0.0.2 src_port=12345 dst_port=80>"
        );

        let v6 = PacketRecord::parse("::1", "fe80::1", 1, 2).unwrap();
        assert!(v6.src_ip().is_ipv6());
    }

    #[test]
    fn test_parse_rejects_bad_address() {
        let result = PacketRecord::parse("10.0.0.300", "10.0.0.2", 1, 2);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
