use byteorder::{BigEndian, WriteBytesExt};
use pcap_file::PcapError;
use pcap_file::pcap::{PcapPacket, PcapWriter};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_ARP: u16 = 0x0806;
const PROTOCOL_TCP: u8 = 6;
const PROTOCOL_UDP: u8 = 17;
const IPV4_HEADER_LEN: u16 = 20;
const TCP_HEADER_LEN: u16 = 20;
const UDP_HEADER_LEN: u16 = 8;

#[derive(Debug, Clone)]
enum SyntheticFrame {
    Tcp {
        src_ip: Ipv4Addr,
        dest_ip: Ipv4Addr,
        src_port: u16,
        dest_port: u16,
        payload: Vec<u8>,
    },
    Udp {
        src_ip: Ipv4Addr,
        dest_ip: Ipv4Addr,
        src_port: u16,
        dest_port: u16,
        payload: Vec<u8>,
    },
    Arp,
}

impl SyntheticFrame {
    fn check_length(&self) -> Result<()> {
        let (transport_len, payload) = match self {
            SyntheticFrame::Tcp { payload, .. } => (TCP_HEADER_LEN, payload),
            SyntheticFrame::Udp { payload, .. } => (UDP_HEADER_LEN, payload),
            SyntheticFrame::Arp => return Ok(()),
        };

        match ip_total_len(transport_len, payload) {
            Some(_) => Ok(()),
            None => Err(Error::invalid(format!(
                "payload of {} bytes does not fit in an IPv4 datagram",
                payload.len()
            ))),
        }
    }
}

/// IPv4 total length, or `None` past the 65535-byte limit
fn ip_total_len(transport_len: u16, payload: &[u8]) -> Option<u16> {
    let payload_len = u16::try_from(payload.len()).ok()?;
    (IPV4_HEADER_LEN + transport_len).checked_add(payload_len)
}

fn oversized(payload: &[u8]) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("payload of {} bytes does not fit in an IPv4 datagram", payload.len()),
    )
}

/// In-memory list of Ethernet frames written out as a classic pcap file
#[derive(Debug, Clone)]
pub struct SyntheticCapture {
    frames: Vec<SyntheticFrame>,
    start: Duration,
    spacing: Duration,
}

impl Default for SyntheticCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticCapture {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            start: Duration::from_secs(1_700_000_000),
            spacing: Duration::from_millis(1),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn push_tcp(
        &mut self,
        src_ip: Ipv4Addr,
        dest_ip: Ipv4Addr,
        src_port: u16,
        dest_port: u16,
        payload: &[u8],
    ) -> &mut Self {
        self.frames.push(SyntheticFrame::Tcp {
            src_ip,
            dest_ip,
            src_port,
            dest_port,
            payload: payload.to_vec(),
        });
        self
    }

    pub fn push_udp(
        &mut self,
        src_ip: Ipv4Addr,
        dest_ip: Ipv4Addr,
        src_port: u16,
        dest_port: u16,
        payload: &[u8],
    ) -> &mut Self {
        self.frames.push(SyntheticFrame::Udp {
            src_ip,
            dest_ip,
            src_port,
            dest_port,
            payload: payload.to_vec(),
        });
        self
    }

    /// A frame with no network-layer header
    pub fn push_arp(&mut self) -> &mut Self {
        self.frames.push(SyntheticFrame::Arp);
        self
    }

    /// Write every frame to `path`, returning the number of packets written
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let write_error = |source: PcapError| Error::Write {
            path: path.to_path_buf(),
            source,
        };

        for frame in &self.frames {
            frame.check_length()?;
        }

        info!("Writing {} synthetic packets to {}", self.frames.len(), path.display());

        let file = File::create(path).map_err(|e| write_error(PcapError::IoError(e)))?;
        let mut pcap_writer = PcapWriter::new(BufWriter::new(file)).map_err(write_error)?;

        let mut timestamp = self.start;
        for frame in &self.frames {
            let packet = encode_frame(frame).map_err(|e| write_error(PcapError::IoError(e)))?;
            let pcap_packet = PcapPacket::new(timestamp, packet.len() as u32, &packet);
            pcap_writer.write_packet(&pcap_packet).map_err(write_error)?;
            timestamp += self.spacing;
        }

        pcap_writer
            .into_writer()
            .flush()
            .map_err(|e| write_error(PcapError::IoError(e)))?;

        debug!("PCAP file written to: {}", path.display());
        Ok(self.frames.len())
    }
}

fn encode_frame(frame: &SyntheticFrame) -> io::Result<Vec<u8>> {
    match frame {
        SyntheticFrame::Tcp {
            src_ip,
            dest_ip,
            src_port,
            dest_port,
            payload,
        } => {
            let total_len =
                ip_total_len(TCP_HEADER_LEN, payload).ok_or_else(|| oversized(payload))?;
            let tcp = create_tcp_header(*src_port, *dest_port)?;
            let ip = create_ip_header(*src_ip, *dest_ip, PROTOCOL_TCP, total_len)?;
            let ethernet = create_ethernet_header(ETHERTYPE_IPV4)?;
            Ok([ethernet, ip, tcp, payload.clone()].concat())
        }
        SyntheticFrame::Udp {
            src_ip,
            dest_ip,
            src_port,
            dest_port,
            payload,
        } => {
            let total_len =
                ip_total_len(UDP_HEADER_LEN, payload).ok_or_else(|| oversized(payload))?;
            let udp = create_udp_header(*src_port, *dest_port, total_len - IPV4_HEADER_LEN)?;
            let ip = create_ip_header(*src_ip, *dest_ip, PROTOCOL_UDP, total_len)?;
            let ethernet = create_ethernet_header(ETHERTYPE_IPV4)?;
            Ok([ethernet, ip, udp, payload.clone()].concat())
        }
        SyntheticFrame::Arp => {
            Ok([create_ethernet_header(ETHERTYPE_ARP)?, create_arp_request()?].concat())
        }
    }
}

fn create_ethernet_header(ethertype: u16) -> io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(14);

    header.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    header.extend_from_slice(&[0x00, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
    header.write_u16::<BigEndian>(ethertype)?;

    Ok(header)
}

fn create_ip_header(
    src_ip: Ipv4Addr,
    dest_ip: Ipv4Addr,
    protocol: u8,
    total_len: u16,
) -> io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(IPV4_HEADER_LEN as usize);

    header.push(0x45);
    header.push(0x00);
    header.write_u16::<BigEndian>(total_len)?;
    header.write_u16::<BigEndian>(0x0000)?;
    header.write_u16::<BigEndian>(0x4000)?;
    header.push(0x40);
    header.push(protocol);
    header.write_u16::<BigEndian>(0x0000)?;
    header.extend_from_slice(&src_ip.octets());
    header.extend_from_slice(&dest_ip.octets());

    let checksum = calculate_ip_checksum(&header);
    header[10] = (checksum >> 8) as u8;
    header[11] = (checksum & 0xFF) as u8;

    Ok(header)
}

fn create_tcp_header(src_port: u16, dest_port: u16) -> io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(TCP_HEADER_LEN as usize);

    header.write_u16::<BigEndian>(src_port)?;
    header.write_u16::<BigEndian>(dest_port)?;
    header.write_u32::<BigEndian>(1)?;
    header.write_u32::<BigEndian>(0)?;
    // Data offset 5 words, PSH|ACK
    header.push(0x50);
    header.push(0x18);
    header.write_u16::<BigEndian>(0xFFFF)?;
    header.write_u16::<BigEndian>(0x0000)?;
    header.write_u16::<BigEndian>(0x0000)?;

    Ok(header)
}

fn create_udp_header(src_port: u16, dest_port: u16, udp_len: u16) -> io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(UDP_HEADER_LEN as usize);

    header.write_u16::<BigEndian>(src_port)?;
    header.write_u16::<BigEndian>(dest_port)?;
    header.write_u16::<BigEndian>(udp_len)?;
    header.write_u16::<BigEndian>(0x0000)?;

    Ok(header)
}

fn create_arp_request() -> io::Result<Vec<u8>> {
    let mut body = Vec::with_capacity(28);

    body.write_u16::<BigEndian>(1)?;
    body.write_u16::<BigEndian>(ETHERTYPE_IPV4)?;
    body.push(6);
    body.push(4);
    body.write_u16::<BigEndian>(1)?;
    body.extend_from_slice(&[0x00, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
    body.extend_from_slice(&[192, 168, 1, 1]);
    body.extend_from_slice(&[0; 6]);
    body.extend_from_slice(&[192, 168, 1, 100]);

    Ok(body)
}

fn calculate_ip_checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    for chunk in header.chunks(2) {
        if chunk.len() == 2 {
            sum += ((chunk[0] as u32) << 8) + (chunk[1] as u32);
        } else if chunk.len() == 1 {
            sum += (chunk[0] as u32) << 8;
        }
    }

    while (sum >> 16) > 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}
