//! Leibniz-series estimation of pi and TCP/IP record extraction from packet
//! captures.

pub mod decode;
pub mod error;
pub mod extract;
pub mod filter;
pub mod packet;
pub mod pcap_reader;
pub mod pcap_writer;
pub mod series;

pub use decode::{DecodedFrame, LinkLayer};
pub use error::{Error, Result};
pub use extract::{RecordExtractor, extract_filtered_records, extract_packet_records};
pub use filter::PortFilter;
pub use packet::{DecodedPacket, NetworkHeader, PacketRecord, StreamHeader};
pub use pcap_reader::{CaptureSummary, PcapSource};
pub use pcap_writer::SyntheticCapture;
pub use series::{ChunkedEstimator, Estimator, PI_TARGET, SequentialEstimator, estimate_series};
