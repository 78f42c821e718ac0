use pcap::{Capture, Error as PcapError, Offline};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::decode::{DecodedFrame, LinkLayer};
use crate::error::{Error, Result};
use crate::packet::DecodedPacket;

/// Totals gathered in one pass over a capture
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureSummary {
    pub total_packets: u64,
    pub network_packets: u64,
    pub qualifying_packets: u64,
    pub ports: BTreeSet<u16>,
    pub duration_seconds: f64,
    first_timestamp: Option<f64>,
}

impl CaptureSummary {
    pub fn from_frames<I>(frames: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<DecodedFrame>>,
    {
        let mut summary = CaptureSummary::default();
        for frame in frames {
            summary.record(&frame?);
        }
        Ok(summary)
    }

    /// Fold one more frame into the totals
    pub fn record(&mut self, frame: &DecodedFrame) {
        self.total_packets += 1;

        let first = *self.first_timestamp.get_or_insert(frame.timestamp);
        self.duration_seconds = (frame.timestamp - first).max(0.0);

        if frame.network_header().is_some() {
            self.network_packets += 1;
            if let Some(stream) = frame.stream_header() {
                self.qualifying_packets += 1;
                self.ports.insert(stream.source_port);
                self.ports.insert(stream.destination_port);
            }
        }

        if self.total_packets % 1_000_000 == 0 {
            info!(
                "Analyzed {} packets so far ({} TCP/IP packets)...",
                self.total_packets, self.qualifying_packets
            );
        }
    }
}

/// Pull-based packet source over a capture file read with libpcap
pub struct PcapSource {
    capture: Capture<Offline>,
    link: LinkLayer,
    path: PathBuf,
    sequence: u64,
    finished: bool,
    summary: CaptureSummary,
}

impl PcapSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Opening PCAP file with libpcap: {}", path.display());

        let capture = Capture::from_file(path).map_err(|source| Error::ResourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;

        let link = LinkLayer::from_dlt(capture.get_datalink().0);
        if let LinkLayer::Unsupported(dlt) = link {
            warn!(
                "Unsupported link type {} in {}; no packet will yield a record",
                dlt,
                path.display()
            );
        }
        debug!("PCAP file opened, link layer {:?}", link);

        Ok(Self {
            capture,
            link,
            path: path.to_path_buf(),
            sequence: 0,
            finished: false,
            summary: CaptureSummary::default(),
        })
    }

    /// Scan a capture file once and summarize it
    pub fn summarize(path: impl AsRef<Path>) -> Result<CaptureSummary> {
        let mut source = Self::open(path)?;
        info!("Analyzing PCAP file: {}", source.path.display());

        let start_time = std::time::Instant::now();
        while source.next_frame()?.is_some() {}
        info!(
            "PCAP analysis completed in {:.2} seconds",
            start_time.elapsed().as_secs_f64()
        );

        Ok(source.into_summary())
    }

    /// Totals over the frames read so far
    pub fn summary(&self) -> &CaptureSummary {
        &self.summary
    }

    pub fn into_summary(self) -> CaptureSummary {
        self.summary
    }

    pub fn link_layer(&self) -> LinkLayer {
        self.link
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Packets read so far
    pub fn packets_read(&self) -> u64 {
        self.sequence
    }

    pub fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
        if self.finished {
            return Ok(None);
        }

        match self.capture.next_packet() {
            Ok(packet) => {
                self.sequence += 1;
                let timestamp =
                    packet.header.ts.tv_sec as f64 + packet.header.ts.tv_usec as f64 / 1_000_000.0;
                let frame = DecodedFrame::decode(self.link, timestamp, packet.data);
                self.summary.record(&frame);
                Ok(Some(frame))
            }
            Err(PcapError::NoMorePackets) => {
                self.finished = true;
                debug!("Reached end of {} after {} packets", self.path.display(), self.sequence);
                Ok(None)
            }
            Err(source) => {
                self.finished = true;
                warn!("Error reading packet #{}: {}", self.sequence + 1, source);
                Err(Error::ResourceUnavailable {
                    path: self.path.clone(),
                    source,
                })
            }
        }
    }
}

impl Iterator for PcapSource {
    type Item = Result<DecodedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}
