use tracing::{debug, trace};

use crate::error::Result;
use crate::filter::PortFilter;
use crate::packet::{DecodedPacket, PacketRecord};

/// Lazily turns a packet source into records, skipping packets without
/// both a network and a stream header.
///
/// Stops after yielding the first source error.
pub struct RecordExtractor<I> {
    source: I,
    pulled: u64,
    skipped: u64,
    failed: bool,
}

impl<I: Iterator> RecordExtractor<I> {
    pub fn new<S>(source: S) -> Self
    where
        S: IntoIterator<IntoIter = I>,
    {
        Self {
            source: source.into_iter(),
            pulled: 0,
            skipped: 0,
            failed: false,
        }
    }

    /// Packets read from the source so far
    pub fn pulled(&self) -> u64 {
        self.pulled
    }

    /// Packets read but not turned into records
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<I, P> Iterator for RecordExtractor<I>
where
    I: Iterator<Item = Result<P>>,
    P: DecodedPacket,
{
    type Item = Result<PacketRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let packet = match self.source.next()? {
                Ok(packet) => packet,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            self.pulled += 1;

            match PacketRecord::from_packet(&packet) {
                Some(record) => return Some(Ok(record)),
                None => {
                    self.skipped += 1;
                    trace!("Skipping packet #{}: missing network or stream header", self.pulled);
                }
            }
        }
    }
}

/// Extract one record per qualifying packet, in input order.
///
/// A source error fails the whole call.
pub fn extract_packet_records<S, P>(source: S) -> Result<Vec<PacketRecord>>
where
    S: IntoIterator<Item = Result<P>>,
    P: DecodedPacket,
{
    let mut extractor = RecordExtractor::new(source);
    let records = extractor.by_ref().collect::<Result<Vec<_>>>()?;

    debug!(
        "Extracted {} records from {} packets ({} skipped)",
        records.len(),
        extractor.pulled(),
        extractor.skipped()
    );

    Ok(records)
}

/// Same as [`extract_packet_records`] but keeps only records matching `filter`
pub fn extract_filtered_records<S, P>(source: S, filter: &PortFilter) -> Result<Vec<PacketRecord>>
where
    S: IntoIterator<Item = Result<P>>,
    P: DecodedPacket,
{
    let mut extractor = RecordExtractor::new(source);
    let records = extractor
        .by_ref()
        .filter(|record| record.as_ref().map_or(true, |record| filter.matches(record)))
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "Kept {} filtered records from {} packets ({} skipped)",
        records.len(),
        extractor.pulled(),
        extractor.skipped()
    );

    Ok(records)
}
