use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::packet::PacketRecord;

/// Keeps records whose source or destination port is in the set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortFilter {
    ports: BTreeSet<u16>,
}

impl PortFilter {
    pub fn new(ports: impl IntoIterator<Item = u16>) -> Self {
        Self {
            ports: ports.into_iter().collect(),
        }
    }

    pub fn check_ports(&self, src_port: u16, dst_port: u16) -> bool {
        self.ports.contains(&src_port) || self.ports.contains(&dst_port)
    }

    pub fn matches(&self, record: &PacketRecord) -> bool {
        self.check_ports(record.src_port(), record.dst_port())
    }

    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.ports.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

impl FromIterator<u16> for PortFilter {
    fn from_iter<T: IntoIterator<Item = u16>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Parses a comma-separated port list such as `"80, 443"`
impl FromStr for PortFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry
                    .parse::<u16>()
                    .map_err(|e| Error::invalid(format!("invalid port number {:?}: {}", entry, e)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(src_port: u16, dst_port: u16) -> PacketRecord {
        PacketRecord::parse("10.0.0.1", "10.0.0.2", src_port, dst_port).unwrap()
    }

    #[test]
    fn test_empty_filter_matches_nothing() {
        let filter = PortFilter::default();
        assert!(filter.is_empty());
        assert!(!filter.matches(&record(80, 80)));
        assert!(!filter.check_ports(0, 65535));
    }

    #[test]
    fn test_matches_either_port() {
        let filter = PortFilter::new([80]);
        assert!(filter.matches(&record(12345, 80)));
        assert!(filter.matches(&record(80, 12345)));
        assert!(!filter.matches(&record(12345, 443)));
    }

    #[test]
    fn test_parse_port_list() {
        let filter: PortFilter = " 443,80 ,8080,".parse().unwrap();
        assert_eq!(filter.ports().collect::<Vec<_>>(), vec![80, 443, 8080]);

        let empty: PortFilter = "".parse().unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        assert!(matches!("80,http".parse::<PortFilter>(), Err(Error::InvalidArgument(_))));
        assert!(matches!("70000".parse::<PortFilter>(), Err(Error::InvalidArgument(_))));
    }
}
