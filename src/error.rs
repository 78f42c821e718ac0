use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("capture {} is unavailable: {source}", .path.display())]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: pcap::Error,
    },

    #[error("failed to write capture {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: pcap_file::PcapError,
    },

    #[error("estimation worker panicked")]
    WorkerPanicked,
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }
}
