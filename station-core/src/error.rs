use std::io;

use thiserror::Error;

/// Why a fetch produced no data. A stale response is not an error.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to connect to {host}: {source}")]
    Connect {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out waiting for a response from {host}")]
    Timeout { host: String },

    #[error("unexpected EOF reading response from {host}")]
    UnexpectedEof { host: String },

    #[error("I/O error talking to {host}: {source}")]
    Io {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {what}: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("insufficient memory: {available} bytes available, {needed} needed")]
    MemoryPressure { available: usize, needed: usize },
}

/// The statistics bucket a failure is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Connect,
    Parse,
    Memory,
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Connect { .. }
            | FetchError::Timeout { .. }
            | FetchError::UnexpectedEof { .. }
            | FetchError::Io { .. } => FailureKind::Connect,
            FetchError::Parse { .. } => FailureKind::Parse,
            FetchError::MemoryPressure { .. } => FailureKind::Memory,
        }
    }
}
