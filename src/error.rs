//! Error types for the patchbay core.

use std::fmt;

use thiserror::Error;

use crate::graph::PortRef;

/// Why a requested edge was refused before reaching the authority
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeFault {
    SourceMissing,
    TargetMissing,
    SourceNotOutput,
    TargetNotInput,
}

impl fmt::Display for EdgeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeFault::SourceMissing => write!(f, "source port not in current snapshot"),
            EdgeFault::TargetMissing => write!(f, "target port not in current snapshot"),
            EdgeFault::SourceNotOutput => write!(f, "source port is not output-capable"),
            EdgeFault::TargetNotInput => write!(f, "target port is not input-capable"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Authority unreachable, non-2xx reply, or push channel failure
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid edge {from} -> {to}: {fault}")]
    InvalidEdge {
        from: PortRef,
        to: PortRef,
        fault: EdgeFault,
    },

    #[error("malformed MIDI frame ({len} bytes): [{hex}]")]
    MalformedFrame { len: usize, hex: String },

    #[error("invalid port address '{0}', expected DEVICE:PORT")]
    InvalidPortAddress(String),
}

impl Error {
    /// Whether the failure came from the network boundary
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::Transport(format!("bad authority URL: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
