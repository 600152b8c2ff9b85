//! Error types for the torrent core
//!
//! Every layer (codec, metainfo, tracker, peer session) reports failures
//! through [`TorrentError`] so callers can match on the failure kind.

use std::fmt;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, TorrentError>;

/// Error type for torrent operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorrentError {
    /// Bencode syntax violation
    MalformedInput {
        message: String,
        offset: usize,
    },

    /// Required metainfo key absent or of the wrong bencode type
    MissingField {
        field: String,
    },

    /// Metainfo key present with an unusable value
    InvalidField {
        field: String,
        message: String,
    },

    /// Tracker could not be reached
    TrackerUnreachable {
        url: String,
        source: Option<String>,
    },

    /// Tracker answered with a `failure reason`
    TrackerFailure {
        reason: String,
    },

    /// Tracker answered with something we cannot interpret
    MalformedResponse {
        message: String,
    },

    /// Peer handshake failed
    HandshakeFailed {
        message: String,
        peer: Option<String>,
    },

    /// Unexpected message id or short/invalid frame
    ProtocolError {
        message: String,
        expected: Option<u8>,
        received: Option<u8>,
    },

    /// Downloaded piece does not hash to the value in `pieces`
    PieceHashMismatch {
        index: u32,
        expected: String,
        actual: String,
    },

    /// A connect or read deadline elapsed
    Timeout {
        operation: String,
        peer: Option<String>,
    },

    /// Underlying transport or file failure
    IoError {
        message: String,
        path: Option<String>,
    },
}

impl TorrentError {
    /// Create a new MalformedInput error at a byte offset
    pub fn malformed_input(message: impl Into<String>, offset: usize) -> Self {
        TorrentError::MalformedInput {
            message: message.into(),
            offset,
        }
    }

    /// Create a new MissingField error
    pub fn missing_field(field: impl Into<String>) -> Self {
        TorrentError::MissingField { field: field.into() }
    }

    /// Create a new InvalidField error
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        TorrentError::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new TrackerUnreachable error
    pub fn tracker_unreachable(url: impl Into<String>) -> Self {
        TorrentError::TrackerUnreachable {
            url: url.into(),
            source: None,
        }
    }

    /// Create a new TrackerUnreachable error with source
    pub fn tracker_unreachable_with_source(url: impl Into<String>, source: impl Into<String>) -> Self {
        TorrentError::TrackerUnreachable {
            url: url.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new TrackerFailure error
    pub fn tracker_failure(reason: impl Into<String>) -> Self {
        TorrentError::TrackerFailure { reason: reason.into() }
    }

    /// Create a new MalformedResponse error
    pub fn malformed_response(message: impl Into<String>) -> Self {
        TorrentError::MalformedResponse { message: message.into() }
    }

    /// Create a new HandshakeFailed error
    pub fn handshake_failed(message: impl Into<String>) -> Self {
        TorrentError::HandshakeFailed {
            message: message.into(),
            peer: None,
        }
    }

    /// Create a new HandshakeFailed error with peer address
    pub fn handshake_failed_with_peer(message: impl Into<String>, peer: impl Into<String>) -> Self {
        TorrentError::HandshakeFailed {
            message: message.into(),
            peer: Some(peer.into()),
        }
    }

    /// Create a new ProtocolError
    pub fn protocol_error(message: impl Into<String>) -> Self {
        TorrentError::ProtocolError {
            message: message.into(),
            expected: None,
            received: None,
        }
    }

    /// Create a ProtocolError for an unexpected message id
    pub fn unexpected_message(expected: u8, received: u8) -> Self {
        TorrentError::ProtocolError {
            message: "unexpected message id".to_string(),
            expected: Some(expected),
            received: Some(received),
        }
    }

    /// Create a new PieceHashMismatch error
    pub fn piece_hash_mismatch(index: u32, expected: &[u8], actual: &[u8]) -> Self {
        TorrentError::PieceHashMismatch {
            index,
            expected: hex::encode(expected),
            actual: hex::encode(actual),
        }
    }

    /// Create a new Timeout error
    pub fn timeout(operation: impl Into<String>) -> Self {
        TorrentError::Timeout {
            operation: operation.into(),
            peer: None,
        }
    }

    /// Create a new Timeout error with peer address
    pub fn timeout_with_peer(operation: impl Into<String>, peer: impl Into<String>) -> Self {
        TorrentError::Timeout {
            operation: operation.into(),
            peer: Some(peer.into()),
        }
    }

    /// Create a new IoError
    pub fn io_error(message: impl Into<String>) -> Self {
        TorrentError::IoError {
            message: message.into(),
            path: None,
        }
    }

    /// Create a new IoError with path
    pub fn io_error_with_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        TorrentError::IoError {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Attach a peer address to errors that carry one
    pub fn with_peer(mut self, addr: impl Into<String>) -> Self {
        let addr = addr.into();
        match &mut self {
            TorrentError::HandshakeFailed { peer, .. } | TorrentError::Timeout { peer, .. } => {
                if peer.is_none() {
                    *peer = Some(addr);
                }
            }
            TorrentError::ProtocolError { message, .. } => {
                *message = format!("{} (peer: {})", message, addr);
            }
            _ => {}
        }
        self
    }

    /// Check whether this error came from a deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, TorrentError::Timeout { .. })
    }
}

impl fmt::Display for TorrentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TorrentError::MalformedInput { message, offset } => {
                write!(f, "Malformed input: {} (offset: {})", message, offset)
            }
            TorrentError::MissingField { field } => {
                write!(f, "Missing field: '{}' is absent or has the wrong type", field)
            }
            TorrentError::InvalidField { field, message } => {
                write!(f, "Invalid field: '{}': {}", field, message)
            }
            TorrentError::TrackerUnreachable { url, source } => match source {
                Some(s) => write!(f, "Tracker unreachable: {} (source: {})", url, s),
                None => write!(f, "Tracker unreachable: {}", url),
            },
            TorrentError::TrackerFailure { reason } => {
                write!(f, "Tracker failure: {}", reason)
            }
            TorrentError::MalformedResponse { message } => {
                write!(f, "Malformed tracker response: {}", message)
            }
            TorrentError::HandshakeFailed { message, peer } => match peer {
                Some(p) => write!(f, "Handshake failed: {} (peer: {})", message, p),
                None => write!(f, "Handshake failed: {}", message),
            },
            TorrentError::ProtocolError { message, expected, received } => match (expected, received) {
                (Some(e), Some(r)) => write!(f, "Protocol error: {} (expected id {}, received id {})", message, e, r),
                _ => write!(f, "Protocol error: {}", message),
            },
            TorrentError::PieceHashMismatch { index, expected, actual } => {
                write!(f, "Piece {} failed verification (expected {}, got {})", index, expected, actual)
            }
            TorrentError::Timeout { operation, peer } => match peer {
                Some(p) => write!(f, "Timed out: {} (peer: {})", operation, p),
                None => write!(f, "Timed out: {}", operation),
            },
            TorrentError::IoError { message, path } => match path {
                Some(p) => write!(f, "I/O error: {} (path: {})", message, p),
                None => write!(f, "I/O error: {}", message),
            },
        }
    }
}

impl std::error::Error for TorrentError {}

impl From<std::io::Error> for TorrentError {
    fn from(err: std::io::Error) -> Self {
        TorrentError::io_error(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for TorrentError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        TorrentError::timeout("operation timed out")
    }
}

impl From<url::ParseError> for TorrentError {
    fn from(err: url::ParseError) -> Self {
        TorrentError::tracker_unreachable_with_source("invalid announce URL", err.to_string())
    }
}
