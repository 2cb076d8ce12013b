//! Domain-specific error types for the workbench data plane.
//!
//! All fallible operations return `Result<T, WorkbenchError>`.
//! The registry's API is total and never produces one of these; errors
//! live inside the transport links and are contained there.

use thiserror::Error;

/// The canonical error type for the workbench data plane.
#[derive(Debug, Error)]
pub enum WorkbenchError {
    // ── Connection Errors ────────────────────────────────────────
    /// The socket/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The relay endpoint path could not be used to open a channel.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The peer closed the channel while a write was in flight.
    #[error("channel closed")]
    ChannelClosed,

    // ── Protocol Errors ──────────────────────────────────────────
    /// Encoding or decoding of a message failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A state machine transition was requested from the wrong phase.
    #[error("link state violation: {0}")]
    StateViolation(&'static str),

    /// UTF-8 conversion failed.
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for WorkbenchError {
    fn from(s: String) -> Self {
        WorkbenchError::Other(s)
    }
}

impl From<&str> for WorkbenchError {
    fn from(s: &str) -> Self {
        WorkbenchError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for WorkbenchError {
    fn from(e: serde_json::Error) -> Self {
        WorkbenchError::Encoding(e.to_string())
    }
}

impl From<tokio_util::codec::LinesCodecError> for WorkbenchError {
    fn from(e: tokio_util::codec::LinesCodecError) -> Self {
        match e {
            tokio_util::codec::LinesCodecError::Io(io) => WorkbenchError::Connection(io),
            other => WorkbenchError::Encoding(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = WorkbenchError::InvalidEndpoint("/tmp/x".into());
        assert!(e.to_string().contains("/tmp/x"));

        let e = WorkbenchError::StateViolation("cannot stream: not registered");
        assert!(e.to_string().contains("not registered"));
    }

    #[test]
    fn from_string() {
        let e: WorkbenchError = "something broke".into();
        assert!(matches!(e, WorkbenchError::Other(_)));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: WorkbenchError = io_err.into();
        assert!(matches!(e, WorkbenchError::Connection(_)));
    }

    #[test]
    fn from_json() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let e: WorkbenchError = parse_err.into();
        assert!(matches!(e, WorkbenchError::Encoding(_)));
    }
}
