//! Server error types.

use thiserror::Error;

/// Terminal error of a long-running serve loop.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The connection limiter was closed underneath the accept loop.
    #[error("connection limiter closed")]
    LimiterClosed,

    /// The serve task panicked or was aborted.
    #[error("serve task failed: {0}")]
    Task(String),
}

/// Per-connection demultiplexing failure. Never fatal to the accept loop.
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no protocol matched the connection preamble")]
    NoMatch,

    #[error("connection closed before a protocol was identified")]
    ClosedEarly,

    #[error("timed out identifying the connection protocol")]
    Timeout,

    #[error("{0} listener is closed")]
    ListenerClosed(&'static str),
}
