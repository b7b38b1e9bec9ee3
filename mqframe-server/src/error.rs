//! Server error types.

use crate::config::ConfigError;
use mqframe_buffer::BufferError;
use mqframe_protocol::ProtocolError;
use std::time::Duration;
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// The transport is not a byte stream.
    #[error("unsupported transport: {0}")]
    UnsupportedTransport(&'static str),

    #[error("no data within keep-alive interval of {0:?}")]
    KeepAliveTimeout(Duration),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("connection pump already started")]
    AlreadyStarted,

    #[error("pump task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ServerError {
    /// Returns whether this is an ordinary end of stream rather than a failure.
    pub fn is_clean_eof(&self) -> bool {
        matches!(self, ServerError::Buffer(BufferError::Eof))
    }
}

/// Maps a ring error seen by the framing engine. A closed ring means the
/// connection was torn down underneath the caller.
pub(crate) fn from_buffer(err: BufferError) -> ServerError {
    match err {
        BufferError::Closed => ServerError::ConnectionClosed,
        other => ServerError::Buffer(other),
    }
}
