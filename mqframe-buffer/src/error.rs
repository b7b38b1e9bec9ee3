//! Buffer error types.

use thiserror::Error;

/// Buffer errors.
#[derive(Debug, Error)]
pub enum BufferError {
    /// The ring has no backing storage.
    #[error("buffer not ready")]
    NotReady,

    /// Fewer bytes are buffered than were asked for. Transient.
    #[error("insufficient data: need {needed} bytes, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("buffer closed")]
    Closed,

    /// End of the byte stream on either side of the ring.
    #[error("end of stream")]
    Eof,

    #[error("request of {requested} bytes exceeds buffer capacity {capacity}")]
    TooLarge { requested: usize, capacity: usize },

    #[error("commit of {committed} bytes exceeds reserved region of {reserved}")]
    InvalidCommit { committed: usize, reserved: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BufferError {
    /// Returns true for conditions that resolve once more bytes arrive.
    pub fn is_transient(&self) -> bool {
        matches!(self, BufferError::InsufficientData { .. })
    }
}
