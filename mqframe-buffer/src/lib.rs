//! # mqframe-buffer
//!
//! Fixed-capacity byte rings for mqframe connections.
//!
//! This crate provides:
//! - The [`BufferPort`] contract the framing engine consumes
//! - [`RingBuffer`], a mutex-guarded ring with async readiness signals
//! - Peek-without-consume views and reserved write regions
//! - Buffer error types

pub mod error;
pub mod port;
pub mod ring;

pub use error::BufferError;
pub use port::{BufferPort, CommitRegion, Reserved};
pub use ring::{Peeked, RingBuffer, WriteRegion};

/// Size of the stack chunk used when moving bytes to or from a transport.
pub const IO_CHUNK: usize = 4096;
