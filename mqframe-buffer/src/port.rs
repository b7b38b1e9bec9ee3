//! The byte-ring contract consumed by the framing engine.

use crate::error::BufferError;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use tokio::io::{AsyncRead, AsyncWrite};

/// Outcome of a reserved-write request.
#[derive(Debug)]
pub enum Reserved<R> {
    /// A contiguous region of exactly the requested size.
    Region(R),
    /// No contiguous region of that size exists right now; fall back to
    /// [`BufferPort::write`].
    Wrapped,
}

/// A reserved region that is written in place and then committed.
///
/// Dropping a region without committing discards it.
pub trait CommitRegion: DerefMut<Target = [u8]> {
    /// Publishes the first `n` bytes of the region to readers.
    fn commit(self, n: usize) -> Result<usize, BufferError>;
}

/// Bounded byte ring with peek, consuming read, reserved write and
/// transport pumping.
///
/// Waiting operations wake on new data, freed space, or [`close`](Self::close).
pub trait BufferPort: Send + Sync {
    /// Borrowed view of buffered bytes, valid until dropped.
    type Peeked<'a>: Deref<Target = [u8]>
    where
        Self: 'a;

    /// Reserved write region.
    type Region<'a>: CommitRegion
    where
        Self: 'a;

    /// Appends one chunk of bytes read from `src`, waiting for free space.
    ///
    /// A zero-byte read from `src` yields [`BufferError::Eof`].
    fn read_from<R>(&self, src: &mut R) -> impl Future<Output = Result<usize, BufferError>> + Send
    where
        R: AsyncRead + Unpin + Send;

    /// Views the first `n` buffered bytes without consuming them.
    fn try_peek(&self, n: usize) -> Result<Self::Peeked<'_>, BufferError>;

    /// Like [`try_peek`](Self::try_peek), but waits while data is insufficient.
    fn peek(&self, n: usize) -> impl Future<Output = Result<Self::Peeked<'_>, BufferError>> + Send;

    /// Consumes up to `dst.len()` bytes, waiting until at least one is buffered.
    fn read(&self, dst: &mut [u8]) -> impl Future<Output = Result<usize, BufferError>> + Send;

    /// Drains one chunk of buffered bytes into `dst`.
    fn write_to<W>(&self, dst: &mut W) -> impl Future<Output = Result<usize, BufferError>> + Send
    where
        W: AsyncWrite + Unpin + Send;

    /// Reserves a contiguous region of `n` bytes for in-place encoding.
    fn reserve_write(&self, n: usize) -> Result<Reserved<Self::Region<'_>>, BufferError>;

    /// Appends all of `src`, waiting for space as needed.
    fn write(&self, src: &[u8]) -> impl Future<Output = Result<usize, BufferError>> + Send;

    /// Closes the ring and wakes every waiter.
    fn close(&self);

    fn is_closed(&self) -> bool;

    /// Number of buffered bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize;
}
