//! Mutex-guarded byte ring with async readiness signals.
//!
//! ```text
//!            head              tail = (head + len) % capacity
//!             v                 v
//! +-----------+=================+-----------+
//! |   free    |    buffered     |   free    |
//! +-----------+=================+-----------+
//! ```
//!
//! Readers park on `readable`, writers on `writable`; every state change
//! that could unblock the other side notifies it after the lock is released.
//! [`RingBuffer::close`] wakes both sides, and the transport pumps race their
//! I/O against the close signal so teardown never waits on a socket.

use crate::error::BufferError;
use crate::port::{BufferPort, CommitRegion, Reserved};
use crate::IO_CHUNK;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Notify;

struct Ring {
    buf: Box<[u8]>,
    head: usize,
    len: usize,
}

impl Ring {
    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn free(&self) -> usize {
        self.capacity() - self.len
    }

    fn tail(&self) -> usize {
        (self.head + self.len) % self.capacity()
    }

    /// Free bytes available as one slice starting at the tail.
    fn contiguous_free(&mut self) -> usize {
        if self.len == 0 {
            self.head = 0;
            return self.capacity();
        }
        if self.len == self.capacity() {
            return 0;
        }
        let tail = self.tail();
        if tail > self.head {
            self.capacity() - tail
        } else {
            self.head - tail
        }
    }

    fn push(&mut self, src: &[u8]) -> usize {
        let n = src.len().min(self.free());
        if n == 0 {
            return 0;
        }
        let tail = self.tail();
        let first = n.min(self.capacity() - tail);
        self.buf[tail..tail + first].copy_from_slice(&src[..first]);
        self.buf[..n - first].copy_from_slice(&src[first..n]);
        self.len += n;
        n
    }

    fn copy_out(&self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.len);
        let first = n.min(self.capacity() - self.head);
        dst[..first].copy_from_slice(&self.buf[self.head..self.head + first]);
        dst[first..n].copy_from_slice(&self.buf[..n - first]);
        n
    }

    fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.len);
        self.len -= n;
        self.head = if self.len == 0 {
            0
        } else {
            (self.head + n) % self.capacity()
        };
    }

    /// Rotates the storage so the first `n` buffered bytes are one slice.
    fn make_contiguous(&mut self, n: usize) {
        if self.head + n > self.capacity() {
            let head = self.head;
            self.buf.rotate_left(head);
            self.head = 0;
        }
    }
}

/// Fixed-capacity byte ring shared between a transport pump and the
/// framing engine.
pub struct RingBuffer {
    ring: Mutex<Ring>,
    closed: AtomicBool,
    readable: Notify,
    writable: Notify,
    shutdown: Notify,
}

impl RingBuffer {
    /// Creates a ring with `capacity` bytes of storage.
    ///
    /// A zero-capacity ring is valid but every operation on it fails with
    /// [`BufferError::NotReady`].
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring {
                buf: vec![0u8; capacity].into_boxed_slice(),
                head: 0,
                len: 0,
            }),
            closed: AtomicBool::new(false),
            readable: Notify::new(),
            writable: Notify::new(),
            shutdown: Notify::new(),
        }
    }

    /// Free space in bytes.
    pub fn free(&self) -> usize {
        self.ring.lock().free()
    }

    /// Resolves once every buffered byte has been consumed or the ring is closed.
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.writable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_closed() || self.ring.lock().len == 0 {
                return;
            }
            notified.await;
        }
    }

    async fn wait_closed(&self) {
        loop {
            let notified = self.shutdown.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }

    fn lock_ready(&self) -> Result<MutexGuard<'_, Ring>, BufferError> {
        let ring = self.ring.lock();
        if ring.capacity() == 0 {
            return Err(BufferError::NotReady);
        }
        Ok(ring)
    }

    /// Appends what fits of `src`.
    fn try_push(&self, src: &[u8]) -> Result<usize, BufferError> {
        let n = {
            let mut ring = self.lock_ready()?;
            if self.is_closed() {
                return Err(BufferError::Closed);
            }
            ring.push(src)
        };
        if n > 0 {
            self.readable.notify_waiters();
        }
        Ok(n)
    }

    /// Consumes up to `dst.len()` bytes. `Ok(0)` means nothing is buffered yet.
    fn try_pull(&self, dst: &mut [u8]) -> Result<usize, BufferError> {
        let n = {
            let mut ring = self.lock_ready()?;
            if ring.len == 0 {
                if self.is_closed() {
                    return Err(BufferError::Closed);
                }
                return Ok(0);
            }
            let n = ring.copy_out(dst);
            ring.consume(n);
            n
        };
        self.writable.notify_waiters();
        Ok(n)
    }

    /// Free space once the ring is writable, or `Ok(0)` if it is full.
    fn try_free(&self) -> Result<usize, BufferError> {
        let ring = self.lock_ready()?;
        if self.is_closed() {
            return Err(BufferError::Closed);
        }
        Ok(ring.free())
    }

    /// Copies buffered bytes out without consuming them. `Ok(0)` means empty.
    fn try_stage(&self, dst: &mut [u8]) -> Result<usize, BufferError> {
        let ring = self.lock_ready()?;
        if self.is_closed() {
            return Err(BufferError::Eof);
        }
        Ok(ring.copy_out(dst))
    }

    fn release(&self, n: usize) {
        self.ring.lock().consume(n);
        self.writable.notify_waiters();
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ring = self.ring.lock();
        f.debug_struct("RingBuffer")
            .field("capacity", &ring.capacity())
            .field("len", &ring.len)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Buffered bytes viewed in place. Holds the ring's lock until dropped.
pub struct Peeked<'a> {
    ring: MutexGuard<'a, Ring>,
    len: usize,
}

impl Deref for Peeked<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        let head = self.ring.head;
        &self.ring.buf[head..head + self.len]
    }
}

impl fmt::Debug for Peeked<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peeked").field("len", &self.len).finish()
    }
}

/// A contiguous region reserved at the ring's tail. Holds the ring's lock
/// until committed or dropped.
pub struct WriteRegion<'a> {
    owner: &'a RingBuffer,
    ring: MutexGuard<'a, Ring>,
    start: usize,
    len: usize,
}

impl Deref for WriteRegion<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.ring.buf[self.start..self.start + self.len]
    }
}

impl DerefMut for WriteRegion<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        let (start, len) = (self.start, self.len);
        &mut self.ring.buf[start..start + len]
    }
}

impl CommitRegion for WriteRegion<'_> {
    fn commit(self, n: usize) -> Result<usize, BufferError> {
        let WriteRegion {
            owner,
            mut ring,
            len,
            ..
        } = self;
        if n > len {
            return Err(BufferError::InvalidCommit {
                committed: n,
                reserved: len,
            });
        }
        ring.len += n;
        drop(ring);

        if n > 0 {
            owner.readable.notify_waiters();
        }
        Ok(n)
    }
}

impl fmt::Debug for WriteRegion<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteRegion")
            .field("start", &self.start)
            .field("len", &self.len)
            .finish()
    }
}

impl BufferPort for RingBuffer {
    type Peeked<'a> = Peeked<'a> where Self: 'a;
    type Region<'a> = WriteRegion<'a> where Self: 'a;

    async fn read_from<R>(&self, src: &mut R) -> Result<usize, BufferError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut chunk = [0u8; IO_CHUNK];

        let want = loop {
            let notified = self.writable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let free = self.try_free()?;
            if free > 0 {
                break free.min(IO_CHUNK);
            }
            notified.await;
        };

        let n = tokio::select! {
            res = src.read(&mut chunk[..want]) => res?,
            _ = self.wait_closed() => return Err(BufferError::Closed),
        };
        if n == 0 {
            return Err(BufferError::Eof);
        }

        self.write(&chunk[..n]).await
    }

    fn try_peek(&self, n: usize) -> Result<Peeked<'_>, BufferError> {
        let mut ring = self.lock_ready()?;
        if n > ring.capacity() {
            return Err(BufferError::TooLarge {
                requested: n,
                capacity: ring.capacity(),
            });
        }
        if ring.len < n {
            if self.is_closed() {
                return Err(BufferError::Closed);
            }
            return Err(BufferError::InsufficientData {
                needed: n,
                available: ring.len,
            });
        }

        ring.make_contiguous(n);
        Ok(Peeked { ring, len: n })
    }

    async fn peek(&self, n: usize) -> Result<Peeked<'_>, BufferError> {
        loop {
            let notified = self.readable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            match self.try_peek(n) {
                Err(e) if e.is_transient() => {}
                result => return result,
            }
            notified.await;
        }
    }

    async fn read(&self, dst: &mut [u8]) -> Result<usize, BufferError> {
        if dst.is_empty() {
            return Ok(0);
        }
        loop {
            let notified = self.readable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let n = self.try_pull(dst)?;
            if n > 0 {
                return Ok(n);
            }
            notified.await;
        }
    }

    async fn write_to<W>(&self, dst: &mut W) -> Result<usize, BufferError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut chunk = [0u8; IO_CHUNK];

        let staged = loop {
            let notified = self.readable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let n = self.try_stage(&mut chunk)?;
            if n > 0 {
                break n;
            }
            notified.await;
        };

        // Closing the ring ends the outbound stream; unsent bytes go with it.
        let n = tokio::select! {
            res = dst.write(&chunk[..staged]) => res?,
            _ = self.wait_closed() => return Err(BufferError::Eof),
        };
        if n == 0 {
            return Err(BufferError::Eof);
        }

        self.release(n);
        Ok(n)
    }

    fn reserve_write(&self, n: usize) -> Result<Reserved<WriteRegion<'_>>, BufferError> {
        let mut ring = self.lock_ready()?;
        if self.is_closed() {
            return Err(BufferError::Closed);
        }
        if ring.contiguous_free() < n {
            return Ok(Reserved::Wrapped);
        }

        let start = ring.tail();
        Ok(Reserved::Region(WriteRegion {
            owner: self,
            ring,
            start,
            len: n,
        }))
    }

    async fn write(&self, src: &[u8]) -> Result<usize, BufferError> {
        let mut written = 0;
        while written < src.len() {
            let notified = self.writable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            written += self.try_push(&src[written..])?;
            if written < src.len() {
                notified.await;
            }
        }
        Ok(written)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.readable.notify_waiters();
        self.writable.notify_waiters();
        self.shutdown.notify_waiters();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn len(&self) -> usize {
        self.ring.lock().len
    }

    fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }
}
