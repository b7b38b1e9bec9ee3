//! Outbound frame encoding.

use crate::error::{from_buffer, ServerError};
use mqframe_buffer::{BufferPort, CommitRegion, Reserved};
use mqframe_protocol::Packet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Encodes packets into a connection's outbound ring.
///
/// Shared by every producer on the connection. The write lock is held for
/// the whole encode and commit, so frames land in the ring whole and in lock
/// order. It also owns the scratch buffer used when the ring cannot offer a
/// contiguous region.
pub struct FrameWriter<B> {
    output: Arc<B>,
    scratch: Mutex<Vec<u8>>,
}

impl<B: BufferPort> FrameWriter<B> {
    pub fn new(output: Arc<B>) -> Self {
        Self {
            output,
            scratch: Mutex::new(Vec::new()),
        }
    }

    /// Encodes `packet` into the ring, returning the frame length.
    ///
    /// Encodes in place when the ring has a contiguous region of the frame's
    /// size, otherwise through the scratch buffer followed by a plain write
    /// that waits for space. Failures are returned as-is, and a packet that
    /// fails validation never grows the scratch buffer.
    pub async fn write(&self, packet: &Packet) -> Result<usize, ServerError> {
        let len = packet.encoded_len();
        let mut scratch = self.scratch.lock().await;

        if let Some(n) = self.encode_in_place(packet, len)? {
            return Ok(n);
        }

        packet.validate()?;
        if scratch.len() < len {
            scratch.resize(len, 0);
        }
        let n = packet.encode(&mut scratch[..len])?;
        self.output
            .write(&scratch[..n])
            .await
            .map_err(from_buffer)?;
        Ok(n)
    }

    /// Zero-copy path. `Ok(None)` when the reservation would wrap.
    fn encode_in_place(&self, packet: &Packet, len: usize) -> Result<Option<usize>, ServerError> {
        match self.output.reserve_write(len).map_err(from_buffer)? {
            Reserved::Region(mut region) => {
                let n = packet.encode(&mut region[..])?;
                Ok(Some(region.commit(n).map_err(from_buffer)?))
            }
            Reserved::Wrapped => Ok(None),
        }
    }

    /// Current scratch buffer size. Non-zero only once the wrap path ran.
    pub async fn scratch_len(&self) -> usize {
        self.scratch.lock().await.len()
    }
}

impl<B> std::fmt::Debug for FrameWriter<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameWriter").finish_non_exhaustive()
    }
}
