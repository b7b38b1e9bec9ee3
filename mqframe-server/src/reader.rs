//! Inbound frame acquisition.
//!
//! A frame is sized by peeking its fixed header, then acquired either in
//! peek mode (bytes stay in the ring) or consume mode (bytes are moved into
//! the reader's scratch buffer), and finally decoded into a [`Packet`].

use crate::error::{from_buffer, ServerError};
use mqframe_buffer::BufferPort;
use mqframe_protocol::{FrameSize, Packet, Scan, MAX_HEADER_LEN, MIN_HEADER_PEEK};
use std::sync::Arc;

/// Sole consumer of a connection's inbound ring.
///
/// Every acquisition takes `&mut self`, so frames are never consumed from
/// two places at once.
pub struct FrameReader<B> {
    input: Arc<B>,
    scratch: Vec<u8>,
}

impl<B: BufferPort> FrameReader<B> {
    pub fn new(input: Arc<B>) -> Self {
        Self {
            input,
            scratch: Vec::new(),
        }
    }

    /// Sizes the frame at the front of the ring without consuming it.
    ///
    /// Waits until the fixed header is complete. Fails on a reserved packet
    /// type or a remaining-length field longer than four bytes.
    pub async fn peek_frame_size(&mut self) -> Result<FrameSize, ServerError> {
        let mut cnt = MIN_HEADER_PEEK;
        loop {
            let scan = {
                let peeked = self.input.peek(cnt).await.map_err(from_buffer)?;
                FrameSize::scan(&peeked)?
            };
            match scan {
                Scan::Complete(size) => return Ok(size),
                Scan::NeedMore(next) => {
                    debug_assert!(next > cnt && next <= MAX_HEADER_LEN);
                    cnt = next;
                }
            }
        }
    }

    /// Decodes the sized frame in place, leaving it in the ring.
    pub async fn peek_packet(&mut self, size: &FrameSize) -> Result<(Packet, usize), ServerError> {
        let peeked = self.input.peek(size.total).await.map_err(from_buffer)?;
        let mut packet = size.packet_type.new_packet();
        let n = packet.decode(&peeked[..size.total])?;
        Ok((packet, n))
    }

    /// Consumes the sized frame and decodes it.
    pub async fn read_packet(&mut self, size: &FrameSize) -> Result<(Packet, usize), ServerError> {
        let total = size.total;
        if self.scratch.len() < total {
            self.scratch.resize(total, 0);
        }

        let mut filled = 0;
        while filled < total {
            filled += self
                .input
                .read(&mut self.scratch[filled..total])
                .await
                .map_err(from_buffer)?;
        }

        let mut packet = size.packet_type.new_packet();
        let n = packet.decode(&self.scratch[..total])?;
        Ok((packet, n))
    }

    /// Waits for, consumes and decodes the next frame.
    pub async fn next_packet(&mut self) -> Result<Packet, ServerError> {
        let size = self.peek_frame_size().await?;
        let (packet, _) = self.read_packet(&size).await?;
        Ok(packet)
    }

    /// Current scratch buffer size. Grows to the largest frame consumed.
    pub fn scratch_len(&self) -> usize {
        self.scratch.len()
    }
}

impl<B> std::fmt::Debug for FrameReader<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReader")
            .field("scratch_len", &self.scratch.len())
            .finish()
    }
}
