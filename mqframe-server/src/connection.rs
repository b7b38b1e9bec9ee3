//! Per-connection state.

use crate::config::{ConnectionConfig, ReadDeadline};
use crate::error::ServerError;
use crate::reader::FrameReader;
use crate::writer::FrameWriter;
use mqframe_buffer::{BufferPort, RingBuffer};
use mqframe_protocol::Packet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

/// Lifecycle of one pump loop. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LoopState {
    /// Spawned, transport not yet inspected.
    Starting = 0,
    /// Moving bytes.
    Running = 1,
    /// Exited; tearing the connection down.
    Closing = 2,
    /// Teardown finished.
    Done = 3,
}

impl LoopState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LoopState::Starting,
            1 => LoopState::Running,
            2 => LoopState::Closing,
            _ => LoopState::Done,
        }
    }
}

#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(LoopState::Starting as u8))
    }

    pub(crate) fn get(&self) -> LoopState {
        LoopState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn advance(&self, to: LoopState) {
        self.0.fetch_max(to as u8, Ordering::AcqRel);
    }
}

/// One client connection: its rings, its writer, and its pump bookkeeping.
///
/// Created with [`Connection::new`], which also hands out the connection's
/// only [`FrameReader`]. Outbound packets go through [`Connection::write_packet`]
/// from any number of tasks.
pub struct Connection {
    pub(crate) id: Uuid,
    pub(crate) read_deadline: ReadDeadline,
    keep_alive_ms: AtomicU64,
    pub(crate) input: Arc<RingBuffer>,
    pub(crate) output: Arc<RingBuffer>,
    writer: FrameWriter<RingBuffer>,
    pub(crate) started: AtomicBool,
    pub(crate) active: AtomicUsize,
    closed: AtomicBool,
    shutdown: Notify,
    pub(crate) receiver_state: StateCell,
    pub(crate) sender_state: StateCell,
}

impl Connection {
    /// Creates a connection and its frame reader.
    pub fn new(config: &ConnectionConfig) -> (Arc<Self>, FrameReader<RingBuffer>) {
        let input = Arc::new(RingBuffer::new(config.input_buffer_size));
        let output = Arc::new(RingBuffer::new(config.output_buffer_size));

        let conn = Arc::new(Self {
            id: Uuid::new_v4(),
            read_deadline: config.read_deadline,
            keep_alive_ms: AtomicU64::new(config.keep_alive().as_millis() as u64),
            input: input.clone(),
            output: output.clone(),
            writer: FrameWriter::new(output),
            started: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
            receiver_state: StateCell::new(),
            sender_state: StateCell::new(),
        });

        (conn, FrameReader::new(input))
    }

    /// Unique connection ID.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Encodes a packet into the outbound ring.
    pub async fn write_packet(&self, packet: &Packet) -> Result<usize, ServerError> {
        self.writer.write(packet).await
    }

    /// Returns the read deadline interval. Zero means no deadline.
    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms.load(Ordering::Relaxed))
    }

    /// Replaces the keep-alive interval, e.g. with the one a client sent in
    /// CONNECT. Picked up the next time the receiver sets its deadline.
    pub fn set_keep_alive(&self, keep_alive: Duration) {
        self.keep_alive_ms
            .store(keep_alive.as_millis() as u64, Ordering::Relaxed);
    }

    /// Tears the connection down. Idempotent.
    ///
    /// Closing both rings wakes every pending read, peek and write, and
    /// interrupts the pump loops' transport I/O.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.input.close();
        self.output.close();
        self.shutdown.notify_waiters();
        tracing::debug!("[{}] Connection closed", self.id);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once [`close`](Self::close) has run.
    pub async fn closed(&self) {
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

    /// Waits until every queued outbound byte has reached the sender, or the
    /// connection closes.
    pub async fn flush(&self) {
        self.output.wait_drained().await;
    }

    /// Number of pump loops that have not yet exited.
    pub fn active_loops(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn receiver_state(&self) -> LoopState {
        self.receiver_state.get()
    }

    pub fn sender_state(&self) -> LoopState {
        self.sender_state.get()
    }

    /// Bytes waiting in the inbound ring.
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// Bytes waiting in the outbound ring.
    pub fn pending_output(&self) -> usize {
        self.output.len()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("receiver", &self.receiver_state())
            .field("sender", &self.sender_state())
            .finish()
    }
}
