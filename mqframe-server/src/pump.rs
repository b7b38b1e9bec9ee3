//! Receiver and sender loops.
//!
//! Each connection runs exactly two tasks. The receiver moves transport bytes
//! into the inbound ring, the sender drains the outbound ring to the
//! transport. Whichever exits first closes the connection, which in turn
//! unblocks and ends the other.

use crate::config::ReadDeadline;
use crate::connection::{Connection, LoopState, StateCell};
use crate::error::ServerError;
use crate::transport::{Half, Transport};
use mqframe_buffer::{BufferError, BufferPort};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Runs a loop's exit bookkeeping, including when the loop panics.
struct LoopGuard<'a> {
    conn: &'a Connection,
    state: &'a StateCell,
}

impl<'a> LoopGuard<'a> {
    fn new(conn: &'a Connection, state: &'a StateCell) -> Self {
        Self { conn, state }
    }
}

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        self.state.advance(LoopState::Closing);
        self.conn.close();
        self.conn.active.fetch_sub(1, Ordering::AcqRel);
        self.state.advance(LoopState::Done);
    }
}

/// Results of both loops of a connection.
#[derive(Debug)]
pub struct PumpOutcome {
    pub receiver: Result<(), ServerError>,
    pub sender: Result<(), ServerError>,
}

impl PumpOutcome {
    /// Returns whether neither loop failed.
    pub fn is_clean(&self) -> bool {
        self.receiver.is_ok() && self.sender.is_ok()
    }
}

/// Handle to a connection's running loops.
#[derive(Debug)]
pub struct PumpHandle {
    receiver: JoinHandle<Result<(), ServerError>>,
    sender: JoinHandle<Result<(), ServerError>>,
}

impl PumpHandle {
    /// Waits for both loops to exit.
    pub async fn join(self) -> PumpOutcome {
        let (receiver, sender) = tokio::join!(self.receiver, self.sender);
        PumpOutcome {
            receiver: receiver.unwrap_or_else(|e| Err(e.into())),
            sender: sender.unwrap_or_else(|e| Err(e.into())),
        }
    }
}

impl Connection {
    /// Spawns the receiver and sender loops over `transport`.
    ///
    /// A connection is pumped at most once.
    pub fn start<S>(self: &Arc<Self>, transport: Transport<S>) -> Result<PumpHandle, ServerError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        if self.is_closed() {
            return Err(ServerError::ConnectionClosed);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(ServerError::AlreadyStarted);
        }

        tracing::debug!("[{}] Starting pump over {} transport", self.id, transport.kind());
        let (read_half, write_half) = transport.split();
        self.active.fetch_add(2, Ordering::AcqRel);

        let receiver = tokio::spawn(self.clone().run_receiver(read_half));
        let sender = tokio::spawn(self.clone().run_sender(write_half));
        Ok(PumpHandle { receiver, sender })
    }

    async fn run_receiver<R>(self: Arc<Self>, half: Half<R>) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let _guard = LoopGuard::new(&self, &self.receiver_state);

        let mut src = match half {
            Half::Stream(src) => src,
            Half::Framed(kind) => {
                tracing::error!("[{}] Receiver: {} transport is not supported", self.id, kind);
                return Err(ServerError::UnsupportedTransport(kind));
            }
        };

        self.receiver_state.advance(LoopState::Running);
        tracing::debug!("[{}] Receiver started", self.id);

        let result = self.receive(&mut src).await;
        match &result {
            Ok(()) => tracing::debug!("[{}] Receiver stopped", self.id),
            Err(e) => tracing::debug!("[{}] Receiver stopped: {}", self.id, e),
        }
        result
    }

    async fn receive<R>(&self, src: &mut R) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut deadline = self.next_deadline();
        loop {
            let read = self.input.read_from(src);
            let result = match deadline {
                Some(at) => match tokio::time::timeout_at(at, read).await {
                    Ok(result) => result,
                    Err(_) => return Err(ServerError::KeepAliveTimeout(self.keep_alive())),
                },
                None => read.await,
            };

            match result {
                Ok(n) => tracing::trace!("[{}] Received {} bytes", self.id, n),
                // Peer finished, or the connection was closed from elsewhere
                Err(BufferError::Eof | BufferError::Closed) => return Ok(()),
                Err(e) => return Err(e.into()),
            }

            if self.read_deadline == ReadDeadline::Sliding {
                deadline = self.next_deadline();
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        let keep_alive = self.keep_alive();
        if keep_alive.is_zero() {
            None
        } else {
            Some(Instant::now() + keep_alive)
        }
    }

    async fn run_sender<W>(self: Arc<Self>, half: Half<W>) -> Result<(), ServerError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let _guard = LoopGuard::new(&self, &self.sender_state);

        let mut dst = match half {
            Half::Stream(dst) => dst,
            Half::Framed(kind) => {
                tracing::error!("[{}] Sender: {} transport is not supported", self.id, kind);
                return Err(ServerError::UnsupportedTransport(kind));
            }
        };

        self.sender_state.advance(LoopState::Running);
        tracing::debug!("[{}] Sender started", self.id);

        let err = loop {
            match self.output.write_to(&mut dst).await {
                Ok(n) => tracing::trace!("[{}] Sent {} bytes", self.id, n),
                Err(e) => break ServerError::from(e),
            }
        };

        // Eof is either the ring closing or the peer accepting no more bytes
        if err.is_clean_eof() {
            tracing::debug!("[{}] Sender stopped", self.id);
            if let Err(e) = dst.shutdown().await {
                tracing::debug!("[{}] Transport shutdown failed: {}", self.id, e);
            }
            return Ok(());
        }

        tracing::error!("[{}] Send error: {}", self.id, err);
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::transport::MessageTransport;
    use mqframe_protocol::{Connack, ConnackCode, Connect, Packet, Pingreq, Pingresp};
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, DuplexStream, ReadBuf};

    fn config(keep_alive_secs: u64, read_deadline: ReadDeadline) -> ConnectionConfig {
        ConnectionConfig {
            input_buffer_size: 1024,
            output_buffer_size: 1024,
            keep_alive_secs,
            read_deadline,
        }
    }

    struct Websocket;

    /// Peer that never sends and accepts zero bytes of every write.
    struct StalledPeer;

    impl AsyncRead for StalledPeer {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    impl AsyncWrite for StalledPeer {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Ok(0))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    impl MessageTransport for Websocket {
        fn kind(&self) -> &'static str {
            "websocket"
        }
    }

    #[tokio::test]
    async fn test_duplex_session() {
        let (conn, mut reader) = Connection::new(&config(0, ReadDeadline::Sliding));
        let (server, mut client) = tokio::io::duplex(256);
        let pump = conn.start(Transport::Stream(server)).unwrap();
        assert_eq!(conn.active_loops(), 2);

        let connect = Packet::from(Connect {
            keep_alive: 30,
            ..Connect::new("duplex-client")
        });
        client.write_all(&connect.to_bytes().unwrap()).await.unwrap();
        assert_eq!(reader.next_packet().await.unwrap(), connect);

        conn.write_packet(&Packet::from(Connack::new(false, ConnackCode::Accepted)))
            .await
            .unwrap();
        let mut ack = [0u8; 4];
        client.read_exact(&mut ack).await.unwrap();
        assert_eq!(ack, [0x20, 0x02, 0x00, 0x00]);

        drop(client);
        let outcome = pump.join().await;
        assert!(outcome.is_clean(), "{:?}", outcome);
        assert!(conn.is_closed());
        assert_eq!(conn.active_loops(), 0);
        assert_eq!(conn.receiver_state(), LoopState::Done);
        assert_eq!(conn.sender_state(), LoopState::Done);
    }

    #[tokio::test]
    async fn test_sender_clean_eof() {
        let (conn, _reader) = Connection::new(&config(0, ReadDeadline::Sliding));
        conn.write_packet(&Packet::from(Pingresp)).await.unwrap();

        // Peer takes the PINGRESP, then ends the stream.
        let transport = tokio_test::io::Builder::new().write(&[0xD0, 0x00]).build();
        let outcome = conn.start(Transport::Stream(transport)).unwrap().join().await;

        assert!(outcome.sender.is_ok());
        assert!(outcome.receiver.is_ok());
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn test_sender_stops_cleanly_on_zero_write() {
        let (conn, _reader) = Connection::new(&config(0, ReadDeadline::Sliding));
        conn.write_packet(&Packet::from(Pingresp)).await.unwrap();

        let outcome = conn.start(Transport::Stream(StalledPeer)).unwrap().join().await;

        // The sender ended the connection itself; the receiver only saw the close.
        assert!(outcome.sender.is_ok(), "{:?}", outcome.sender);
        assert!(outcome.receiver.is_ok(), "{:?}", outcome.receiver);
        assert_eq!(conn.pending_output(), 2);
        assert_eq!(conn.sender_state(), LoopState::Done);
        assert_eq!(conn.receiver_state(), LoopState::Done);
    }

    #[tokio::test]
    async fn test_sender_error_reported_once() {
        let (conn, _reader) = Connection::new(&config(0, ReadDeadline::Sliding));
        conn.write_packet(&Packet::from(Pingresp)).await.unwrap();

        let transport = tokio_test::io::Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
            .build();
        let outcome = conn.start(Transport::Stream(transport)).unwrap().join().await;

        match outcome.sender {
            Err(ServerError::Buffer(BufferError::Io(e))) => {
                assert_eq!(e.kind(), io::ErrorKind::BrokenPipe)
            }
            other => panic!("unexpected sender result: {:?}", other),
        }
        // The receiver was merely torn down; it reports nothing.
        assert!(outcome.receiver.is_ok());
        assert_eq!(conn.sender_state(), LoopState::Done);
    }

    #[tokio::test]
    async fn test_framed_transport_rejected() {
        let (conn, _reader) = Connection::new(&config(0, ReadDeadline::Sliding));
        let transport: Transport<DuplexStream> = Transport::Framed(Box::new(Websocket));
        let outcome = conn.start(transport).unwrap().join().await;

        assert!(matches!(
            outcome.receiver,
            Err(ServerError::UnsupportedTransport("websocket"))
        ));
        assert!(matches!(
            outcome.sender,
            Err(ServerError::UnsupportedTransport("websocket"))
        ));
        assert!(conn.is_closed());
        assert_eq!(conn.active_loops(), 0);
        assert_eq!(conn.receiver_state(), LoopState::Done);
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let (conn, _reader) = Connection::new(&config(0, ReadDeadline::Sliding));
        let (server, _client) = tokio::io::duplex(64);
        let pump = conn.start(Transport::Stream(server)).unwrap();

        let (other, _peer) = tokio::io::duplex(64);
        assert!(matches!(
            conn.start(Transport::Stream(other)),
            Err(ServerError::AlreadyStarted)
        ));

        conn.close();
        assert!(pump.join().await.is_clean());
        let (late, _peer) = tokio::io::duplex(64);
        assert!(matches!(
            conn.start(Transport::Stream(late)),
            Err(ServerError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_close_stops_both_loops() {
        let (conn, mut reader) = Connection::new(&config(0, ReadDeadline::Sliding));
        let (server, _client) = tokio::io::duplex(64);
        let pump = conn.start(Transport::Stream(server)).unwrap();

        let pending = tokio::spawn(async move { reader.next_packet().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(conn.receiver_state(), LoopState::Running);

        conn.close();
        assert!(pump.join().await.is_clean());
        assert!(matches!(
            pending.await.unwrap(),
            Err(ServerError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_keep_alive_once_expires_despite_traffic() {
        let (conn, _reader) = Connection::new(&config(0, ReadDeadline::Once));
        conn.set_keep_alive(Duration::from_millis(150));
        let (server, mut client) = tokio::io::duplex(256);
        let pump = conn.start(Transport::Stream(server)).unwrap();

        let ping = Packet::from(Pingreq).to_bytes().unwrap();
        let feeder = tokio::spawn(async move {
            for _ in 0..20 {
                if client.write_all(&ping).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(30)).await;
            }
        });

        let outcome = pump.join().await;
        assert!(matches!(
            outcome.receiver,
            Err(ServerError::KeepAliveTimeout(_))
        ));
        feeder.abort();
    }

    #[tokio::test]
    async fn test_keep_alive_sliding_renews_on_traffic() {
        let (conn, _reader) = Connection::new(&config(0, ReadDeadline::Sliding));
        conn.set_keep_alive(Duration::from_millis(150));
        let (server, mut client) = tokio::io::duplex(256);
        let pump = conn.start(Transport::Stream(server)).unwrap();

        let ping = Packet::from(Pingreq).to_bytes().unwrap();
        for _ in 0..8 {
            client.write_all(&ping).await.unwrap();
            tokio::time::sleep(Duration::from_millis(40)).await;
        }
        // 320ms of steady traffic, well past one interval
        assert!(!conn.is_closed());

        // Silence now trips the deadline.
        let outcome = pump.join().await;
        assert!(matches!(
            outcome.receiver,
            Err(ServerError::KeepAliveTimeout(_))
        ));
        drop(client);
    }
}
