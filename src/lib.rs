//! # mqframe
//!
//! Per-connection framing and codec engine for an MQTT-style broker.
//!
//! Each accepted connection gets an inbound and an outbound byte ring. A
//! receiver loop fills the inbound ring from the transport and a sender loop
//! drains the outbound ring into it, while the application pulls whole
//! packets out with a [`FrameReader`] and pushes them in with
//! [`Connection::write_packet`].
//!
//! ```no_run
//! use mqframe::{Connection, ConnectionConfig, Packet, Pingresp, ServerError, Transport};
//!
//! async fn serve(stream: tokio::net::TcpStream) -> Result<(), ServerError> {
//!     let (conn, mut reader) = Connection::new(&ConnectionConfig::default());
//!     let pump = conn.start(Transport::Stream(stream))?;
//!
//!     while let Ok(packet) = reader.next_packet().await {
//!         if let Packet::Pingreq(_) = packet {
//!             conn.write_packet(&Pingresp.into()).await?;
//!         }
//!     }
//!
//!     conn.close();
//!     pump.join().await;
//!     Ok(())
//! }
//! ```

pub use mqframe_buffer as buffer;
pub use mqframe_protocol as protocol;
pub use mqframe_server as server;

pub use mqframe_buffer::{BufferError, BufferPort, RingBuffer};
pub use mqframe_protocol::{
    Connack, ConnackCode, Connect, Disconnect, FrameSize, Packet, PacketType, Pingreq, Pingresp,
    ProtocolError, Puback, Pubcomp, Publish, Pubrec, Pubrel, QoS, Suback, Subscribe, Unsuback,
    Unsubscribe,
};
pub use mqframe_server::{
    init_tracing, Config, Connection, ConnectionConfig, FrameReader, FrameWriter, LoopState,
    PumpHandle, PumpOutcome, ReadDeadline, ServerError, Transport,
};
