//! # mqframe-server
//!
//! Per-connection framing engine for mqframe.
//!
//! This crate provides:
//! - Frame sizing and acquisition over the inbound ring (peek or consume)
//! - Serialised frame encoding into the outbound ring
//! - The receiver/sender pump between a transport and the rings
//! - Configuration loading and logging setup

pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod pump;
pub mod reader;
pub mod transport;
pub mod writer;

pub use config::{Config, ConfigError, ConnectionConfig, LoggingConfig, ReadDeadline};
pub use connection::{Connection, LoopState};
pub use error::ServerError;
pub use logging::init_tracing;
pub use pump::{PumpHandle, PumpOutcome};
pub use reader::FrameReader;
pub use transport::{MessageTransport, Transport};
pub use writer::FrameWriter;
