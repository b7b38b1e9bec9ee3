//! Transport capability model.
//!
//! A connection runs over exactly one transport kind. Byte streams are fully
//! supported; message-framed transports are recognised but rejected by both
//! pump loops.

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};

/// A message-oriented transport (e.g. websocket frames) that cannot be
/// pumped as a byte stream.
pub trait MessageTransport: Send {
    /// Short name used in logs and errors.
    fn kind(&self) -> &'static str;
}

/// The transport a connection was accepted on.
pub enum Transport<S> {
    /// Raw byte stream (TCP, TLS, unix socket, in-memory duplex).
    Stream(S),
    /// Message-framed transport. Not supported.
    Framed(Box<dyn MessageTransport>),
}

impl<S> Transport<S> {
    pub fn kind(&self) -> &'static str {
        match self {
            Transport::Stream(_) => "stream",
            Transport::Framed(framed) => framed.kind(),
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Transport::Stream(_))
    }
}

impl<S> std::fmt::Debug for Transport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Transport").field(&self.kind()).finish()
    }
}

/// One direction of a transport, as handed to a pump loop.
pub(crate) enum Half<H> {
    Stream(H),
    Framed(&'static str),
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Splits into the receiver's and sender's halves.
    pub(crate) fn split(self) -> (Half<ReadHalf<S>>, Half<WriteHalf<S>>) {
        match self {
            Transport::Stream(stream) => {
                let (read, write) = tokio::io::split(stream);
                (Half::Stream(read), Half::Stream(write))
            }
            Transport::Framed(framed) => {
                let kind = framed.kind();
                (Half::Framed(kind), Half::Framed(kind))
            }
        }
    }
}
