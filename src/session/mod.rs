//! Session transport: peer discovery, an accept-all session, and one byte stream.
//!
//! The two roles are fixed. The sender advertises itself and accepts every
//! invitation; once connected it opens the named stream toward the receiver
//! and writes one decimal instrument position per hit. The receiver browses,
//! invites whatever it finds, and reads the stream it is handed.

mod transport;

pub use transport::{PeerSession, SessionPhase, SessionTransport};

use futures_util::task::noop_waker_ref;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Which side of the fixed two-role session this device plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Advertises, accepts invitations, writes hits
    Sender,
    /// Browses, invites, reads hits
    Receiver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => f.write_str("sender"),
            Self::Receiver => f.write_str("receiver"),
        }
    }
}

/// Write half of the stream the sender opens
///
/// The transport only ever polls it once per hit and never waits on it.
pub type OutboundStream = Box<dyn AsyncWrite + Send + Unpin>;

/// Write `payload` without waiting
///
/// Fails with `WouldBlock` when the stream cannot take the bytes right now;
/// the caller drops the hit.
pub(crate) fn try_write_all(stream: &mut OutboundStream, mut payload: &[u8]) -> io::Result<()> {
    let mut cx = Context::from_waker(noop_waker_ref());

    while !payload.is_empty() {
        match Pin::new(&mut **stream).poll_write(&mut cx, payload) {
            Poll::Ready(Ok(0)) => return Err(io::ErrorKind::WriteZero.into()),
            Poll::Ready(Ok(written)) => payload = &payload[written..],
            Poll::Ready(Err(e)) => return Err(e),
            Poll::Pending => return Err(io::ErrorKind::WouldBlock.into()),
        }
    }

    // A flush still pending here is carried by the next write
    let _ = Pin::new(&mut **stream).poll_flush(&mut cx);
    Ok(())
}

/// Read half handed to the receiver by the platform
pub struct InboundStream(Box<dyn AsyncRead + Send + Unpin>);

impl InboundStream {
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self(Box::new(reader))
    }

    /// Read whatever is buffered; `Ok(None)` if nothing is ready yet
    pub(crate) fn try_read(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut read_buf = ReadBuf::new(buf);

        match Pin::new(&mut *self.0).poll_read(&mut cx, &mut read_buf) {
            Poll::Ready(Ok(())) => Ok(Some(read_buf.filled().len())),
            Poll::Ready(Err(e)) => Err(e),
            Poll::Pending => Ok(None),
        }
    }
}

impl fmt::Debug for InboundStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InboundStream")
    }
}

/// Connection state reported by the platform session for one peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    NotConnected,
    Connecting,
    Connected,
}

/// Requests the session transport makes of the platform peer-to-peer stack
pub trait SessionLink: Send {
    fn start_advertising(&mut self, identity: &str, service_type: &str);
    fn stop_advertising(&mut self);
    fn start_browsing(&mut self, identity: &str, service_type: &str);
    fn stop_browsing(&mut self);
    /// Invite `peer` into the session; the platform gives up after `timeout`
    fn invite(&mut self, peer: &str, timeout: Duration);
    fn respond_to_invitation(&mut self, from: &str, accept: bool);
    /// Open a named outbound stream toward a connected peer
    fn start_stream(&mut self, name: &str, peer: &str) -> io::Result<OutboundStream>;
}

/// Callback from the platform session stack
#[derive(Debug)]
pub enum SessionEvent {
    /// The browser saw an advertiser
    PeerFound {
        peer: String,
    },
    PeerLost {
        peer: String,
    },
    InvitationReceived {
        from: String,
    },
    SessionStateChanged {
        peer: String,
        state: LinkState,
    },
    /// A peer opened a stream toward us
    StreamReceived {
        name: String,
        from: String,
        stream: InboundStream,
    },
    /// The inbound stream has bytes to read
    BytesAvailable,
    /// Message-mode data; unused by the drum protocol
    DataReceived {
        from: String,
        len: usize,
    },
}

/// Role dispatching discovery requests routed through the transport task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControl {
    StartAdvertising,
    StopAdvertising,
}
