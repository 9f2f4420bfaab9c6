use crate::error::{DrumError, Result};
use crate::instrument::InstrumentId;
use futures_util::stream::{self, Stream};
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Remote endpoint a hit came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeerRef {
    /// Peripheral identifier on the attribute transport
    Attribute(Uuid),
    /// Display name of the session counterpart
    Session(String),
}

impl fmt::Display for PeerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute(id) => write!(f, "peripheral {}", id),
            Self::Session(name) => write!(f, "peer {}", name),
        }
    }
}

/// Where a hit originated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Button press or motion trigger on this device
    Local,
    /// Decoded from a transport
    Remote(PeerRef),
}

/// One drum strike
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitEvent {
    pub instrument: InstrumentId,
    pub origin: Origin,
}

impl HitEvent {
    pub fn local(instrument: InstrumentId) -> Self {
        Self {
            instrument,
            origin: Origin::Local,
        }
    }

    pub fn remote(instrument: InstrumentId, peer: PeerRef) -> Self {
        Self {
            instrument,
            origin: Origin::Remote(peer),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.origin, Origin::Local)
    }
}

/// Receiver for hits published by a transport
pub struct HitReceiver {
    rx: broadcast::Receiver<HitEvent>,
}

impl HitReceiver {
    pub(crate) fn new(rx: broadcast::Receiver<HitEvent>) -> Self {
        Self { rx }
    }

    /// Receive the next hit
    ///
    /// Fails with `ChannelClosed` once the transport task has exited.
    pub async fn recv(&mut self) -> Result<HitEvent> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => DrumError::ChannelClosed,
            broadcast::error::RecvError::Lagged(n) => {
                DrumError::ChannelError(format!("Lagged by {} hits", n))
            }
        })
    }

    /// Try to receive a hit without waiting
    ///
    /// Returns `None` if no hit is pending.
    pub fn try_recv(&mut self) -> Result<Option<HitEvent>> {
        match self.rx.try_recv() {
            Ok(hit) => Ok(Some(hit)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(DrumError::ChannelClosed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                Err(DrumError::ChannelError(format!("Lagged by {} hits", n)))
            }
        }
    }

    /// Turn the receiver into a stream that skips over lag and ends on close
    pub fn into_stream(self) -> impl Stream<Item = HitEvent> + Send + Unpin + 'static {
        Box::pin(stream::unfold(self, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(hit) => return Some((hit, receiver)),
                    Err(DrumError::ChannelError(msg)) => {
                        tracing::warn!("Hit receiver fell behind: {}", msg);
                    }
                    Err(_) => return None,
                }
            }
        }))
    }
}
