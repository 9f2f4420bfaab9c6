use crate::radio::RadioState;
use thiserror::Error;
use uuid::Uuid;

/// Result type for drum link operations
pub type Result<T> = std::result::Result<T, DrumError>;

/// Errors that can occur while moving hits between devices
#[derive(Error, Debug)]
pub enum DrumError {
    /// The radio or session layer is not ready; wait for it rather than retrying
    #[error("Transport unavailable: radio is {0}")]
    TransportUnavailable(RadioState),

    /// The platform rejected the drum service; the role stays down until the
    /// radio reports ready again
    #[error("Service registration failed: {0}")]
    RegistrationFailed(String),

    /// Connecting to a discovered peer failed
    #[error("Connect to {peer} failed: {reason}")]
    ConnectFailed {
        /// Peer that could not be reached
        peer: String,
        /// Platform supplied reason
        reason: String,
    },

    /// Service or attribute discovery on a connected peer failed
    #[error("Discovery on {peer} failed: {reason}")]
    DiscoveryFailed {
        /// Peer being discovered
        peer: String,
        /// Platform supplied reason
        reason: String,
    },

    /// A payload or wire identifier could not be mapped to an instrument
    #[error("Decode mismatch: {0}")]
    DecodeMismatch(String),

    /// The remote side stopped notifying on a subscribed attribute
    #[error("Subscription to {attribute} revoked by {peer}")]
    SubscriptionRevoked {
        /// Peer that revoked the subscription
        peer: String,
        /// Attribute that stopped notifying
        attribute: Uuid,
    },

    /// No instrument is bound to the given wire identifier
    #[error("Unknown wire identifier: {0}")]
    UnknownWireIdentifier(String),

    /// No peer or stream is currently available to carry a hit
    #[error("Not connected")]
    NotConnected,

    /// The operation is not meaningful for the transport's role
    #[error("Operation not supported by the {0} role")]
    WrongRole(&'static str),

    /// The platform refused to queue an outgoing hit
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// I/O error on a session byte stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport task is gone
    #[error("Channel closed")]
    ChannelClosed,

    /// Channel receive error
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DrumError {
    /// True for failures that narrow to a single peer or event and are only reported
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. }
                | Self::DiscoveryFailed { .. }
                | Self::DecodeMismatch(_)
                | Self::SubscriptionRevoked { .. }
                | Self::UnknownWireIdentifier(_)
        )
    }
}
