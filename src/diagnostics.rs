use serde::{Deserialize, Serialize};

/// Failure counters kept by each transport
///
/// Nothing here affects behavior; every counted failure has already been
/// narrowed to one dropped peer or event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Hits decoded and published
    pub hits_received: u64,
    /// Hits handed to the platform successfully
    pub hits_sent: u64,
    /// Payloads or identifiers that mapped to no instrument
    pub decode_mismatches: u64,
    /// Connection attempts that failed, including failed discovery
    pub connect_failures: u64,
    /// Subscriptions the remote side dropped
    pub subscriptions_revoked: u64,
    /// Outgoing hits refused or dropped
    pub send_failures: u64,
}
