//! Instrument registry: canonical kit order and the wire identifiers bound to it.
//!
//! Both transports translate instruments through this module and nothing else,
//! so the mapping stays a bijection per transport on every device.

use crate::error::{DrumError, Result};
use crate::instrument::InstrumentId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Well-known service advertised by every peripheral
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x3DD807AC_6B32_4848_8DFD_CF92B1926A85);

/// Attribute identifiers, indexed by instrument position
pub const ATTRIBUTE_UUIDS: [Uuid; InstrumentId::COUNT] = [
    Uuid::from_u128(0x2288FC6A_9AB2_4853_AA93_138250725F43),
    Uuid::from_u128(0x75E78103_0866_43C0_9998_EF92490B13D8),
    Uuid::from_u128(0x6371647F_EC4C_4558_8B6C_87CB9B9A95A6),
    Uuid::from_u128(0xBDD93F3E_467B_4A9B_AB94_FE46C4409311),
    Uuid::from_u128(0xB56150C3_76BF_40E7_A3A5_90175C47AAD1),
    Uuid::from_u128(0x2F396A7C_2123_476C_8120_B6FDE67163DD),
    Uuid::from_u128(0xAAB15FE1_2968_40F6_BD38_6E7940796CB7),
];

/// Transport family a wire identifier belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Attribute server and client over the radio
    Attribute,
    /// Peer session with a byte stream
    Session,
}

/// Transport specific token naming one instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireIdentifier {
    /// 128-bit attribute identifier
    Attribute(Uuid),
    /// Integer position carried as decimal text
    Session(i64),
}

impl WireIdentifier {
    /// Transport family this identifier travels on
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Attribute(_) => TransportKind::Attribute,
            Self::Session(_) => TransportKind::Session,
        }
    }
}

impl fmt::Display for WireIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute(uuid) => write!(f, "attribute {}", uuid),
            Self::Session(value) => write!(f, "session {}", value),
        }
    }
}

/// The kit in canonical order
pub fn all() -> impl Iterator<Item = InstrumentId> + Clone {
    InstrumentId::all()
}

/// Wire identifier for `instrument` on the given transport
pub fn wire_id_for(instrument: InstrumentId, kind: TransportKind) -> WireIdentifier {
    match kind {
        TransportKind::Attribute => WireIdentifier::Attribute(ATTRIBUTE_UUIDS[instrument.position()]),
        TransportKind::Session => WireIdentifier::Session(instrument.position() as i64),
    }
}

/// Attribute identifier bound to `instrument`
pub fn attribute_uuid(instrument: InstrumentId) -> Uuid {
    ATTRIBUTE_UUIDS[instrument.position()]
}

/// Instrument bound to `wire` on the given transport
///
/// A kind mismatch or an unknown token yields `UnknownWireIdentifier`; callers
/// treat it as a dropped event, never as a fatal error.
pub fn instrument_for(wire: &WireIdentifier, kind: TransportKind) -> Result<InstrumentId> {
    if wire.kind() != kind {
        return Err(DrumError::UnknownWireIdentifier(wire.to_string()));
    }

    let found = match wire {
        WireIdentifier::Attribute(uuid) => ATTRIBUTE_UUIDS
            .iter()
            .position(|candidate| candidate == uuid)
            .and_then(InstrumentId::from_position),
        WireIdentifier::Session(value) => usize::try_from(*value)
            .ok()
            .and_then(InstrumentId::from_position),
    };

    found.ok_or_else(|| DrumError::UnknownWireIdentifier(wire.to_string()))
}

/// Whether `uuid` is one of the instrument attributes
pub fn is_instrument_attribute(uuid: &Uuid) -> bool {
    ATTRIBUTE_UUIDS.contains(uuid)
}
