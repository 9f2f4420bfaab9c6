//! Wire constants and payload codecs for both transports.

use crate::error::{DrumError, Result};
use crate::instrument::InstrumentId;
use crate::registry::{self, TransportKind, WireIdentifier};
use std::time::Duration;
use uuid::Uuid;

/// Notification payload marking a hit on an attribute
pub const HIT_SENTINEL: &[u8] = b"HIT";

/// Service type advertised and browsed by the session transport
pub const SERVICE_TYPE: &str = "kysor-drums";

/// Name of the byte stream the sender opens toward the receiver
pub const STREAM_NAME: &str = "drum-stream";

/// Identity of the session role that produces hits
pub const SENDER_NAME: &str = "drum";

/// Identity of the session role that plays hits
pub const RECEIVER_NAME: &str = "drum-brain";

/// How long an invitation waits for the remote side
pub const INVITATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on one inbound stream read
pub const READ_BUFFER_SIZE: usize = 1024;

/// Weakest advertisement signal still worth connecting to (dBm)
pub const MIN_RSSI: i16 = -100;

/// Payload pushed on an instrument attribute for each hit
pub fn encode_attribute_hit() -> &'static [u8] {
    HIT_SENTINEL
}

/// Decode a notification received on `attribute`
///
/// Returns `Ok(Some(_))` for the hit sentinel, `Ok(None)` for any other payload
/// (reserved for future messages) and an error when the attribute is not bound
/// to an instrument.
pub fn decode_attribute_notification(attribute: Uuid, payload: &[u8]) -> Result<Option<InstrumentId>> {
    let instrument = registry::instrument_for(&WireIdentifier::Attribute(attribute), TransportKind::Attribute)?;

    if payload == HIT_SENTINEL {
        Ok(Some(instrument))
    } else {
        Ok(None)
    }
}

/// Encode a hit for the session stream: decimal text of the instrument position
///
/// No delimiter or length prefix is added. Two writes landing in the same read
/// decode as one concatenated number.
pub fn encode_session_hit(instrument: InstrumentId) -> Vec<u8> {
    instrument.position().to_string().into_bytes()
}

/// Decode one drained chunk of the session stream
pub fn decode_session_payload(bytes: &[u8]) -> Result<InstrumentId> {
    let text = String::from_utf8_lossy(bytes);
    let value: i64 = text
        .parse()
        .map_err(|_| DrumError::DecodeMismatch(format!("unparseable session payload {:?}", text)))?;

    registry::instrument_for(&WireIdentifier::Session(value), TransportKind::Session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::attribute_uuid;

    #[test]
    fn test_hit_on_attribute_yields_its_instrument() {
        for instrument in InstrumentId::all() {
            let decoded = decode_attribute_notification(attribute_uuid(instrument), b"HIT").unwrap();
            assert_eq!(decoded, Some(instrument));
        }
    }

    #[test]
    fn test_other_attribute_payloads_are_ignored() {
        let attr = attribute_uuid(InstrumentId::Snare);
        assert_eq!(decode_attribute_notification(attr, b"hit").unwrap(), None);
        assert_eq!(decode_attribute_notification(attr, b"HITS").unwrap(), None);
        assert_eq!(decode_attribute_notification(attr, b"").unwrap(), None);
    }

    #[test]
    fn test_unknown_attribute_is_a_decode_error() {
        let err = decode_attribute_notification(Uuid::from_u128(42), b"HIT").unwrap_err();
        assert!(err.is_diagnostic());
    }

    #[test]
    fn test_session_encoding_is_decimal_position() {
        assert_eq!(encode_session_hit(InstrumentId::HiHat), b"0");
        assert_eq!(encode_session_hit(InstrumentId::Ride), b"2");
        assert_eq!(encode_session_hit(InstrumentId::Kick), b"6");
    }

    #[test]
    fn test_session_decoding() {
        assert_eq!(decode_session_payload(b"2").unwrap(), InstrumentId::Ride);
        assert!(decode_session_payload(b"99").is_err());
        assert!(decode_session_payload(b"abc").is_err());
        assert!(decode_session_payload(b"").is_err());
        assert!(decode_session_payload(b"-1").is_err());
    }

    #[test]
    fn test_merged_session_writes_do_not_decode_as_either_hit() {
        // "3" followed by "4" in one read
        let mut merged = encode_session_hit(InstrumentId::Snare);
        merged.extend(encode_session_hit(InstrumentId::RackTom));
        assert!(decode_session_payload(&merged).is_err());
    }
}
