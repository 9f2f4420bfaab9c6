use crate::error::{DrumError, Result};
use crate::protocol;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top level settings for a device running one or both transports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrumConfig {
    pub attribute: AttributeConfig,
    pub session: SessionConfig,
    /// Capacity of each transport's hit broadcast channel
    pub hit_channel_capacity: usize,
}

impl Default for DrumConfig {
    fn default() -> Self {
        Self {
            attribute: AttributeConfig::default(),
            session: SessionConfig::default(),
            hit_channel_capacity: 100,
        }
    }
}

impl DrumConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, attribute: AttributeConfig) -> Self {
        self.attribute = attribute;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn with_hit_channel_capacity(mut self, capacity: usize) -> Self {
        self.hit_channel_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.hit_channel_capacity == 0 {
            return Err(DrumError::InvalidConfig("hit_channel_capacity cannot be 0".to_string()));
        }
        self.session.validate()
    }
}

/// Attribute transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeConfig {
    /// Advertisements weaker than this (dBm) are ignored
    pub min_rssi: i16,
}

impl Default for AttributeConfig {
    fn default() -> Self {
        Self {
            min_rssi: protocol::MIN_RSSI,
        }
    }
}

impl AttributeConfig {
    pub fn with_min_rssi(mut self, rssi: i16) -> Self {
        self.min_rssi = rssi;
        self
    }
}

/// Session transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub service_type: String,
    pub stream_name: String,
    pub sender_name: String,
    pub receiver_name: String,
    pub invitation_timeout_secs: u64,
    pub read_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            service_type: protocol::SERVICE_TYPE.to_string(),
            stream_name: protocol::STREAM_NAME.to_string(),
            sender_name: protocol::SENDER_NAME.to_string(),
            receiver_name: protocol::RECEIVER_NAME.to_string(),
            invitation_timeout_secs: protocol::INVITATION_TIMEOUT.as_secs(),
            read_buffer_size: protocol::READ_BUFFER_SIZE,
        }
    }
}

impl SessionConfig {
    pub fn invitation_timeout(&self) -> Duration {
        Duration::from_secs(self.invitation_timeout_secs)
    }

    pub fn with_invitation_timeout_secs(mut self, secs: u64) -> Self {
        self.invitation_timeout_secs = secs;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            return Err(DrumError::InvalidConfig("read_buffer_size cannot be 0".to_string()));
        }
        if self.sender_name == self.receiver_name {
            return Err(DrumError::InvalidConfig(
                "sender and receiver identities must differ".to_string(),
            ));
        }
        // Service types are limited to 15 lowercase ASCII letters, digits and hyphens
        let service_ok = !self.service_type.is_empty()
            && self.service_type.len() <= 15
            && self
                .service_type
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !service_ok {
            return Err(DrumError::InvalidConfig(format!(
                "invalid service type {:?}",
                self.service_type
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_wire_constants() {
        let config = DrumConfig::default();
        assert_eq!(config.attribute.min_rssi, -100);
        assert_eq!(config.session.service_type, "kysor-drums");
        assert_eq!(config.session.stream_name, "drum-stream");
        assert_eq!(config.session.invitation_timeout(), Duration::from_secs(10));
        assert_eq!(config.session.read_buffer_size, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(DrumConfig::new().with_hit_channel_capacity(0).validate().is_err());
        assert!(SessionConfig::default().with_read_buffer_size(0).validate().is_err());

        let mut session = SessionConfig::default();
        session.service_type = "Not_Valid".to_string();
        assert!(session.validate().is_err());

        let mut session = SessionConfig::default();
        session.receiver_name = session.sender_name.clone();
        assert!(session.validate().is_err());
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: DrumConfig =
            serde_json::from_str(r#"{ "attribute": { "min_rssi": -70 } }"#).unwrap();
        assert_eq!(config.attribute.min_rssi, -70);
        assert_eq!(config.session.receiver_name, "drum-brain");
        assert_eq!(config.hit_channel_capacity, 100);
    }
}
