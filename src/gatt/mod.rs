//! Attribute transport: hits exchanged as notifications on per-instrument attributes.
//!
//! A device runs one of two roles. The central scans for the drum service,
//! connects to every peripheral it finds, and subscribes to each instrument
//! attribute. The peripheral registers the service and notifies subscribers
//! with the `"HIT"` sentinel. Both roles are plain state machines: the platform
//! adapter injects [`AttributeEvent`]s and receives requests through the
//! [`CentralRadio`] / [`PeripheralRadio`] seams.

mod central;
mod peripheral;

pub use central::{Central, CentralState, PeerConnection, PeerState};
pub use peripheral::{Peripheral, PeripheralState};

use crate::diagnostics::Diagnostics;
use crate::driver::HitTransport;
use crate::error::{DrumError, Result};
use crate::event::HitEvent;
use crate::instrument::InstrumentId;
use crate::radio::RadioState;
use crate::registry::{self, SERVICE_UUID};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform identifier of a remote peripheral or central
pub type PeerId = Uuid;

/// Requests the central role makes of the platform radio
///
/// Implementations must only queue the request; completion is reported back
/// as an [`AttributeEvent`].
pub trait CentralRadio: Send {
    fn scan_for_service(&mut self, service: Uuid);
    fn stop_scan(&mut self);
    fn connect(&mut self, peer: PeerId);
    fn cancel_connection(&mut self, peer: PeerId);
    fn discover_services(&mut self, peer: PeerId, services: &[Uuid]);
    fn discover_attributes(&mut self, peer: PeerId, service: Uuid, attributes: &[Uuid]);
    fn set_notify(&mut self, peer: PeerId, attribute: Uuid, enabled: bool);
}

/// Requests the peripheral role makes of the platform radio
pub trait PeripheralRadio: Send {
    fn add_service(&mut self, service: &ServiceDefinition);
    fn start_advertising(&mut self, service: Uuid);
    fn stop_advertising(&mut self);
    /// Push `value` to every central subscribed to `attribute`; false if the
    /// platform's transmit queue refused it
    fn update_value(&mut self, attribute: Uuid, value: &[u8]) -> bool;
}

/// Attribute capabilities advertised to centrals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeProperties {
    pub notify: bool,
    pub write_without_response: bool,
}

/// Access granted on an attribute's value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributePermissions {
    pub readable: bool,
    pub writeable: bool,
}

/// One attribute registered by the peripheral
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub uuid: Uuid,
    pub instrument: InstrumentId,
    pub properties: AttributeProperties,
    pub permissions: AttributePermissions,
}

/// Service registered by the peripheral
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub uuid: Uuid,
    pub primary: bool,
    pub attributes: Vec<AttributeDefinition>,
}

impl ServiceDefinition {
    /// The drum service: one notify/write-without-response attribute per instrument
    pub fn drum_kit() -> Self {
        let attributes = registry::all()
            .map(|instrument| AttributeDefinition {
                uuid: registry::attribute_uuid(instrument),
                instrument,
                properties: AttributeProperties {
                    notify: true,
                    write_without_response: true,
                },
                permissions: AttributePermissions {
                    readable: true,
                    writeable: true,
                },
            })
            .collect();

        Self {
            uuid: SERVICE_UUID,
            primary: true,
            attributes,
        }
    }
}

/// Callback from the platform radio, already detached from its runtime object
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeEvent {
    /// Radio power or authorization changed (both roles)
    RadioStateChanged(RadioState),

    /// An advertiser was seen while scanning
    PeripheralDiscovered {
        peer: PeerId,
        rssi: i16,
        services: Vec<Uuid>,
    },
    Connected {
        peer: PeerId,
    },
    ConnectFailed {
        peer: PeerId,
        reason: String,
    },
    Disconnected {
        peer: PeerId,
        reason: Option<String>,
    },
    ServicesDiscovered {
        peer: PeerId,
        result: std::result::Result<Vec<Uuid>, String>,
    },
    AttributesDiscovered {
        peer: PeerId,
        service: Uuid,
        result: std::result::Result<Vec<Uuid>, String>,
    },
    /// Subscribe or unsubscribe completed, or the remote side changed it
    NotificationStateChanged {
        peer: PeerId,
        attribute: Uuid,
        notifying: bool,
        error: Option<String>,
    },
    ServicesInvalidated {
        peer: PeerId,
        services: Vec<Uuid>,
    },
    /// Notification payload arrived
    ValueUpdated {
        peer: PeerId,
        attribute: Uuid,
        value: std::result::Result<Vec<u8>, String>,
    },

    /// Service registration completed (peripheral)
    ServiceAdded {
        service: Uuid,
        error: Option<String>,
    },
    AdvertisingStarted {
        error: Option<String>,
    },
    CentralSubscribed {
        central: PeerId,
        attribute: Uuid,
    },
    CentralUnsubscribed {
        central: PeerId,
        attribute: Uuid,
    },
}

/// Role specific requests routed through the transport task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeControl {
    /// Start or stop broadcasting without unregistering the service (peripheral)
    ToggleAdvertising(bool),
    /// Unsubscribe from and release one peer (central)
    Disconnect(PeerId),
    /// Unsubscribe from and release every known peer (central)
    Cleanup,
}

/// Attribute transport in one of its two roles, chosen at construction
pub enum AttributeTransport {
    /// Scans for drums and receives their hits
    Central(Central),
    /// Serves the drum service and notifies hits
    Peripheral(Peripheral),
}

impl AttributeTransport {
    /// `"central"` or `"peripheral"`, as used in role errors and logs
    pub fn role_name(&self) -> &'static str {
        match self {
            Self::Central(_) => "central",
            Self::Peripheral(_) => "peripheral",
        }
    }

    /// Feed one platform callback into the state machine
    pub fn handle(&mut self, event: AttributeEvent) {
        match self {
            Self::Central(central) => central.handle(event),
            Self::Peripheral(peripheral) => peripheral.handle(event),
        }
    }

    /// Notify subscribers of a local hit (peripheral only)
    pub fn send_hit(&mut self, instrument: InstrumentId) -> Result<()> {
        match self {
            Self::Central(_) => Err(DrumError::WrongRole("central")),
            Self::Peripheral(peripheral) => peripheral.send_hit(instrument),
        }
    }

    /// Apply a host request; requests meant for the other role fail with
    /// [`DrumError::WrongRole`]
    pub fn control(&mut self, control: AttributeControl) -> Result<()> {
        match (self, control) {
            (Self::Peripheral(peripheral), AttributeControl::ToggleAdvertising(on)) => {
                peripheral.toggle_advertising(on)
            }
            (Self::Central(central), AttributeControl::Disconnect(peer)) => central.disconnect(peer),
            (Self::Central(central), AttributeControl::Cleanup) => {
                central.cleanup();
                Ok(())
            }
            (Self::Peripheral(_), _) => Err(DrumError::WrongRole("peripheral")),
            (Self::Central(_), _) => Err(DrumError::WrongRole("central")),
        }
    }

    /// Hits decoded since the last call
    pub fn drain_hits(&mut self) -> Vec<HitEvent> {
        match self {
            Self::Central(central) => central.drain_hits(),
            Self::Peripheral(_) => Vec::new(),
        }
    }

    /// Release everything the role holds on the radio
    pub fn shutdown(&mut self) {
        match self {
            Self::Central(central) => central.shutdown(),
            Self::Peripheral(peripheral) => peripheral.shutdown(),
        }
    }

    pub fn diagnostics(&self) -> Diagnostics {
        match self {
            Self::Central(central) => central.diagnostics().clone(),
            Self::Peripheral(peripheral) => peripheral.diagnostics().clone(),
        }
    }
}

impl HitTransport for AttributeTransport {
    type Event = AttributeEvent;
    type Control = AttributeControl;

    fn name(&self) -> &'static str {
        match self {
            Self::Central(_) => "attribute central",
            Self::Peripheral(_) => "attribute peripheral",
        }
    }

    fn handle(&mut self, event: AttributeEvent) {
        AttributeTransport::handle(self, event)
    }

    fn control(&mut self, control: AttributeControl) -> Result<()> {
        AttributeTransport::control(self, control)
    }

    fn send_hit(&mut self, instrument: InstrumentId) -> Result<()> {
        AttributeTransport::send_hit(self, instrument)
    }

    fn drain_hits(&mut self) -> Vec<HitEvent> {
        AttributeTransport::drain_hits(self)
    }

    fn diagnostics(&self) -> Diagnostics {
        AttributeTransport::diagnostics(self)
    }

    fn shutdown(&mut self) {
        AttributeTransport::shutdown(self)
    }
}

impl From<Central> for AttributeTransport {
    fn from(central: Central) -> Self {
        Self::Central(central)
    }
}

impl From<Peripheral> for AttributeTransport {
    fn from(peripheral: Peripheral) -> Self {
        Self::Peripheral(peripheral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drum_kit_service_covers_every_instrument() {
        let service = ServiceDefinition::drum_kit();
        assert_eq!(service.uuid, SERVICE_UUID);
        assert!(service.primary);
        assert_eq!(service.attributes.len(), InstrumentId::COUNT);

        for (attribute, instrument) in service.attributes.iter().zip(InstrumentId::all()) {
            assert_eq!(attribute.instrument, instrument);
            assert_eq!(attribute.uuid, registry::attribute_uuid(instrument));
            assert!(attribute.properties.notify);
            assert!(attribute.properties.write_without_response);
            assert!(attribute.permissions.readable);
            assert!(attribute.permissions.writeable);
        }
    }
}
