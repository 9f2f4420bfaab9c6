use super::{AttributeEvent, PeerId, PeripheralRadio, ServiceDefinition};
use crate::diagnostics::Diagnostics;
use crate::error::{DrumError, Result};
use crate::instrument::InstrumentId;
use crate::protocol;
use crate::radio::RadioState;
use crate::registry::{self, SERVICE_UUID};

/// Broadcast state of the peripheral role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralState {
    /// Radio not ready
    Idle,
    /// Service registered, not broadcasting
    Ready,
    /// Service registered and broadcast to centrals
    Advertising,
}

/// Advertising role: exposes one attribute per instrument and notifies hits on it
pub struct Peripheral {
    radio: Box<dyn PeripheralRadio>,
    service: ServiceDefinition,
    radio_state: RadioState,
    state: PeripheralState,
    service_registered: bool,
    registration_error: Option<String>,
    connected_central: Option<PeerId>,
    diagnostics: Diagnostics,
}

impl Peripheral {
    /// Idle peripheral; the service is registered once the radio is ready
    pub fn new(radio: Box<dyn PeripheralRadio>) -> Self {
        Self {
            radio,
            service: ServiceDefinition::drum_kit(),
            radio_state: RadioState::Unknown,
            state: PeripheralState::Idle,
            service_registered: false,
            registration_error: None,
            connected_central: None,
            diagnostics: Diagnostics::default(),
        }
    }

    /// Broadcast state of the role
    pub fn state(&self) -> PeripheralState {
        self.state
    }

    /// Last radio state reported by the platform
    pub fn radio_state(&self) -> RadioState {
        self.radio_state
    }

    pub fn is_advertising(&self) -> bool {
        self.state == PeripheralState::Advertising
    }

    /// The drum service this role registers
    pub fn service(&self) -> &ServiceDefinition {
        &self.service
    }

    /// Most recent central to subscribe; informational only
    pub fn connected_central(&self) -> Option<PeerId> {
        self.connected_central
    }

    /// Platform reason the last service registration was rejected, if it was
    pub fn registration_error(&self) -> Option<&str> {
        self.registration_error.as_deref()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Feed one platform callback into the state machine
    pub fn handle(&mut self, event: AttributeEvent) {
        match event {
            AttributeEvent::RadioStateChanged(state) => self.on_radio_state(state),
            AttributeEvent::ServiceAdded { service, error } => {
                if let Some(error) = error {
                    tracing::error!("Failed to register service {}: {}", service, error);
                    self.service_registered = false;
                    self.registration_error = Some(error);
                    if self.state == PeripheralState::Advertising {
                        self.radio.stop_advertising();
                    }
                    self.state = PeripheralState::Idle;
                } else {
                    tracing::debug!("Service {} registered", service);
                }
            }
            AttributeEvent::AdvertisingStarted { error } => match error {
                Some(error) => {
                    tracing::warn!("Advertising failed to start: {}", error);
                    if self.state == PeripheralState::Advertising {
                        self.state = PeripheralState::Ready;
                    }
                }
                None => tracing::info!("Advertising drum service {}", SERVICE_UUID),
            },
            AttributeEvent::CentralSubscribed { central, attribute } => {
                tracing::info!("Central {} subscribed to {}", central, attribute);
                self.connected_central = Some(central);
            }
            AttributeEvent::CentralUnsubscribed { central, attribute } => {
                tracing::info!("Central {} unsubscribed from {}", central, attribute);
                if self.connected_central == Some(central) {
                    self.connected_central = None;
                }
            }
            other => {
                tracing::trace!("Peripheral ignoring central event {:?}", other);
            }
        }
    }

    /// Start or stop broadcasting; the registered service is kept either way
    pub fn toggle_advertising(&mut self, on: bool) -> Result<()> {
        if self.state == PeripheralState::Idle {
            return Err(self.unavailable());
        }

        match (on, self.state) {
            (true, PeripheralState::Ready) => {
                self.radio.start_advertising(SERVICE_UUID);
                self.state = PeripheralState::Advertising;
            }
            (false, PeripheralState::Advertising) => {
                self.radio.stop_advertising();
                self.state = PeripheralState::Ready;
                tracing::info!("Advertising stopped");
            }
            _ => {}
        }
        Ok(())
    }

    /// Notify every subscribed central of a hit on `instrument`
    ///
    /// A refused notification is reported but leaves the role running.
    pub fn send_hit(&mut self, instrument: InstrumentId) -> Result<()> {
        if self.state == PeripheralState::Idle {
            self.diagnostics.send_failures += 1;
            return Err(self.unavailable());
        }

        let attribute = registry::attribute_uuid(instrument);
        if self.radio.update_value(attribute, protocol::encode_attribute_hit()) {
            tracing::debug!("Sent: HIT for {}", instrument);
            self.diagnostics.hits_sent += 1;
            Ok(())
        } else {
            tracing::warn!("Send failed for {}", instrument);
            self.diagnostics.send_failures += 1;
            Err(DrumError::SendFailed(format!("notification queue full for {}", instrument)))
        }
    }

    pub fn shutdown(&mut self) {
        if self.state == PeripheralState::Advertising {
            self.radio.stop_advertising();
        }
        if self.state != PeripheralState::Idle {
            self.state = PeripheralState::Ready;
        }
        tracing::info!("Peripheral shut down");
    }

    /// Why an idle peripheral cannot act
    fn unavailable(&self) -> DrumError {
        match &self.registration_error {
            Some(reason) => DrumError::RegistrationFailed(reason.clone()),
            None => DrumError::TransportUnavailable(self.radio_state),
        }
    }

    fn on_radio_state(&mut self, state: RadioState) {
        self.radio_state = state;
        self.registration_error = None;

        if !state.is_ready() {
            tracing::info!("Radio is {}, waiting for it to become ready", state);
            self.state = PeripheralState::Idle;
            self.service_registered = false;
            self.connected_central = None;
            return;
        }

        tracing::info!("Radio is powered on");
        if self.service_registered {
            return;
        }

        self.radio.add_service(&self.service);
        self.service_registered = true;
        self.state = PeripheralState::Ready;

        self.radio.start_advertising(SERVICE_UUID);
        self.state = PeripheralState::Advertising;
    }
}
