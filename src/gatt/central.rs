use super::{AttributeEvent, CentralRadio, PeerId};
use crate::config::AttributeConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{DrumError, Result};
use crate::event::{HitEvent, PeerRef};
use crate::protocol;
use crate::radio::RadioState;
use crate::registry::{self, ATTRIBUTE_UUIDS, SERVICE_UUID};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Scanning state of the central role as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CentralState {
    /// Radio not ready; nothing is attempted
    Idle,
    /// Powered on and looking for the drum service
    Scanning,
}

/// Lifecycle of one peer, independent of every other peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Connection requested, not yet confirmed
    Connecting,
    /// Connected; service and attribute discovery in flight
    Discovering,
    /// At least one instrument attribute is notifying
    Subscribed,
    /// Release requested; waiting for the platform to confirm
    Disconnecting,
}

/// A discovered peripheral and what we hold on it
#[derive(Debug, Clone)]
pub struct PeerConnection {
    id: PeerId,
    state: PeerState,
    rssi: i16,
    /// Instrument attributes found on the peer, with their notifying flag
    attributes: BTreeMap<Uuid, bool>,
}

impl PeerConnection {
    fn new(id: PeerId, rssi: i16) -> Self {
        Self {
            id,
            state: PeerState::Connecting,
            rssi,
            attributes: BTreeMap::new(),
        }
    }

    /// Platform identifier of the peer
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Where this peer is in its lifecycle
    pub fn state(&self) -> PeerState {
        self.state
    }

    /// Last seen signal strength (dBm)
    pub fn rssi(&self) -> i16 {
        self.rssi
    }

    /// Attributes currently reporting notifications
    pub fn subscribed_attributes(&self) -> Vec<Uuid> {
        self.attributes
            .iter()
            .filter(|(_, notifying)| **notifying)
            .map(|(uuid, _)| *uuid)
            .collect()
    }

    /// Whether the platform last confirmed notifications on `attribute`
    pub fn is_notifying(&self, attribute: &Uuid) -> bool {
        self.attributes.get(attribute).copied().unwrap_or(false)
    }

    /// Every instrument attribute discovered on the peer
    pub fn known_attributes(&self) -> Vec<Uuid> {
        self.attributes.keys().copied().collect()
    }
}

/// Scanning role: finds drum peripherals and turns their notifications into hits
pub struct Central {
    radio: Box<dyn CentralRadio>,
    config: AttributeConfig,
    radio_state: RadioState,
    state: CentralState,
    peers: BTreeMap<PeerId, PeerConnection>,
    hits: Vec<HitEvent>,
    diagnostics: Diagnostics,
}

impl Central {
    /// Idle central; scanning begins once the radio reports powered on
    pub fn new(radio: Box<dyn CentralRadio>, config: AttributeConfig) -> Self {
        Self {
            radio,
            config,
            radio_state: RadioState::Unknown,
            state: CentralState::Idle,
            peers: BTreeMap::new(),
            hits: Vec::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    /// Scanning state of the role
    pub fn state(&self) -> CentralState {
        self.state
    }

    /// Last radio state reported by the platform
    pub fn radio_state(&self) -> RadioState {
        self.radio_state
    }

    /// Look up one known peer
    pub fn peer(&self, peer: &PeerId) -> Option<&PeerConnection> {
        self.peers.get(peer)
    }

    /// Every known peer, ordered by identifier
    pub fn peers(&self) -> impl Iterator<Item = &PeerConnection> {
        self.peers.values()
    }

    /// Number of peers held in any state
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Counters since construction
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Hits decoded since the last call
    pub fn drain_hits(&mut self) -> Vec<HitEvent> {
        std::mem::take(&mut self.hits)
    }

    /// Feed one platform callback into the state machine
    pub fn handle(&mut self, event: AttributeEvent) {
        match event {
            AttributeEvent::RadioStateChanged(state) => self.on_radio_state(state),
            AttributeEvent::PeripheralDiscovered { peer, rssi, services } => {
                self.on_discovered(peer, rssi, &services)
            }
            AttributeEvent::Connected { peer } => self.on_connected(peer),
            AttributeEvent::ConnectFailed { peer, reason } => self.on_connect_failed(peer, reason),
            AttributeEvent::Disconnected { peer, reason } => self.on_disconnected(peer, reason),
            AttributeEvent::ServicesDiscovered { peer, result } => {
                self.on_services_discovered(peer, result)
            }
            AttributeEvent::AttributesDiscovered { peer, service, result } => {
                self.on_attributes_discovered(peer, service, result)
            }
            AttributeEvent::NotificationStateChanged {
                peer,
                attribute,
                notifying,
                error,
            } => self.on_notification_state(peer, attribute, notifying, error),
            AttributeEvent::ServicesInvalidated { peer, services } => {
                self.on_services_invalidated(peer, &services)
            }
            AttributeEvent::ValueUpdated { peer, attribute, value } => {
                self.on_value(peer, attribute, value)
            }
            other => {
                tracing::trace!("Central ignoring peripheral event {:?}", other);
            }
        }
    }

    /// Unsubscribe from and release every known peer
    ///
    /// Only attributes that currently report notifying are unsubscribed. The
    /// call does not wait for the platform to confirm.
    pub fn cleanup(&mut self) {
        let ids: Vec<PeerId> = self.peers.keys().copied().collect();
        for id in ids {
            self.release_peer(id);
        }
    }

    /// Unsubscribe from and release one peer
    pub fn disconnect(&mut self, peer: PeerId) -> Result<()> {
        if !self.peers.contains_key(&peer) {
            return Err(DrumError::NotConnected);
        }
        self.release_peer(peer);
        Ok(())
    }

    /// Stop scanning and release every peer
    pub fn shutdown(&mut self) {
        if self.state == CentralState::Scanning {
            self.radio.stop_scan();
        }
        self.cleanup();
        self.state = CentralState::Idle;
        tracing::info!("Central shut down");
    }

    fn on_radio_state(&mut self, state: RadioState) {
        self.radio_state = state;

        match state {
            RadioState::PoweredOn => {
                tracing::info!("Radio is powered on");
                if self.state != CentralState::Scanning {
                    self.radio.scan_for_service(SERVICE_UUID);
                    self.state = CentralState::Scanning;
                    tracing::info!("Scanning for drum service {}", SERVICE_UUID);
                }
            }
            RadioState::Unauthorized | RadioState::Unsupported => {
                tracing::warn!("Radio is {}, waiting for it to become ready", state);
                self.go_idle();
            }
            _ => {
                tracing::info!("Radio is {}, waiting for it to become ready", state);
                self.go_idle();
            }
        }
    }

    fn go_idle(&mut self) {
        self.state = CentralState::Idle;
        if !self.peers.is_empty() {
            tracing::info!("Forgetting {} peer(s) invalidated by the radio", self.peers.len());
            self.peers.clear();
        }
    }

    fn on_discovered(&mut self, peer: PeerId, rssi: i16, services: &[Uuid]) {
        if self.state != CentralState::Scanning {
            tracing::debug!("Discovered {} while not scanning, ignoring", peer);
            return;
        }

        if !services.contains(&SERVICE_UUID) {
            tracing::debug!("Discovered {} without the drum service, ignoring", peer);
            return;
        }

        // Weak peers are skipped but may be picked up when they come closer
        if rssi < self.config.min_rssi {
            tracing::debug!("Discovered peripheral {} not in expected range, at {}", peer, rssi);
            return;
        }

        if let Some(existing) = self.peers.get_mut(&peer) {
            existing.rssi = rssi;
            return;
        }

        tracing::info!("Discovered {} at {}, connecting", peer, rssi);
        self.peers.insert(peer, PeerConnection::new(peer, rssi));
        self.radio.connect(peer);
    }

    fn on_connect_failed(&mut self, peer: PeerId, reason: String) {
        if self.peers.remove(&peer).is_none() {
            return;
        }

        let err = DrumError::ConnectFailed {
            peer: peer.to_string(),
            reason,
        };
        tracing::warn!("{}", err);
        self.diagnostics.connect_failures += 1;
    }

    fn on_connected(&mut self, peer: PeerId) {
        let Some(connection) = self.peers.get_mut(&peer) else {
            tracing::debug!("Connected to unknown peer {}, releasing", peer);
            self.radio.cancel_connection(peer);
            return;
        };

        if connection.state != PeerState::Connecting {
            tracing::debug!("Ignoring connect for {} in state {:?}", peer, connection.state);
            return;
        }

        tracing::info!("Peripheral {} connected", peer);
        connection.state = PeerState::Discovering;
        self.radio.discover_services(peer, &[SERVICE_UUID]);
    }

    fn on_disconnected(&mut self, peer: PeerId, reason: Option<String>) {
        if self.peers.remove(&peer).is_some() {
            match reason {
                Some(reason) => tracing::info!("Peripheral {} disconnected: {}", peer, reason),
                None => tracing::info!("Peripheral {} disconnected", peer),
            }
        }
    }

    fn on_services_discovered(&mut self, peer: PeerId, result: std::result::Result<Vec<Uuid>, String>) {
        if !self.is_discovering(&peer) {
            return;
        }

        match result {
            Err(reason) => self.discovery_failed(peer, reason),
            Ok(services) => {
                let mut found = false;
                for service in services.into_iter().filter(|s| *s == SERVICE_UUID) {
                    found = true;
                    self.radio.discover_attributes(peer, service, &ATTRIBUTE_UUIDS);
                }
                if !found {
                    tracing::debug!("Peripheral {} does not expose the drum service yet", peer);
                }
            }
        }
    }

    fn on_attributes_discovered(
        &mut self,
        peer: PeerId,
        service: Uuid,
        result: std::result::Result<Vec<Uuid>, String>,
    ) {
        if !self.is_discovering(&peer) {
            return;
        }

        let attributes = match result {
            Ok(attributes) => attributes,
            Err(reason) => {
                self.discovery_failed(peer, reason);
                return;
            }
        };

        let known: Vec<Uuid> = attributes
            .into_iter()
            .filter(registry::is_instrument_attribute)
            .collect();

        if known.len() < ATTRIBUTE_UUIDS.len() {
            tracing::debug!(
                "Peripheral {} exposes {} of {} instrument attributes on {}",
                peer,
                known.len(),
                ATTRIBUTE_UUIDS.len(),
                service
            );
        }

        if let Some(connection) = self.peers.get_mut(&peer) {
            for attribute in known {
                connection.attributes.entry(attribute).or_insert(false);
                self.radio.set_notify(peer, attribute, true);
            }
        }
    }

    fn on_notification_state(&mut self, peer: PeerId, attribute: Uuid, notifying: bool, error: Option<String>) {
        if let Some(error) = error {
            tracing::warn!("Error changing notification state on {} for {}: {}", peer, attribute, error);
            return;
        }

        if !registry::is_instrument_attribute(&attribute) {
            return;
        }

        let Some(connection) = self.peers.get_mut(&peer) else {
            return;
        };

        if let Some(flag) = connection.attributes.get_mut(&attribute) {
            *flag = notifying;
        }

        if connection.state == PeerState::Disconnecting {
            return;
        }

        if notifying {
            tracing::info!("Notification began on {} for {}", attribute, peer);
            connection.state = PeerState::Subscribed;
            return;
        }

        let err = DrumError::SubscriptionRevoked {
            peer: peer.to_string(),
            attribute,
        };
        tracing::warn!("{}, disconnecting", err);
        self.diagnostics.subscriptions_revoked += 1;
        self.release_peer(peer);
    }

    fn on_services_invalidated(&mut self, peer: PeerId, services: &[Uuid]) {
        if !services.contains(&SERVICE_UUID) {
            return;
        }

        let Some(connection) = self.peers.get_mut(&peer) else {
            return;
        };

        if matches!(connection.state, PeerState::Connecting | PeerState::Disconnecting) {
            return;
        }

        tracing::info!("Drum service invalidated on {}, rediscovering", peer);
        connection.attributes.clear();
        connection.state = PeerState::Discovering;
        self.radio.discover_services(peer, &[SERVICE_UUID]);
    }

    fn on_value(&mut self, peer: PeerId, attribute: Uuid, value: std::result::Result<Vec<u8>, String>) {
        if !self.peers.contains_key(&peer) {
            tracing::debug!("Value from unknown peer {}, ignoring", peer);
            return;
        }

        let payload = match value {
            Ok(payload) => payload,
            Err(reason) => {
                tracing::warn!("Error reading {} on {}: {}", attribute, peer, reason);
                self.diagnostics.decode_mismatches += 1;
                return;
            }
        };

        match protocol::decode_attribute_notification(attribute, &payload) {
            Ok(Some(instrument)) => {
                tracing::debug!("Received hit for {} from {}", instrument, peer);
                self.diagnostics.hits_received += 1;
                self.hits.push(HitEvent::remote(instrument, PeerRef::Attribute(peer)));
            }
            Ok(None) => {
                tracing::trace!("Ignoring {} byte payload on {}", payload.len(), attribute);
            }
            Err(e) => {
                let err = DrumError::DecodeMismatch(e.to_string());
                tracing::warn!("{} from {}", err, peer);
                self.diagnostics.decode_mismatches += 1;
            }
        }
    }

    fn is_discovering(&self, peer: &PeerId) -> bool {
        matches!(
            self.peers.get(peer).map(|c| c.state),
            Some(PeerState::Discovering)
        )
    }

    fn discovery_failed(&mut self, peer: PeerId, reason: String) {
        let err = DrumError::DiscoveryFailed {
            peer: peer.to_string(),
            reason,
        };
        tracing::warn!("{}", err);
        self.diagnostics.connect_failures += 1;
        self.release_peer(peer);
    }

    /// Unsubscribe notifying attributes, then release the connection
    fn release_peer(&mut self, peer: PeerId) {
        let Some(connection) = self.peers.get_mut(&peer) else {
            return;
        };

        match connection.state {
            PeerState::Disconnecting => return,
            PeerState::Connecting => {}
            PeerState::Discovering | PeerState::Subscribed => {
                for (attribute, notifying) in &connection.attributes {
                    if *notifying {
                        self.radio.set_notify(peer, *attribute, false);
                    }
                }
            }
        }

        connection.state = PeerState::Disconnecting;
        self.radio.cancel_connection(peer);
        tracing::info!("Releasing peripheral {}", peer);
    }
}
