use super::{InboundStream, LinkState, OutboundStream, Role, SessionControl, SessionEvent, SessionLink};
use crate::config::SessionConfig;
use crate::diagnostics::Diagnostics;
use crate::driver::HitTransport;
use crate::error::{DrumError, Result};
use crate::event::{HitEvent, PeerRef};
use crate::instrument::InstrumentId;
use crate::protocol;
use std::collections::BTreeSet;
use std::io;

/// Progress of the single session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionPhase {
    /// Neither advertising nor browsing
    Idle,
    /// Advertising (sender) or browsing (receiver)
    Discovering,
    /// Receiver saw the sender and invited it
    PeerFound,
    /// Sender accepted an invitation; waiting for the session
    SessionConnecting,
    /// Session up, no stream yet
    SessionConnected,
    /// Byte stream open in the role's direction
    StreamOpen,
}

/// The one session this device holds with its counterpart
pub struct PeerSession {
    phase: SessionPhase,
    counterpart: Option<String>,
    connected_peers: BTreeSet<String>,
    outbound: Option<OutboundStream>,
    inbound: Option<InboundStream>,
}

impl PeerSession {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            counterpart: None,
            connected_peers: BTreeSet::new(),
            outbound: None,
            inbound: None,
        }
    }

    /// Furthest phase reached since the last reset
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Peer most recently invited, inviting, or connected
    pub fn counterpart(&self) -> Option<&str> {
        self.counterpart.as_deref()
    }

    /// Peers the session layer reports as connected
    pub fn connected_peers(&self) -> impl Iterator<Item = &str> {
        self.connected_peers.iter().map(String::as_str)
    }

    /// Whether a stream to the receiver is open (sender)
    pub fn has_outbound(&self) -> bool {
        self.outbound.is_some()
    }

    /// Whether a stream from the sender has been accepted (receiver)
    pub fn has_inbound(&self) -> bool {
        self.inbound.is_some()
    }

    fn advance(&mut self, phase: SessionPhase) {
        if phase > self.phase {
            self.phase = phase;
        }
    }
}

/// Session transport for one fixed role
pub struct SessionTransport {
    role: Role,
    config: SessionConfig,
    link: Box<dyn SessionLink>,
    discovering: bool,
    session: PeerSession,
    hits: Vec<HitEvent>,
    diagnostics: Diagnostics,
}

impl SessionTransport {
    /// Idle transport; nothing is advertised or browsed until
    /// [`start_advertising`](Self::start_advertising)
    pub fn new(role: Role, link: Box<dyn SessionLink>, config: SessionConfig) -> Self {
        Self {
            role,
            config,
            link,
            discovering: false,
            session: PeerSession::new(),
            hits: Vec::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    /// Sender or receiver, fixed at construction
    pub fn role(&self) -> Role {
        self.role
    }

    /// Display name this device advertises or browses under
    pub fn identity(&self) -> &str {
        match self.role {
            Role::Sender => &self.config.sender_name,
            Role::Receiver => &self.config.receiver_name,
        }
    }

    /// State of the session with the counterpart
    pub fn session(&self) -> &PeerSession {
        &self.session
    }

    /// Shorthand for `session().phase()`
    pub fn phase(&self) -> SessionPhase {
        self.session.phase
    }

    /// Whether the advertiser or browser is running
    pub fn is_discovering(&self) -> bool {
        self.discovering
    }

    /// Counters since construction
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Hits decoded since the last call
    pub fn drain_hits(&mut self) -> Vec<HitEvent> {
        std::mem::take(&mut self.hits)
    }

    /// Start the advertiser (sender) or browser (receiver)
    ///
    /// A no-op while already running. Starting again after a stop begins a
    /// fresh session.
    pub fn start_advertising(&mut self) {
        if self.discovering {
            return;
        }

        self.session = PeerSession::new();
        self.session.phase = SessionPhase::Discovering;
        self.discovering = true;

        let identity = self.identity().to_string();
        match self.role {
            Role::Sender => {
                tracing::info!("Advertising as {} on {}", identity, self.config.service_type);
                self.link.start_advertising(&identity, &self.config.service_type);
            }
            Role::Receiver => {
                tracing::info!("Browsing as {} on {}", identity, self.config.service_type);
                self.link.start_browsing(&identity, &self.config.service_type);
            }
        }
    }

    /// Stop the advertiser (sender) or browser (receiver)
    ///
    /// An established session is left alone.
    pub fn stop_advertising(&mut self) {
        if !self.discovering {
            return;
        }

        match self.role {
            Role::Sender => self.link.stop_advertising(),
            Role::Receiver => self.link.stop_browsing(),
        }
        self.discovering = false;

        if self.session.phase <= SessionPhase::PeerFound {
            self.session.phase = SessionPhase::Idle;
        }
        tracing::info!("Discovery stopped for {}", self.role);
    }

    pub fn control(&mut self, control: SessionControl) -> Result<()> {
        match control {
            SessionControl::StartAdvertising => self.start_advertising(),
            SessionControl::StopAdvertising => self.stop_advertising(),
        }
        Ok(())
    }

    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::PeerFound { peer } => self.on_peer_found(peer),
            SessionEvent::PeerLost { peer } => {
                tracing::info!("lostPeer: {}", peer);
            }
            SessionEvent::InvitationReceived { from } => self.on_invitation(from),
            SessionEvent::SessionStateChanged { peer, state } => self.on_session_state(peer, state),
            SessionEvent::StreamReceived { name, from, stream } => self.on_stream_received(name, from, stream),
            SessionEvent::BytesAvailable => self.read_available(),
            SessionEvent::DataReceived { from, len } => {
                tracing::debug!("Ignoring {} bytes of message data from {}", len, from);
            }
        }
    }

    /// Write one hit to the open stream without waiting
    ///
    /// A stream that cannot take the bytes right now drops the hit with
    /// `SendFailed`.
    pub fn send_hit(&mut self, instrument: InstrumentId) -> Result<()> {
        if self.role != Role::Sender {
            return Err(DrumError::WrongRole("receiver"));
        }

        let result = match self.session.outbound.as_mut() {
            Some(stream) if !self.session.connected_peers.is_empty() => {
                let payload = protocol::encode_session_hit(instrument);
                super::try_write_all(stream, &payload).map_err(|e| match e.kind() {
                    io::ErrorKind::WouldBlock => {
                        DrumError::SendFailed(format!("stream not ready for {}", instrument))
                    }
                    _ => DrumError::Io(e),
                })
            }
            _ => Err(DrumError::NotConnected),
        };

        match &result {
            Ok(()) => {
                tracing::debug!("Sent hit for {}", instrument);
                self.diagnostics.hits_sent += 1;
            }
            Err(e) => {
                tracing::debug!("Dropping hit for {}: {}", instrument, e);
                self.diagnostics.send_failures += 1;
            }
        }
        result
    }

    /// Stop discovery and drop both streams
    pub fn shutdown(&mut self) {
        self.stop_advertising();
        self.session = PeerSession::new();
        tracing::info!("Session transport shut down");
    }

    fn on_peer_found(&mut self, peer: String) {
        if self.role != Role::Receiver {
            tracing::debug!("Sender ignoring found peer {}", peer);
            return;
        }

        tracing::info!("foundPeer: {}, inviting", peer);
        let timeout = self.config.invitation_timeout();
        self.link.invite(&peer, timeout);
        self.session.counterpart = Some(peer);
        self.session.advance(SessionPhase::PeerFound);
    }

    fn on_invitation(&mut self, from: String) {
        match self.role {
            Role::Sender => {
                tracing::info!("Invitation from {}, accepting", from);
                self.link.respond_to_invitation(&from, true);
                self.session.counterpart = Some(from);
                self.session.advance(SessionPhase::SessionConnecting);
            }
            Role::Receiver => {
                tracing::debug!("Receiver declining invitation from {}", from);
                self.link.respond_to_invitation(&from, false);
            }
        }
    }

    fn on_session_state(&mut self, peer: String, state: LinkState) {
        match state {
            LinkState::Connecting => {
                tracing::info!("Session connecting to {}", peer);
                self.session.advance(SessionPhase::SessionConnecting);
            }
            LinkState::Connected => {
                tracing::info!("Session connected to {}", peer);
                self.session.connected_peers.insert(peer.clone());
                self.session.counterpart = Some(peer.clone());
                self.session.advance(SessionPhase::SessionConnected);
                if self.role == Role::Sender {
                    self.connect_stream(&peer);
                }
            }
            LinkState::NotConnected => {
                let was_connected = self.session.connected_peers.remove(&peer);
                tracing::info!("Session not connected to {}", peer);
                if was_connected && self.session.connected_peers.is_empty() {
                    self.session.outbound = None;
                    self.session.inbound = None;
                }
                if self.session.connected_peers.is_empty() {
                    // Discovery is only restarted by an explicit start_advertising
                    self.session.phase = if self.discovering {
                        SessionPhase::Discovering
                    } else {
                        SessionPhase::Idle
                    };
                }
            }
        }
    }

    fn connect_stream(&mut self, peer: &str) {
        if peer != self.config.receiver_name {
            tracing::debug!("Not opening a stream to {}, not a receiver", peer);
            return;
        }
        if self.session.outbound.is_some() {
            return;
        }

        match self.link.start_stream(&self.config.stream_name, peer) {
            Ok(stream) => {
                tracing::info!("Opened stream {} to {}", self.config.stream_name, peer);
                self.session.outbound = Some(stream);
                self.session.advance(SessionPhase::StreamOpen);
            }
            Err(e) => {
                tracing::error!("Failed to open stream to {}: {}", peer, e);
            }
        }
    }

    fn on_stream_received(&mut self, name: String, from: String, stream: InboundStream) {
        if self.role != Role::Receiver {
            tracing::debug!("Sender ignoring stream {} from {}", name, from);
            return;
        }

        tracing::info!("Received stream {} from {}", name, from);
        self.session.inbound = Some(stream);
        self.session.counterpart = Some(from);
        self.session.advance(SessionPhase::StreamOpen);
    }

    fn read_available(&mut self) {
        let Some(stream) = self.session.inbound.as_mut() else {
            tracing::debug!("Bytes available with no inbound stream");
            return;
        };

        let mut buffer = vec![0u8; self.config.read_buffer_size];
        let read = match stream.try_read(&mut buffer) {
            Ok(None) | Ok(Some(0)) => {
                tracing::debug!("Inbound stream reported bytes but read none");
                return;
            }
            Ok(Some(read)) => read,
            Err(e) => {
                tracing::warn!("Error reading inbound stream: {}", e);
                return;
            }
        };

        match protocol::decode_session_payload(&buffer[..read]) {
            Ok(instrument) => {
                let peer = self
                    .session
                    .counterpart
                    .clone()
                    .unwrap_or_else(|| self.config.sender_name.clone());
                tracing::debug!("Received hit for {} from {}", instrument, peer);
                self.diagnostics.hits_received += 1;
                self.hits.push(HitEvent::remote(instrument, PeerRef::Session(peer)));
            }
            Err(e) => {
                tracing::debug!("Dropping {} byte stream read: {}", read, e);
                self.diagnostics.decode_mismatches += 1;
            }
        }
    }
}

impl HitTransport for SessionTransport {
    type Event = SessionEvent;
    type Control = SessionControl;

    fn name(&self) -> &'static str {
        match self.role {
            Role::Sender => "session sender",
            Role::Receiver => "session receiver",
        }
    }

    fn handle(&mut self, event: SessionEvent) {
        SessionTransport::handle(self, event)
    }

    fn control(&mut self, control: SessionControl) -> Result<()> {
        SessionTransport::control(self, control)
    }

    fn send_hit(&mut self, instrument: InstrumentId) -> Result<()> {
        SessionTransport::send_hit(self, instrument)
    }

    fn drain_hits(&mut self) -> Vec<HitEvent> {
        SessionTransport::drain_hits(self)
    }

    fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.clone()
    }

    fn shutdown(&mut self) {
        SessionTransport::shutdown(self)
    }
}
