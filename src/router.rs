//! Event router: the single place hits are played, shown and forwarded.

use crate::driver::HitSender;
use crate::error::Result;
use crate::event::{HitEvent, HitReceiver};
use crate::instrument::InstrumentId;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;

/// Sound output for the kit
pub trait AudioSink: Send {
    /// Prepare one voice per instrument; called once before `start`
    fn load_kit(&mut self, instruments: &[InstrumentId]);
    fn start(&mut self) -> Result<()>;
    /// Play `instrument` now; must not block
    fn trigger(&mut self, instrument: InstrumentId);
}

/// Cosmetic feedback for a hit
pub trait VisualSink: Send {
    fn on_hit(&mut self, instrument: InstrumentId);
}

/// Input produced on this device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalInput {
    /// A pad for `instrument` was pressed
    Tap(InstrumentId),
    /// The motion detector fired; plays the selected instrument
    Motion,
    /// Change which instrument motion hits play
    Select(InstrumentId),
}

/// Counters for what the router has done
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub local_hits: u64,
    pub remote_hits: u64,
    pub forwarded: u64,
    pub dropped: u64,
}

/// Plays every hit locally and forwards local ones to the active transport
pub struct EventRouter {
    audio: Box<dyn AudioSink>,
    visual: Box<dyn VisualSink>,
    selected: InstrumentId,
    outbound: Option<HitSender>,
    stats: RouterStats,
}

impl EventRouter {
    pub fn new(audio: Box<dyn AudioSink>, visual: Box<dyn VisualSink>) -> Self {
        Self {
            audio,
            visual,
            selected: InstrumentId::ALL[0],
            outbound: None,
            stats: RouterStats::default(),
        }
    }

    /// Load the kit into the audio collaborator and start it
    pub fn start(&mut self) -> Result<()> {
        self.audio.load_kit(&InstrumentId::ALL);
        self.audio.start()?;
        tracing::info!("Drum kit loaded with {} instruments", InstrumentId::COUNT);
        Ok(())
    }

    /// Instrument that motion hits play
    pub fn selected(&self) -> InstrumentId {
        self.selected
    }

    pub fn select_instrument(&mut self, instrument: InstrumentId) {
        tracing::debug!("Selected {}", instrument);
        self.selected = instrument;
    }

    /// Transport that local hits are forwarded through, if any
    pub fn set_outbound(&mut self, sender: Option<HitSender>) {
        self.outbound = sender;
    }

    /// Counters since construction
    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// Play and show one hit
    pub fn dispatch(&mut self, hit: &HitEvent) {
        if hit.is_local() {
            self.stats.local_hits += 1;
        } else {
            self.stats.remote_hits += 1;
        }
        tracing::debug!("Dispatching {} ({:?})", hit.instrument, hit.origin);
        self.audio.trigger(hit.instrument);
        self.visual.on_hit(hit.instrument);
    }

    /// Play a local hit and forward it through the active transport
    ///
    /// Returns whether the transport took the hit. The local sound plays either way.
    pub async fn local_hit(&mut self, instrument: InstrumentId) -> bool {
        self.dispatch(&HitEvent::local(instrument));

        let Some(sender) = self.outbound.as_ref() else {
            return false;
        };

        if sender.send(instrument).await {
            self.stats.forwarded += 1;
            true
        } else {
            self.stats.dropped += 1;
            false
        }
    }

    /// Motion trigger: a local hit on the selected instrument
    pub async fn motion_hit(&mut self) -> bool {
        self.local_hit(self.selected).await
    }

    pub async fn handle_input(&mut self, input: LocalInput) {
        match input {
            LocalInput::Tap(instrument) => {
                self.local_hit(instrument).await;
            }
            LocalInput::Motion => {
                self.motion_hit().await;
            }
            LocalInput::Select(instrument) => self.select_instrument(instrument),
        }
    }

    /// Serve local input and remote hits until the input channel closes
    ///
    /// Remote hits are only played, never forwarded again.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<LocalInput>, receivers: Vec<HitReceiver>) -> Self {
        let mut remote = stream::select_all(receivers.into_iter().map(HitReceiver::into_stream));
        let mut remote_open = !remote.is_empty();

        loop {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(input) => self.handle_input(input).await,
                    None => break,
                },
                hit = remote.next(), if remote_open => match hit {
                    Some(hit) => self.dispatch(&hit),
                    None => {
                        tracing::info!("All transports closed their hit channels");
                        remote_open = false;
                    }
                },
            }
        }

        tracing::info!("Event router stopped");
        self
    }
}
