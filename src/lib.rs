//! Hit event distribution for a networked drum kit
//!
//! A strike on one device is delivered to other devices so they can play the
//! sound and show the hit. Two structurally different transports carry hits:
//!
//! - **Attribute transport**: a central connects to every drum peripheral it
//!   finds and subscribes to one notify attribute per instrument
//! - **Session transport**: a sender and a receiver join a peer-to-peer session
//!   and the sender streams instrument positions as decimal text
//!
//! Both transports are state machines driven by injected platform callbacks.
//! The radio or session stack itself stays behind the [`gatt::CentralRadio`],
//! [`gatt::PeripheralRadio`] and [`session::SessionLink`] traits.
//!
//! # Quick Start
//!
//! ```no_run
//! use drumkit_link::gatt::{AttributeEvent, Central, CentralRadio, PeerId};
//! use drumkit_link::{AttributeConfig, InstrumentId, RadioState};
//! use uuid::Uuid;
//!
//! struct PlatformRadio;
//!
//! impl CentralRadio for PlatformRadio {
//!     fn scan_for_service(&mut self, _service: Uuid) {}
//!     fn stop_scan(&mut self) {}
//!     fn connect(&mut self, _peer: PeerId) {}
//!     fn cancel_connection(&mut self, _peer: PeerId) {}
//!     fn discover_services(&mut self, _peer: PeerId, _services: &[Uuid]) {}
//!     fn discover_attributes(&mut self, _peer: PeerId, _service: Uuid, _attributes: &[Uuid]) {}
//!     fn set_notify(&mut self, _peer: PeerId, _attribute: Uuid, _enabled: bool) {}
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let central = Central::new(Box::new(PlatformRadio), AttributeConfig::default());
//!     let mut handle = drumkit_link::spawn(drumkit_link::AttributeTransport::from(central), 100);
//!
//!     // The platform adapter forwards radio callbacks through the sink
//!     let sink = handle.event_sink();
//!     sink.send(AttributeEvent::RadioStateChanged(RadioState::PoweredOn))?;
//!
//!     let mut hits = handle.subscribe_hits();
//!     while let Ok(hit) = hits.recv().await {
//!         if hit.instrument == InstrumentId::Kick {
//!             println!("Kick from {:?}", hit.origin);
//!             break;
//!         }
//!     }
//!
//!     handle.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Instrument / Registry**: the canonical instrument order and its wire identifiers
//! - **Protocol**: payload encoding and the fixed service constants
//! - **Gatt / Session**: the two transport state machines
//! - **Driver**: one task per transport, hit fan-out and outgoing sends
//! - **Router**: plays, shows and forwards hits from every source

mod config;
mod diagnostics;
mod driver;
mod error;
mod event;
pub mod gatt;
mod instrument;
pub mod motion;
pub mod protocol;
mod radio;
pub mod registry;
mod router;
pub mod session;

// Public exports
pub use config::{AttributeConfig, DrumConfig, SessionConfig};
pub use diagnostics::Diagnostics;
pub use driver::{spawn, EventSink, HitSender, HitTransport, TransportHandle};
pub use error::{DrumError, Result};
pub use event::{HitEvent, HitReceiver, Origin, PeerRef};
pub use gatt::AttributeTransport;
pub use instrument::{InstrumentId, Position3D};
pub use motion::MotionDetector;
pub use radio::RadioState;
pub use registry::{TransportKind, WireIdentifier};
pub use router::{AudioSink, EventRouter, LocalInput, RouterStats, VisualSink};
pub use session::{Role, SessionTransport};
