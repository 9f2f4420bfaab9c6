use serde::{Deserialize, Serialize};
use std::fmt;

/// Percussion voice identity
///
/// The declaration order is the canonical order shared by every device and
/// every transport. Wire identifiers are derived from [`InstrumentId::position`]
/// only, so reordering these variants breaks interoperability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstrumentId {
    HiHat,
    Crash,
    Ride,
    Snare,
    RackTom,
    FloorTom,
    Kick,
}

/// Listener-relative position used to place a voice in a spatial mix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position3D {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl InstrumentId {
    /// Every instrument in canonical order
    pub const ALL: [InstrumentId; 7] = [
        InstrumentId::HiHat,
        InstrumentId::Crash,
        InstrumentId::Ride,
        InstrumentId::Snare,
        InstrumentId::RackTom,
        InstrumentId::FloorTom,
        InstrumentId::Kick,
    ];

    /// Number of instruments in the kit
    pub const COUNT: usize = Self::ALL.len();

    /// Iterate over the kit in canonical order
    pub fn all() -> impl Iterator<Item = InstrumentId> + Clone {
        Self::ALL.into_iter()
    }

    /// Position in the canonical order
    pub fn position(self) -> usize {
        self as usize
    }

    /// Instrument at `position`, if in range
    pub fn from_position(position: usize) -> Option<Self> {
        Self::ALL.get(position).copied()
    }

    /// Human readable name
    pub fn description(self) -> &'static str {
        match self {
            Self::HiHat => "Hi Hat",
            Self::Crash => "Crash",
            Self::Ride => "Ride",
            Self::Snare => "Snare",
            Self::RackTom => "Rack tom",
            Self::FloorTom => "Floor tom",
            Self::Kick => "Kick",
        }
    }

    /// File stem of the one-shot sample for this voice (wav)
    pub fn sample_name(self) -> &'static str {
        match self {
            Self::HiHat => "ZDJN_HAT_C2FL_HT_015_01",
            Self::Crash => "PSTE_CRSH_EGFL_HT_015_01",
            Self::Ride => "PSTE_RIDE_EGFL_HT_01",
            Self::Snare => "L400_SNR_DCFL_HT_01",
            Self::RackTom => "RGRS_RTOM_CNFL_HT_01",
            Self::FloorTom => "RGRS_FTOM_CNFL_HT_01",
            Self::Kick => "RGRS_KICK_HDFL_HT_01",
        }
    }

    /// Where the drum sits relative to a listener at the origin
    pub fn location(self) -> Position3D {
        match self {
            Self::HiHat => Position3D::new(-0.5, 0.1, -0.25),
            Self::Crash => Position3D::new(-0.3, 0.55, 0.1),
            Self::Ride => Position3D::new(0.3, 0.55, 0.1),
            Self::Snare => Position3D::new(-0.1, 0.15, -0.25),
            Self::RackTom => Position3D::new(-0.2, 0.35, -0.75),
            Self::FloorTom => Position3D::new(0.25, 0.2, -0.25),
            Self::Kick => Position3D::new(0.0, 0.2, -0.5),
        }
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
