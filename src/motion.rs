//! Accelerometer hit detection.
//!
//! A crude high-pass filter on the z axis: a sample whose change from the
//! previous one is both large and larger than the previous change counts as a
//! strike. After a strike the detector ignores input for a few samples so one
//! swing does not register twice.

/// Minimum |Δz| (in g) that can count as a strike
pub const HIT_THRESHOLD: f64 = 0.4;

/// Pause counter value at which detection resumes
pub const PAUSE_RESET: u32 = 10;

#[derive(Debug, Clone, Default)]
pub struct MotionDetector {
    previous_z: f64,
    previous_delta: f64,
    pause: u32,
}

impl MotionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while strikes are being suppressed
    pub fn is_paused(&self) -> bool {
        self.pause > 0
    }

    /// Feed one user-acceleration z sample; returns true if it is a strike
    pub fn sample(&mut self, z: f64) -> bool {
        let delta = (z - self.previous_z).abs();

        let hit = self.pause == 0 && delta > HIT_THRESHOLD && delta > self.previous_delta;
        if hit {
            self.pause = 1;
        }

        if self.pause > 0 {
            self.pause += 1;
        }
        if self.pause == PAUSE_RESET {
            self.pause = 0;
        }

        self.previous_z = z;
        self.previous_delta = delta;
        hit
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
