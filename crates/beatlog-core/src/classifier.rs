//! Threshold + refractory beat classifier
//!
//! A single amplitude threshold rejects the noise floor, and a refractory
//! interval after each accepted beat rejects the ringing/decay tail of one
//! physical strike. Both values are fixed at configuration time; there is no
//! auto-calibration.

use crate::clock::Ticks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatClassifier {
    threshold: u16,
    refractory_ms: u32,
    /// Time of the last accepted beat, `None` until the first one.
    last_beat_at: Option<Ticks>,
}

impl BeatClassifier {
    pub const fn new(threshold: u16, refractory_ms: u32) -> Self {
        Self {
            threshold,
            refractory_ms,
            last_beat_at: None,
        }
    }

    pub const fn threshold(&self) -> u16 {
        self.threshold
    }

    pub const fn refractory_ms(&self) -> u32 {
        self.refractory_ms
    }

    pub const fn last_beat_at(&self) -> Option<Ticks> {
        self.last_beat_at
    }

    /// Whether `level` at `now` would be accepted as a beat.
    ///
    /// True iff `level > threshold` and more than `refractory_ms` have passed
    /// since the last accepted beat. Does not change any state.
    pub fn is_beat(&self, level: u16, now: Ticks) -> bool {
        if level <= self.threshold {
            return false;
        }

        match self.last_beat_at {
            Some(last) => now.wrapping_diff(last) > self.refractory_ms,
            None => true,
        }
    }

    /// Classify `level` at `now`, remembering `now` as the last beat when accepted.
    pub fn classify(&mut self, level: u16, now: Ticks) -> bool {
        let beat = self.is_beat(level, now);
        if beat {
            self.last_beat_at = Some(now);
        }
        beat
    }
}
