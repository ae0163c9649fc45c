//! Beat history ring and instantaneous tempo estimate

use alloc::collections::VecDeque;

use crate::clock::Ticks;

const MS_PER_MINUTE: f32 = 60_000.0;

/// Largest beat window a configuration may ask for.
pub const MAX_HISTORY_CAPACITY: usize = 1_024;

/// The most recent beat timestamps, oldest first.
///
/// Entries are kept in classification order and never reordered. Once the
/// ring holds `capacity` entries, each new beat evicts the oldest one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeatHistory {
    beats: VecDeque<Ticks>,
    capacity: usize,
}

impl BeatHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            beats: VecDeque::with_capacity(capacity.min(MAX_HISTORY_CAPACITY) + 1),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    /// Iterate the stored beats from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = Ticks> + '_ {
        self.beats.iter().copied()
    }

    pub fn clear(&mut self) {
        self.beats.clear();
    }

    /// Append a beat, evicting the oldest entry on overflow.
    pub fn record(&mut self, at: Ticks) {
        self.beats.push_back(at);
        if self.beats.len() > self.capacity {
            self.beats.pop_front();
        }
    }

    /// Tempo over the whole stored span, in beats per minute.
    ///
    /// Uses `(count - 1) * 60000 / span_ms`, where the span runs from the
    /// oldest to the newest beat. Dividing the span by the interval count
    /// smooths out a single noisy gap at the cost of one window of latency.
    ///
    /// Returns `None` with fewer than two beats or a zero span.
    pub fn estimate_bpm(&self) -> Option<f32> {
        if self.beats.len() < 2 {
            return None;
        }

        let oldest = *self.beats.front()?;
        let newest = *self.beats.back()?;
        let span_ms = newest.wrapping_diff(oldest);
        if span_ms == 0 {
            return None;
        }

        let intervals = (self.beats.len() - 1) as f32;
        Some(intervals * MS_PER_MINUTE / span_ms as f32)
    }
}
