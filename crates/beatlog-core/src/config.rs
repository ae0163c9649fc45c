//! Detector tuning
//!
//! All values are fixed when the control loop is built; nothing here is
//! adjusted while it runs.

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::history::MAX_HISTORY_CAPACITY;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct DetectorConfig {
    /// A windowed peak must be strictly above this level to count as a beat.
    pub threshold: u16,
    /// Minimum time after an accepted beat before the next one (exclusive).
    pub refractory_ms: u32,
    /// Length of one peak sampling window.
    pub sample_window_ms: u32,
    /// Pause between two sensor reads inside a window.
    pub poll_interval_ms: u32,
    /// Number of recent beats used for the tempo estimate.
    pub history_capacity: usize,
    /// Period between two averaged log records.
    pub flush_period_ms: u32,
    /// Period of the level/threshold diagnostic line.
    pub debug_period_ms: u32,
    /// Sleep at the end of every loop iteration.
    pub idle_sleep_ms: u32,
    /// Bound on tempo samples kept while the log cannot be written.
    pub max_pending_samples: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 12_900,
            refractory_ms: 200,
            sample_window_ms: 50,
            poll_interval_ms: 2,
            history_capacity: 10,
            flush_period_ms: 60_000,
            debug_period_ms: 1_000,
            idle_sleep_ms: 10,
            max_pending_samples: 4_096,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_window_ms == 0 {
            return Err(ConfigError::Zero {
                field: "sample_window_ms",
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Zero {
                field: "poll_interval_ms",
            });
        }
        if self.poll_interval_ms > self.sample_window_ms {
            return Err(ConfigError::PollExceedsWindow {
                poll: self.poll_interval_ms,
                window: self.sample_window_ms,
            });
        }
        if self.history_capacity < 2 {
            return Err(ConfigError::HistoryTooSmall(self.history_capacity));
        }
        if self.history_capacity > MAX_HISTORY_CAPACITY {
            return Err(ConfigError::HistoryTooLarge(self.history_capacity));
        }
        if self.flush_period_ms == 0 {
            return Err(ConfigError::Zero {
                field: "flush_period_ms",
            });
        }
        if self.max_pending_samples == 0 {
            return Err(ConfigError::Zero {
                field: "max_pending_samples",
            });
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("poll interval ({poll} ms) is longer than the sample window ({window} ms)")]
    PollExceedsWindow { poll: u32, window: u32 },
    #[error("history must hold at least two beats, got {0}")]
    HistoryTooSmall(usize),
    #[error("history holds at most {max} beats, got {0}", max = MAX_HISTORY_CAPACITY)]
    HistoryTooLarge(usize),
}
