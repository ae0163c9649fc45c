//! Hardware-independent core library for beatlog
//!
//! This crate contains the platform-agnostic logic of the beat logger: the
//! windowed peak sampler, the threshold/refractory beat classifier, the beat
//! history ring with its tempo estimate, the per-minute BPM aggregator and the
//! control loop that ties them together. Hardware is reached only through the
//! traits in [`clock`], [`sensor`], [`indicator`] and [`storage`].
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod app_state;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod diagnostic;
pub mod history;
pub mod indicator;
pub mod sensor;
pub mod storage;

pub use app_state::{AppError, BeatController, BeatReport, Iteration, LoopState, RunSummary};
pub use classifier::BeatClassifier;
pub use clock::{MonotonicClock, Ticks};
pub use config::{ConfigError, DetectorConfig};
pub use history::BeatHistory;
pub use indicator::{ColorPicker, Indicator};
pub use sensor::{PeakSampler, SoundSensor};
pub use storage::{FlushOutcome, LogRecord, LogSink, MinuteAggregator, StorageError};
