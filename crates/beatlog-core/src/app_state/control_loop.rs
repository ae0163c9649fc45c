//! The beat logger control loop
//!
//! One [`BeatController`] owns every piece of mutable state (last beat time,
//! beat history, pending tempo samples, timers) and drives the components in
//! a single blocking loop:
//!
//! 1. **AwaitingSample**: block for one peak sampling window.
//! 2. **BeatDetected** (on a beat): record it, latch a new indicator color,
//!    estimate the tempo and hand it to the minute aggregator.
//! 3. **IdleTick** (every iteration): emit the periodic level diagnostic and
//!    flush the aggregator when its period is due.
//! 4. Sleep briefly, then loop.
//!
//! There are no other tasks and nothing to lock. A stop request is only seen
//! between iterations; a sampling window always runs to completion.

use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_hal::delay::DelayNs;
use embedded_sdmmc::TimeSource;
use log::{debug, error, info};

use super::{AppError, LoopState};
use crate::classifier::BeatClassifier;
use crate::clock::{MonotonicClock, Ticks};
use crate::config::DetectorConfig;
use crate::diagnostic::diagnostic;
use crate::history::BeatHistory;
use crate::indicator::{ColorPicker, Indicator, SELF_TEST_COLOR, SELF_TEST_MS};
use crate::sensor::{PeakSampler, SoundSensor};
use crate::storage::{FlushOutcome, LogSink, MinuteAggregator, StorageError, TempoAccumulator};

/// What happened on one accepted beat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatReport {
    /// Count of beats since the controller started, starting at 1
    pub number: u32,
    pub at: Ticks,
    pub level: u16,
    /// Tempo estimate after this beat, `None` until two beats are known
    pub bpm: Option<f32>,
    pub color: Rgb888,
}

/// Outcome of one pass through the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Iteration {
    /// Peak level of this iteration's sampling window
    pub level: u16,
    pub beat: Option<BeatReport>,
    /// Set when the flush period elapsed during this iteration
    pub flush: Option<Result<FlushOutcome, StorageError>>,
}

/// Totals over a [`BeatController::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub iterations: u64,
    pub beats: u32,
    pub records_written: u32,
    pub flush_failures: u32,
}

impl RunSummary {
    fn count_flush(&mut self, flush: &Result<FlushOutcome, StorageError>) {
        match flush {
            Ok(FlushOutcome::Written(_)) => self.records_written += 1,
            Ok(FlushOutcome::Empty) => {}
            Err(_) => self.flush_failures += 1,
        }
    }
}

/// Owns the detector state and the hardware handles for one control loop.
///
/// ## Usage
///
/// ```rust,ignore
/// let mut controller = BeatController::new(config, mic, clock, delay, led)?;
/// let summary = controller.run(&mut log, &time_source, || stop.requested());
/// ```
pub struct BeatController<S, C, D, I> {
    config: DetectorConfig,
    sensor: S,
    clock: C,
    delay: D,
    indicator: I,
    sampler: PeakSampler,
    classifier: BeatClassifier,
    history: BeatHistory,
    aggregator: MinuteAggregator,
    colors: ColorPicker,
    state: LoopState,
    beat_count: u32,
    last_level: u16,
    last_debug_at: Ticks,
}

impl<S, C, D, I> BeatController<S, C, D, I>
where
    S: SoundSensor,
    C: MonotonicClock,
    D: DelayNs,
    I: Indicator,
{
    /// Validate `config`, bring up the indicator and arm the timers.
    ///
    /// The indicator flashes a dim color for a moment as a self-test. The
    /// loop refuses to start without a working indicator, since beat feedback
    /// is its primary output.
    pub fn new(
        config: DetectorConfig,
        sensor: S,
        clock: C,
        mut delay: D,
        mut indicator: I,
    ) -> Result<Self, AppError> {
        config.validate()?;

        indicator.init().map_err(|e| {
            error!(" Indicator could not be initialized: {:?}", e);
            AppError::Indicator(diagnostic(format_args!("{:?}", e)))
        })?;

        indicator.set_color(SELF_TEST_COLOR);
        delay.delay_ms(SELF_TEST_MS);
        indicator.off();

        let now = clock.now();
        info!(
            "Indicator ready | threshold: {} | min interval: {} ms | window: {} ms",
            config.threshold, config.refractory_ms, config.sample_window_ms
        );

        Ok(Self {
            sampler: PeakSampler::new(config.sample_window_ms, config.poll_interval_ms),
            classifier: BeatClassifier::new(config.threshold, config.refractory_ms),
            history: BeatHistory::new(config.history_capacity),
            aggregator: MinuteAggregator::new(
                config.flush_period_ms,
                config.max_pending_samples,
                now,
            ),
            colors: ColorPicker::new(u64::from(now.as_millis())),
            state: LoopState::IdleTick,
            beat_count: 0,
            last_level: 0,
            last_debug_at: now,
            config,
            sensor,
            clock,
            delay,
            indicator,
        })
    }

    /// Replace the clock-derived color seed.
    pub fn with_color_seed(mut self, seed: u64) -> Self {
        self.colors = ColorPicker::new(seed);
        self
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn history(&self) -> &BeatHistory {
        &self.history
    }

    pub fn aggregator(&self) -> &MinuteAggregator {
        &self.aggregator
    }

    /// Tempo samples not yet written to the log
    pub fn accumulator(&self) -> &TempoAccumulator {
        self.aggregator.accumulator()
    }

    pub fn beat_count(&self) -> u32 {
        self.beat_count
    }

    /// Peak level of the most recent sampling window
    pub fn last_level(&self) -> u16 {
        self.last_level
    }

    /// Run one iteration of the loop, including the trailing idle sleep.
    pub fn step<L, T>(&mut self, sink: &mut L, time: &T) -> Iteration
    where
        L: LogSink + ?Sized,
        T: TimeSource + ?Sized,
    {
        self.state = LoopState::AwaitingSample;
        let level = self
            .sampler
            .sample_peak(&mut self.sensor, &self.clock, &mut self.delay);
        self.last_level = level;
        let now = self.clock.now();

        let beat = if self.classifier.classify(level, now) {
            self.state = LoopState::BeatDetected;
            Some(self.on_beat(level, now))
        } else {
            None
        };

        self.state = LoopState::IdleTick;
        if now.wrapping_diff(self.last_debug_at) >= self.config.debug_period_ms {
            let threshold = self.config.threshold;
            debug!(
                "Level: {} | threshold: {} (diff: {})",
                level,
                threshold,
                i32::from(level) - i32::from(threshold)
            );
            self.last_debug_at = now;
        }

        let flush = self.aggregator.tick(now, sink, time);

        self.delay.delay_ms(self.config.idle_sleep_ms);

        Iteration { level, beat, flush }
    }

    fn on_beat(&mut self, level: u16, now: Ticks) -> BeatReport {
        self.history.record(now);
        self.beat_count = self.beat_count.wrapping_add(1);

        let color = self.colors.next_color();
        self.indicator.set_color(color);

        let bpm = self.history.estimate_bpm();
        match bpm {
            Some(bpm) => {
                self.aggregator.record(bpm);
                info!(
                    "Beat #{} | level: {} | BPM: {:.1} | RGB: ({},{},{})",
                    self.beat_count,
                    level,
                    bpm,
                    color.r(),
                    color.g(),
                    color.b()
                );
            }
            None => info!(
                "Beat #{} | level: {} | BPM: n/a (not enough beats)",
                self.beat_count, level
            ),
        }

        BeatReport {
            number: self.beat_count,
            at: now,
            level,
            bpm,
            color,
        }
    }

    /// Run iterations until `stop` returns true, then shut down.
    ///
    /// The log header is written first if the log is empty; a failure there
    /// is logged and does not prevent the loop from running. `stop` is polled
    /// once before every iteration.
    pub fn run<L, T, F>(&mut self, sink: &mut L, time: &T, mut stop: F) -> RunSummary
    where
        L: LogSink + ?Sized,
        T: TimeSource + ?Sized,
        F: FnMut() -> bool,
    {
        if let Err(e) = sink.ensure_header() {
            error!(" Failed to initialize BPM log: {}", e);
        }

        info!("Beat detection started");
        let mut summary = RunSummary::default();

        while !stop() {
            let iteration = self.step(sink, time);
            summary.iterations += 1;
            if let Some(flush) = &iteration.flush {
                summary.count_flush(flush);
            }
        }

        if let Some(flush) = self.shutdown(sink, time) {
            summary.count_flush(&flush);
        }
        summary.beats = self.beat_count;
        summary
    }

    /// Turn the indicator off and make a best-effort final flush.
    ///
    /// Returns `None` when there was nothing pending to flush.
    pub fn shutdown<L, T>(
        &mut self,
        sink: &mut L,
        time: &T,
    ) -> Option<Result<FlushOutcome, StorageError>>
    where
        L: LogSink + ?Sized,
        T: TimeSource + ?Sized,
    {
        info!("Stopping beat detection after {} beats", self.beat_count);
        self.indicator.off();

        if self.aggregator.accumulator().is_empty() {
            info!(" No pending BPM samples at shutdown.");
            return None;
        }

        Some(self.aggregator.flush(sink, time))
    }
}
