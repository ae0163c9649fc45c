use alloc::collections::VecDeque;

use embedded_sdmmc::TimeSource;
use log::{error, info, warn};

use super::{LogRecord, LogSink, StorageError};
use crate::clock::Ticks;

/// Result of a flush that did not fail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlushOutcome {
    /// Nothing was accumulated; no record was written.
    Empty,
    /// One record was appended to the log.
    Written(LogRecord),
}

/// Tempo samples gathered since the last successful flush.
///
/// Growth is bounded by `max_samples`: when persistence keeps failing and the
/// bound is reached, the oldest sample is dropped for each new one.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoAccumulator {
    samples: VecDeque<f32>,
    max_samples: usize,
    /// Samples dropped because of the bound since the last successful flush
    dropped: u32,
}

impl TempoAccumulator {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            max_samples,
            dropped: 0,
        }
    }

    pub fn push(&mut self, bpm: f32) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
            if self.dropped == 0 {
                warn!(
                    " Tempo backlog reached {} samples, dropping oldest",
                    self.max_samples
                );
            }
            self.dropped = self.dropped.saturating_add(1);
        }
        self.samples.push_back(bpm);
    }

    /// Arithmetic mean of the pending samples.
    pub fn average(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(|&s| f64::from(s)).sum();
        Some((sum / self.samples.len() as f64) as f32)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.samples.iter().copied()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.dropped = 0;
    }
}

/// Reduces tempo samples to one logged average per flush period.
///
/// The period is measured on the monotonic clock and is independent of beat
/// occurrence. A failed write keeps the samples so they are retried at the
/// next period.
///
/// ## Usage
///
/// ```rust,ignore
/// let mut aggregator = MinuteAggregator::new(60_000, 4096, clock.now());
///
/// // On every tempo estimate
/// aggregator.record(bpm);
///
/// // On every loop iteration
/// aggregator.tick(clock.now(), &mut sink, &time_source);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MinuteAggregator {
    accumulator: TempoAccumulator,
    flush_period_ms: u32,
    last_flush_at: Ticks,
}

impl MinuteAggregator {
    pub fn new(flush_period_ms: u32, max_samples: usize, now: Ticks) -> Self {
        Self {
            accumulator: TempoAccumulator::new(max_samples),
            flush_period_ms,
            last_flush_at: now,
        }
    }

    pub fn accumulator(&self) -> &TempoAccumulator {
        &self.accumulator
    }

    pub fn flush_period_ms(&self) -> u32 {
        self.flush_period_ms
    }

    /// Add one tempo sample to the pending window.
    pub fn record(&mut self, bpm: f32) {
        self.accumulator.push(bpm);
    }

    /// Whether a full flush period has elapsed since the last flush attempt.
    pub fn is_due(&self, now: Ticks) -> bool {
        now.wrapping_diff(self.last_flush_at) >= self.flush_period_ms
    }

    /// Flush if the period has elapsed.
    ///
    /// The period is re-armed on every attempt, whether the flush wrote a
    /// record, found nothing to write, or failed.
    pub fn tick<L, T>(
        &mut self,
        now: Ticks,
        sink: &mut L,
        time: &T,
    ) -> Option<Result<FlushOutcome, StorageError>>
    where
        L: LogSink + ?Sized,
        T: TimeSource + ?Sized,
    {
        if !self.is_due(now) {
            return None;
        }
        self.last_flush_at = now;
        Some(self.flush(sink, time))
    }

    /// Write the average of the pending samples and clear them.
    ///
    /// An empty window is not an error: nothing is written and
    /// [`FlushOutcome::Empty`] is returned. On failure the samples stay
    /// pending and the error is returned.
    pub fn flush<L, T>(&mut self, sink: &mut L, time: &T) -> Result<FlushOutcome, StorageError>
    where
        L: LogSink + ?Sized,
        T: TimeSource + ?Sized,
    {
        let Some(average) = self.accumulator.average() else {
            info!(" BPM window empty, nothing saved.");
            return Ok(FlushOutcome::Empty);
        };

        let record = LogRecord::new(time.get_timestamp(), average);
        let written = record
            .to_line()
            .and_then(|line| sink.append_line(line.as_str()));

        match written {
            Ok(()) => {
                info!(
                    " Saved average BPM {:.2} ({} samples).",
                    average,
                    self.accumulator.len()
                );
                self.accumulator.clear();
                Ok(FlushOutcome::Written(record))
            }
            Err(e) => {
                error!(
                    " Failed to save BPM average ({} samples kept): {}",
                    self.accumulator.len(),
                    e
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::diagnostic;
    use crate::storage::LOG_HEADER;
    use alloc::string::{String, ToString};
    use alloc::vec::Vec;
    use approx::assert_relative_eq;
    use embedded_sdmmc::Timestamp;

    struct FixedTime;

    impl TimeSource for FixedTime {
        fn get_timestamp(&self) -> Timestamp {
            Timestamp {
                year_since_1970: 56,
                zero_indexed_month: 0,
                zero_indexed_day: 14,
                hours: 9,
                minutes: 30,
                seconds: 0,
            }
        }
    }

    #[derive(Default)]
    struct MemoryLog {
        lines: Vec<String>,
        failing: bool,
    }

    impl LogSink for MemoryLog {
        fn ensure_header(&mut self) -> Result<(), StorageError> {
            if self.lines.is_empty() {
                self.lines.push(LOG_HEADER.to_string());
            }
            Ok(())
        }

        fn append_line(&mut self, line: &str) -> Result<(), StorageError> {
            if self.failing {
                return Err(StorageError::Unavailable(diagnostic(format_args!(
                    "card removed"
                ))));
            }
            self.lines.push(line.to_string());
            Ok(())
        }
    }

    fn aggregator_with(samples: &[f32]) -> MinuteAggregator {
        let mut aggregator = MinuteAggregator::new(60_000, 4_096, Ticks(0));
        for &bpm in samples {
            aggregator.record(bpm);
        }
        aggregator
    }

    #[test]
    fn test_flush_writes_average_and_clears() {
        let mut aggregator = aggregator_with(&[120.0, 130.0, 110.0]);
        let mut log = MemoryLog::default();

        let outcome = aggregator.flush(&mut log, &FixedTime).unwrap();

        let FlushOutcome::Written(record) = outcome else {
            panic!("expected a written record, got {:?}", outcome);
        };
        assert_relative_eq!(record.average_bpm, 120.0);
        assert_eq!(log.lines, ["2026-01-15 09:30:00,120.00"]);
        assert!(aggregator.accumulator().is_empty());
    }

    #[test]
    fn test_flush_of_empty_window_writes_nothing() {
        let mut aggregator = aggregator_with(&[]);
        let mut log = MemoryLog::default();

        assert_eq!(aggregator.flush(&mut log, &FixedTime), Ok(FlushOutcome::Empty));
        assert!(log.lines.is_empty());
    }

    #[test]
    fn test_failed_flush_keeps_samples_for_retry() {
        let mut aggregator = aggregator_with(&[120.0, 130.0, 110.0]);
        let mut log = MemoryLog {
            failing: true,
            ..Default::default()
        };

        assert!(aggregator.flush(&mut log, &FixedTime).is_err());
        let kept: Vec<f32> = aggregator.accumulator().iter().collect();
        assert_eq!(kept, [120.0, 130.0, 110.0]);

        aggregator.record(140.0);
        log.failing = false;
        let outcome = aggregator.flush(&mut log, &FixedTime).unwrap();
        let FlushOutcome::Written(record) = outcome else {
            panic!("expected a written record, got {:?}", outcome);
        };
        assert_relative_eq!(record.average_bpm, 125.0);
        assert_eq!(log.lines.len(), 1);
    }

    #[test]
    fn test_tick_waits_for_full_period() {
        let mut aggregator = aggregator_with(&[100.0]);
        let mut log = MemoryLog::default();

        assert!(aggregator.tick(Ticks(59_999), &mut log, &FixedTime).is_none());
        assert!(matches!(
            aggregator.tick(Ticks(60_000), &mut log, &FixedTime),
            Some(Ok(FlushOutcome::Written(_)))
        ));
        assert!(aggregator.tick(Ticks(60_010), &mut log, &FixedTime).is_none());
        assert!(matches!(
            aggregator.tick(Ticks(120_000), &mut log, &FixedTime),
            Some(Ok(FlushOutcome::Empty))
        ));
    }

    #[test]
    fn test_tick_rearms_after_failure() {
        let mut aggregator = aggregator_with(&[100.0]);
        let mut log = MemoryLog {
            failing: true,
            ..Default::default()
        };

        assert!(matches!(
            aggregator.tick(Ticks(60_000), &mut log, &FixedTime),
            Some(Err(_))
        ));
        log.failing = false;
        assert!(aggregator.tick(Ticks(61_000), &mut log, &FixedTime).is_none());
        assert!(matches!(
            aggregator.tick(Ticks(120_000), &mut log, &FixedTime),
            Some(Ok(FlushOutcome::Written(_)))
        ));
    }

    #[test]
    fn test_period_measured_across_clock_wrap() {
        let start = Ticks(u32::MAX - 10_000);
        let mut aggregator = MinuteAggregator::new(60_000, 16, start);
        assert!(!aggregator.is_due(start.wrapping_add(59_999)));
        assert!(aggregator.is_due(start.wrapping_add(60_000)));
    }

    #[test]
    fn test_backlog_drops_oldest_beyond_bound() {
        let mut accumulator = TempoAccumulator::new(3);
        for bpm in [90.0, 100.0, 110.0, 120.0, 130.0] {
            accumulator.push(bpm);
        }

        let kept: Vec<f32> = accumulator.iter().collect();
        assert_eq!(kept, [110.0, 120.0, 130.0]);
        assert_eq!(accumulator.dropped(), 2);

        accumulator.clear();
        assert_eq!(accumulator.dropped(), 0);
        assert_eq!(accumulator.average(), None);
    }
}
