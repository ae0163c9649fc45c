//! Analog sound input and the windowed peak sampler

use embedded_hal::delay::DelayNs;

use crate::clock::MonotonicClock;

/// Trait for the analog front end of the microphone.
///
/// A read is synchronous and cannot fail: an absent or disconnected sensor
/// simply yields whatever the converter reports, and the threshold logic
/// downstream treats it like any other level.
pub trait SoundSensor {
    /// Read one raw 16-bit level (0..=65535).
    fn read_level(&mut self) -> u16;
}

impl<S: SoundSensor + ?Sized> SoundSensor for &mut S {
    fn read_level(&mut self) -> u16 {
        (**self).read_level()
    }
}

/// Reports the loudest level seen during a fixed sampling window.
///
/// The window is a hard lower bound on the latency of [`PeakSampler::sample_peak`]
/// and therefore bounds the control loop to roughly `1000 / window_ms`
/// classifications per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakSampler {
    window_ms: u32,
    poll_interval_ms: u32,
}

impl PeakSampler {
    pub const fn new(window_ms: u32, poll_interval_ms: u32) -> Self {
        Self {
            window_ms,
            poll_interval_ms,
        }
    }

    pub const fn window_ms(&self) -> u32 {
        self.window_ms
    }

    pub const fn poll_interval_ms(&self) -> u32 {
        self.poll_interval_ms
    }

    /// Poll `sensor` every `poll_interval_ms` until the window has elapsed
    /// and return the maximum reading.
    ///
    /// The sensor is read at least once, and the call never returns before
    /// `window_ms` has passed on `clock`.
    pub fn sample_peak<S, C, D>(&self, sensor: &mut S, clock: &C, delay: &mut D) -> u16
    where
        S: SoundSensor + ?Sized,
        C: MonotonicClock + ?Sized,
        D: DelayNs + ?Sized,
    {
        let start = clock.now();
        let mut peak = 0u16;

        loop {
            peak = peak.max(sensor.read_level());

            if clock.now().wrapping_diff(start) >= self.window_ms {
                break;
            }

            delay.delay_ms(self.poll_interval_ms);
        }

        peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Ticks;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::Cell;

    #[derive(Clone, Default)]
    struct SharedClock(Rc<Cell<u32>>);

    impl MonotonicClock for SharedClock {
        fn now(&self) -> Ticks {
            Ticks(self.0.get())
        }
    }

    impl DelayNs for SharedClock {
        fn delay_ns(&mut self, ns: u32) {
            self.0.set(self.0.get().wrapping_add(ns / 1_000_000));
        }

        fn delay_ms(&mut self, ms: u32) {
            self.0.set(self.0.get().wrapping_add(ms));
        }
    }

    struct ScriptedSensor {
        clock: SharedClock,
        spikes: Vec<(u32, u16)>,
        reads: usize,
    }

    impl SoundSensor for ScriptedSensor {
        fn read_level(&mut self) -> u16 {
            self.reads += 1;
            let now = self.clock.0.get();
            self.spikes
                .iter()
                .find(|(at, _)| *at == now)
                .map(|(_, level)| *level)
                .unwrap_or(1_000)
        }
    }

    #[test]
    fn test_returns_maximum_within_window() {
        let clock = SharedClock::default();
        let mut delay = clock.clone();
        let mut sensor = ScriptedSensor {
            clock: clock.clone(),
            spikes: alloc::vec![(10, 20_000), (24, 31_000), (40, 12_000)],
            reads: 0,
        };

        let peak = PeakSampler::new(50, 2).sample_peak(&mut sensor, &clock, &mut delay);

        assert_eq!(peak, 31_000);
        assert_eq!(sensor.reads, 26);
    }

    #[test]
    fn test_blocks_for_whole_window() {
        let clock = SharedClock::default();
        clock.0.set(u32::MAX - 20);
        let mut delay = clock.clone();
        let mut sensor = ScriptedSensor {
            clock: clock.clone(),
            spikes: Vec::new(),
            reads: 0,
        };

        let start = clock.now();
        PeakSampler::new(50, 3).sample_peak(&mut sensor, &clock, &mut delay);

        assert!(clock.now().wrapping_diff(start) >= 50);
    }

    #[test]
    fn test_spike_after_window_is_not_seen() {
        let clock = SharedClock::default();
        let mut delay = clock.clone();
        let mut sensor = ScriptedSensor {
            clock: clock.clone(),
            spikes: alloc::vec![(60, 50_000)],
            reads: 0,
        };

        let peak = PeakSampler::new(50, 2).sample_peak(&mut sensor, &clock, &mut delay);

        assert_eq!(peak, 1_000);
    }
}
