//! Host clocks: virtual time for fast runs, the wall clock for real-time runs

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use beatlog_core::{MonotonicClock, Ticks};
use embedded_hal::delay::DelayNs;

/// A monotonic clock that also knows how long the simulation has run.
///
/// Both implementations double as the loop's delay provider, so a sleep always
/// advances the same time base that the detector reads.
pub trait SimClock: MonotonicClock + DelayNs + Clone {
    /// Time since the clock was created.
    fn elapsed(&self) -> Duration;
}

/// Time that only advances when the loop sleeps.
///
/// A minute of device time passes in a few milliseconds of host time. Clones
/// share the same counter.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    elapsed_ns: Rc<Cell<u64>>,
    origin: u32,
}

impl VirtualClock {
    /// Start the tick counter at `origin` ms.
    pub fn new(origin: u32) -> Self {
        Self {
            elapsed_ns: Rc::new(Cell::new(0)),
            origin,
        }
    }
}

impl MonotonicClock for VirtualClock {
    fn now(&self) -> Ticks {
        Ticks(self.origin).wrapping_add(self.elapsed().as_millis() as u32)
    }
}

impl DelayNs for VirtualClock {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns
            .set(self.elapsed_ns.get().saturating_add(u64::from(ns)));
    }
}

impl SimClock for VirtualClock {
    fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns.get())
    }
}

/// The host's monotonic clock, with blocking sleeps.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    started: Instant,
    origin: u32,
}

impl SystemClock {
    pub fn new(origin: u32) -> Self {
        Self {
            started: Instant::now(),
            origin,
        }
    }
}

impl MonotonicClock for SystemClock {
    fn now(&self) -> Ticks {
        Ticks(self.origin).wrapping_add(self.elapsed().as_millis() as u32)
    }
}

impl DelayNs for SystemClock {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

impl SimClock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
