//! Wrapping millisecond clock
//!
//! Every timer in the control loop (refractory interval, sample window,
//! diagnostic period, flush period) is measured on a free-running `u32`
//! millisecond counter that wraps at `u32::MAX`. Durations are always taken
//! with [`Ticks::wrapping_diff`], which stays correct across a wrap as long
//! as the real interval is shorter than one full counter period (~49.7 days).

/// A reading of the monotonic millisecond counter.
///
/// Not ordered: two readings are compared through [`Ticks::wrapping_diff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ticks(pub u32);

impl Ticks {
    pub const fn from_millis(ms: u32) -> Self {
        Self(ms)
    }

    pub const fn as_millis(self) -> u32 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`, modulo 2^32.
    pub const fn wrapping_diff(self, earlier: Ticks) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// The reading `ms` milliseconds after `self`.
    pub const fn wrapping_add(self, ms: u32) -> Ticks {
        Ticks(self.0.wrapping_add(ms))
    }
}

/// Source of [`Ticks`]. Reading the clock has no side effects.
pub trait MonotonicClock {
    fn now(&self) -> Ticks;
}

impl<C: MonotonicClock + ?Sized> MonotonicClock for &C {
    fn now(&self) -> Ticks {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_difference() {
        assert_eq!(Ticks(1500).wrapping_diff(Ticks(1000)), 500);
        assert_eq!(Ticks(7).wrapping_diff(Ticks(7)), 0);
    }

    #[test]
    fn test_difference_across_wrap_matches_shifted_scenario() {
        let earlier = Ticks(u32::MAX - 99);
        let later = earlier.wrapping_add(250);
        assert_eq!(later, Ticks(150));
        assert_eq!(later.wrapping_diff(earlier), 250);
        assert_eq!(
            later.wrapping_diff(earlier),
            Ticks(250).wrapping_diff(Ticks(0))
        );
    }

    #[test]
    fn test_difference_for_every_base_near_wrap() {
        for base in (u32::MAX - 1000)..=u32::MAX {
            let start = Ticks(base);
            assert_eq!(start.wrapping_add(60_000).wrapping_diff(start), 60_000);
        }
    }
}
