//! RGB beat indicator
//!
//! Purely cosmetic feedback: each detected beat latches a fresh random color
//! on the indicator until the next beat.

use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Color shown briefly at startup to prove the indicator works.
pub const SELF_TEST_COLOR: Rgb888 = Rgb888::new(10, 10, 10);

/// How long the startup color stays on.
pub const SELF_TEST_MS: u32 = 50;

/// Lowest value of each channel of a beat color, so every color is clearly visible.
pub const MIN_CHANNEL: u8 = 100;

/// Trait for the RGB indicator driver.
pub trait Indicator {
    type Error: core::fmt::Debug;

    /// Bring up the driver. A failure here is fatal to the control loop.
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Show `color` until the next call. Fire-and-forget.
    fn set_color(&mut self, color: Rgb888);

    fn off(&mut self) {
        self.set_color(Rgb888::BLACK);
    }
}

impl<I: Indicator + ?Sized> Indicator for &mut I {
    type Error = I::Error;

    fn init(&mut self) -> Result<(), Self::Error> {
        (**self).init()
    }

    fn set_color(&mut self, color: Rgb888) {
        (**self).set_color(color)
    }

    fn off(&mut self) {
        (**self).off()
    }
}

/// Source of bright random beat colors.
#[derive(Debug, Clone)]
pub struct ColorPicker {
    rng: SmallRng,
}

impl ColorPicker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Pick a color with every channel in `MIN_CHANNEL..=255`.
    pub fn next_color(&mut self) -> Rgb888 {
        Rgb888::new(
            self.rng.gen_range(MIN_CHANNEL..=u8::MAX),
            self.rng.gen_range(MIN_CHANNEL..=u8::MAX),
            self.rng.gen_range(MIN_CHANNEL..=u8::MAX),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colors_are_bright() {
        let mut picker = ColorPicker::new(7);
        for _ in 0..500 {
            let color = picker.next_color();
            assert!(color.r() >= MIN_CHANNEL);
            assert!(color.g() >= MIN_CHANNEL);
            assert!(color.b() >= MIN_CHANNEL);
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = ColorPicker::new(42);
        let mut b = ColorPicker::new(42);
        for _ in 0..10 {
            assert_eq!(a.next_color(), b.next_color());
        }
    }
}
