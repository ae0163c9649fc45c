//! Terminal stand-in for the RGB LED

use std::io::{self, Write};

use beatlog_core::Indicator;
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};

/// Prints each color as a 24-bit ANSI swatch.
pub struct TerminalIndicator<W> {
    out: W,
}

impl TerminalIndicator<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> TerminalIndicator<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Indicator for TerminalIndicator<W> {
    type Error = io::Error;

    fn init(&mut self) -> io::Result<()> {
        write!(self.out, "\x1b[0m")?;
        self.out.flush()
    }

    fn set_color(&mut self, color: Rgb888) {
        let _ = writeln!(
            self.out,
            "\x1b[48;2;{};{};{}m      \x1b[0m #{:02x}{:02x}{:02x}",
            color.r(),
            color.g(),
            color.b(),
            color.r(),
            color.g(),
            color.b()
        );
        let _ = self.out.flush();
    }
}
