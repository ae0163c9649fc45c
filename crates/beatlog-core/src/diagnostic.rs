//! Bounded diagnostic text for error values.

use core::fmt::{self, Write};

/// Capacity of the text carried by error variants.
pub const DIAGNOSTIC_LEN: usize = 64;

pub type DiagnosticText = heapless::String<DIAGNOSTIC_LEN>;

/// Truncates instead of failing once the buffer is full.
struct Truncating<'a>(&'a mut DiagnosticText);

impl Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                return Err(fmt::Error);
            }
        }
        Ok(())
    }
}

/// Render `args` into a [`DiagnosticText`], keeping as much as fits.
///
/// ```rust,ignore
/// let text = diagnostic(format_args!("{:?}", err));
/// ```
pub fn diagnostic(args: fmt::Arguments<'_>) -> DiagnosticText {
    let mut text = DiagnosticText::new();
    let _ = fmt::write(&mut Truncating(&mut text), args);
    text
}
