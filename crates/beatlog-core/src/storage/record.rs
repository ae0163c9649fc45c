//! One line of the BPM log.

use core::fmt::{self, Display, Write};

use embedded_sdmmc::Timestamp;

use super::StorageError;

/// First line of a fresh log.
pub const LOG_HEADER: &str = "YYYY-MM-DD HH:MM:SS,bpm";

/// Upper bound on the length of a formatted record line.
pub const LINE_CAPACITY: usize = 48;

/// Averaged tempo for one flush period, stamped with calendar time.
///
/// Formats as `YYYY-MM-DD HH:MM:SS,<bpm to 2 decimals>`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogRecord {
    pub timestamp: Timestamp,
    pub average_bpm: f32,
}

impl LogRecord {
    pub fn new(timestamp: Timestamp, average_bpm: f32) -> Self {
        Self {
            timestamp,
            average_bpm,
        }
    }

    /// Render the record as a log line without the trailing newline.
    pub fn to_line(&self) -> Result<heapless::String<LINE_CAPACITY>, StorageError> {
        let mut line = heapless::String::new();
        write!(line, "{}", self).map_err(|_| StorageError::LineTooLong(LINE_CAPACITY))?;
        Ok(line)
    }
}

impl Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ts = &self.timestamp;
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02},{:.2}",
            1970 + u16::from(ts.year_since_1970),
            ts.zero_indexed_month + 1,
            ts.zero_indexed_day + 1,
            ts.hours,
            ts.minutes,
            ts.seconds,
            self.average_bpm
        )
    }
}
