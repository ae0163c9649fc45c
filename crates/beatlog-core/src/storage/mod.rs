//! BPM log persistence
//!
//! Tempo samples are reduced to one average per flush period and appended as
//! a text line to an append-only log. The log medium is reached through
//! [`LogSink`]; [`sd_card::SdCardLog`] implements it on a FAT volume.

pub mod accumulator;
pub mod record;
pub mod sd_card;

pub use accumulator::{FlushOutcome, MinuteAggregator, TempoAccumulator};
pub use record::{LINE_CAPACITY, LOG_HEADER, LogRecord};

use thiserror_no_std::Error;

use crate::diagnostic::DiagnosticText;

/// 8.3 name of the log file on the storage volume.
pub const LOG_FILE_NAME: &str = "BPM_LOG.TXT";

/// Errors raised while writing the BPM log
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("log unavailable: {0}")]
    Unavailable(DiagnosticText),
    #[error("log write failed: {0}")]
    Write(DiagnosticText),
    #[error("log line longer than {0} bytes")]
    LineTooLong(usize),
}

/// Append-only text log of averaged BPM records.
///
/// Implementations open, write and close the underlying medium inside each
/// call; nothing is held open between calls, so every line is durable once
/// the call returns `Ok`.
pub trait LogSink {
    /// Write [`LOG_HEADER`] as the first line if the log is empty.
    ///
    /// A log that already has content is left untouched.
    fn ensure_header(&mut self) -> Result<(), StorageError>;

    /// Append `line` followed by a newline.
    fn append_line(&mut self, line: &str) -> Result<(), StorageError>;
}

impl<L: LogSink + ?Sized> LogSink for &mut L {
    fn ensure_header(&mut self) -> Result<(), StorageError> {
        (**self).ensure_header()
    }

    fn append_line(&mut self, line: &str) -> Result<(), StorageError> {
        (**self).append_line(line)
    }
}
