//! Control loop state and error types for beatlog

mod control_loop;

pub use control_loop::*;

use thiserror_no_std::Error;

use crate::config::ConfigError;
use crate::diagnostic::DiagnosticText;

/// Phase of one control loop iteration.
///
/// Conceptual only: it is tracked for diagnostics and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Blocked inside the peak sampling window
    AwaitingSample,
    /// Handling an accepted beat (history, indicator, tempo)
    BeatDetected,
    /// Timers: diagnostic emit and flush check
    IdleTick,
}

/// Errors that stop the control loop from starting.
///
/// Once running, nothing in the loop is fatal; per-iteration failures are
/// logged and the loop carries on.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("indicator initialization failed: {0}")]
    Indicator(DiagnosticText),
}
