use std::time::Duration;

use thiserror::Error;

/// A workout configuration outside the supported bounds.
///
/// This is the only error a session command hands back to its caller; the
/// session state is untouched when it is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("exercise time must be between 1 and 300 seconds, got {0}")]
    ExerciseOutOfRange(u32),
    #[error("rest time must be between 1 and 300 seconds, got {0}")]
    RestOutOfRange(u32),
    #[error("number of sets must be between 1 and 20, got {0}")]
    SetsOutOfRange(u32),
}

/// Failures of the tone output backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    #[error("audio backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Failures reported by the external music player.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no music player available")]
    Unavailable,
    #[error("`{command}` exited with {status}")]
    CommandFailed { command: String, status: String },
    #[error("`{command}` did not finish within {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
