//! Error taxonomy shared by the engine and its callers.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Raised when a wait is cut short by cooperative cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("interrupted while waiting")]
pub struct Interrupted;

/// Failure reported by a user-supplied action.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ActionError {
    /// Human readable cause
    pub message: String,
}

impl ActionError {
    /// Create a new action error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error returned by tasks of an independent task group.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task was woken early by cancellation
    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    /// The task itself failed
    #[error(transparent)]
    Failed(#[from] ActionError),
}

/// Errors surfaced synchronously by the engine.
///
/// Run-time failures of individual workers are never reported through this
/// type; they are collected into the dispatch report instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected at construction, before any worker is spawned
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Countdowns and groups run exactly once
    #[error("{what} has already been started")]
    AlreadyStarted {
        /// Kind of dispatch object
        what: &'static str,
    },

    /// A worker exited (e.g. panicked) before delivering its report
    #[error("worker for '{label}' terminated without reporting")]
    WorkerLost {
        /// Label of the lost worker
        label: String,
    },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Convert a signed millisecond count into a duration, rejecting negatives.
pub fn non_negative_millis(what: &str, millis: i64) -> Result<Duration> {
    u64::try_from(millis)
        .map(Duration::from_millis)
        .map_err(|_| {
            EngineError::InvalidConfiguration(format!(
                "{} must not be negative (got {}ms)",
                what, millis
            ))
        })
}
