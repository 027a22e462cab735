//! Timed event model - one unit of fan-out work.

use crate::action::{Action, ActionResult};
use crate::error::{non_negative_millis, Result};
use std::time::Duration;

/// An action bound to a relative delay, run by its own worker.
#[derive(Debug, Clone)]
pub struct TimedEvent {
    label: String,
    delay: Duration,
    action: Action,
}

impl TimedEvent {
    /// Create a new timed event.
    pub fn new(label: impl Into<String>, delay: Duration, action: Action) -> Self {
        Self {
            label: label.into(),
            delay,
            action,
        }
    }

    /// Create a timed event from a signed millisecond delay.
    ///
    /// Negative delays are rejected with `InvalidConfiguration`.
    pub fn from_millis(label: impl Into<String>, delay_ms: i64, action: Action) -> Result<Self> {
        let label = label.into();
        let delay = non_negative_millis(&format!("delay of '{}'", label), delay_ms)?;
        Ok(Self::new(label, delay, action))
    }

    /// Event label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Delay before the action fires. Zero means as soon as scheduled.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Invoke the event's action.
    pub fn fire(&self) -> ActionResult {
        self.action.invoke()
    }
}
