//! Progress records - what the engine tells its observers.

use crate::id::DispatchId;
use crate::Time;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single observable happening inside a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Dispatch this record belongs to
    pub dispatch: DispatchId,

    /// Label of the tick, milestone, event or task
    pub label: String,

    /// What happened
    pub kind: ProgressKind,

    /// Clock time since the dispatch started (logical for virtual clocks)
    pub elapsed: Duration,

    /// Wall-clock timestamp
    pub timestamp: Time,
}

impl Progress {
    /// Create a new progress record stamped with the current wall time.
    pub fn new(
        dispatch: DispatchId,
        label: impl Into<String>,
        kind: ProgressKind,
        elapsed: Duration,
    ) -> Self {
        Self {
            dispatch,
            label: label.into(),
            kind,
            elapsed,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Kind of progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressKind {
    /// A countdown base tick
    Tick {
        /// Current countdown value
        value: u64,
    },
    /// A countdown milestone fired
    Milestone {
        /// Value the milestone is bound to
        trigger: u64,
    },
    /// A timed event fired
    Event {
        /// Delay the event waited out
        delay: Duration,
    },
    /// An independent task finished
    Task {
        /// Whether the task succeeded
        succeeded: bool,
    },
}

impl ProgressKind {
    /// Short name for rendering.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressKind::Tick { .. } => "tick",
            ProgressKind::Milestone { .. } => "milestone",
            ProgressKind::Event { .. } => "event",
            ProgressKind::Task { .. } => "task",
        }
    }
}
