//! Dispatch reports - the aggregated result handed back after a join.
//!
//! A report always says which labeled units succeeded, which failed (with
//! cause) and which were skipped because of cancellation or a deadline.

use crate::error::{ActionError, EngineError};
use crate::id::DispatchId;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

/// Terminal state of one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    /// The action ran and succeeded
    Succeeded,
    /// The action ran and failed
    Failed {
        /// Cause of the failure
        error: ActionError,
    },
    /// Cancellation woke the worker before its action ran
    Interrupted,
}

impl UnitOutcome {
    /// Whether the unit's action was invoked.
    pub fn fired(&self) -> bool {
        !matches!(self, UnitOutcome::Interrupted)
    }

    /// Whether the unit succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, UnitOutcome::Succeeded)
    }
}

impl From<Result<(), ActionError>> for UnitOutcome {
    fn from(result: Result<(), ActionError>) -> Self {
        match result {
            Ok(()) => UnitOutcome::Succeeded,
            Err(error) => UnitOutcome::Failed { error },
        }
    }
}

/// Report of one fan-out worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    /// Event or task label
    pub label: String,

    /// Terminal state
    pub outcome: UnitOutcome,

    /// When the action was invoked, relative to dispatch start
    pub fired_at: Option<Duration>,

    /// When the worker reached its terminal state, relative to dispatch start
    pub finished_at: Duration,
}

/// Aggregated result of an event group or task group run.
#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    /// Dispatch identifier
    pub dispatch: DispatchId,

    /// Unit reports in arrival order
    pub units: Vec<UnitReport>,

    /// Cancellation was raised by a caller
    pub cancelled: bool,

    /// The dispatch deadline expired
    pub timed_out: bool,

    /// Total clock time from dispatch to join
    pub elapsed: Duration,
}

impl GroupReport {
    /// Build a report from the reports that arrived before the join.
    ///
    /// Every label in `expected` that did not deliver a report is recorded as
    /// failed with a [`EngineError::WorkerLost`] cause.
    pub fn assemble(
        dispatch: DispatchId,
        expected: &[String],
        arrived: Vec<UnitReport>,
        cancelled: bool,
        timed_out: bool,
        elapsed: Duration,
    ) -> Self {
        let seen: HashSet<&str> = arrived.iter().map(|u| u.label.as_str()).collect();
        let lost: Vec<UnitReport> = expected
            .iter()
            .filter(|label| !seen.contains(label.as_str()))
            .map(|label| UnitReport {
                label: label.clone(),
                outcome: UnitOutcome::Failed {
                    error: ActionError::new(
                        EngineError::WorkerLost {
                            label: label.clone(),
                        }
                        .to_string(),
                    ),
                },
                fired_at: None,
                finished_at: elapsed,
            })
            .collect();

        let mut units = arrived;
        units.extend(lost);

        Self {
            dispatch,
            units,
            cancelled,
            timed_out,
            elapsed,
        }
    }

    /// Labels whose action was invoked, in arrival order.
    pub fn fired(&self) -> Vec<&str> {
        self.units
            .iter()
            .filter(|u| u.outcome.fired())
            .map(|u| u.label.as_str())
            .collect()
    }

    /// Labels that succeeded.
    pub fn succeeded(&self) -> Vec<&str> {
        self.units
            .iter()
            .filter(|u| u.outcome.is_success())
            .map(|u| u.label.as_str())
            .collect()
    }

    /// Labels that failed, with their cause.
    pub fn failed(&self) -> Vec<(&str, &ActionError)> {
        self.units
            .iter()
            .filter_map(|u| match &u.outcome {
                UnitOutcome::Failed { error } => Some((u.label.as_str(), error)),
                _ => None,
            })
            .collect()
    }

    /// Labels skipped because of cancellation or the deadline.
    pub fn skipped(&self) -> Vec<&str> {
        self.units
            .iter()
            .filter(|u| !u.outcome.fired())
            .map(|u| u.label.as_str())
            .collect()
    }

    /// Labels that never completed their work: skipped units plus workers
    /// lost before reporting.
    pub fn missing(&self) -> Vec<&str> {
        self.units
            .iter()
            .filter(|u| !u.outcome.fired() || u.fired_at.is_none())
            .map(|u| u.label.as_str())
            .collect()
    }

    /// Whether every unit reached its action.
    pub fn is_complete(&self) -> bool {
        self.units.iter().all(|u| u.outcome.fired())
    }

    /// Whether every unit succeeded.
    pub fn is_success(&self) -> bool {
        self.units.iter().all(|u| u.outcome.is_success())
    }

    /// Look up a unit by label.
    pub fn unit(&self, label: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.label == label)
    }
}

/// A milestone that fired during a countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MilestoneReport {
    /// Milestone label
    pub label: String,

    /// Countdown value it fired at
    pub trigger: u64,

    /// Result of its action
    pub outcome: UnitOutcome,

    /// When it fired, relative to countdown start
    pub fired_at: Duration,
}

/// A base tick action that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickFailure {
    /// Countdown value
    pub value: u64,

    /// Cause
    pub error: ActionError,
}

/// Result of a countdown run.
#[derive(Debug, Clone, Serialize)]
pub struct CountdownReport {
    /// Dispatch identifier
    pub dispatch: DispatchId,

    /// Value the countdown started from
    pub start: u64,

    /// Emitted base ticks, strictly decreasing
    pub ticks: Vec<u64>,

    /// Failed base tick actions
    pub tick_failures: Vec<TickFailure>,

    /// Fired milestones in firing order
    pub milestones: Vec<MilestoneReport>,

    /// Milestones that never fired because the run stopped early
    pub skipped: Vec<String>,

    /// Countdown value at which cancellation stopped the run
    pub interrupted_at: Option<u64>,

    /// The deadline expired
    pub timed_out: bool,

    /// Total clock time of the run
    pub elapsed: Duration,
}

impl CountdownReport {
    /// Create an empty report for a countdown starting at `start`.
    pub fn new(dispatch: DispatchId, start: u64) -> Self {
        Self {
            dispatch,
            start,
            ticks: Vec::new(),
            tick_failures: Vec::new(),
            milestones: Vec::new(),
            skipped: Vec::new(),
            interrupted_at: None,
            timed_out: false,
            elapsed: Duration::ZERO,
        }
    }

    /// Whether the countdown reached zero.
    pub fn is_complete(&self) -> bool {
        self.interrupted_at.is_none()
    }

    /// Labels of milestones whose action failed, with their cause.
    pub fn failed_milestones(&self) -> Vec<(&str, &ActionError)> {
        self.milestones
            .iter()
            .filter_map(|m| match &m.outcome {
                UnitOutcome::Failed { error } => Some((m.label.as_str(), error)),
                _ => None,
            })
            .collect()
    }
}
