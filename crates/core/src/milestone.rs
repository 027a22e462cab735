//! Milestone model - actions bound to a countdown value.

use crate::action::{Action, ActionResult};

/// An action fired once, when a countdown reaches `trigger`.
///
/// Milestones are immutable once built.
#[derive(Debug, Clone)]
pub struct Milestone {
    trigger: u64,
    label: String,
    action: Action,
}

impl Milestone {
    /// Create a new milestone.
    pub fn new(trigger: u64, label: impl Into<String>, action: Action) -> Self {
        Self {
            trigger,
            label: label.into(),
            action,
        }
    }

    /// Countdown value at which this milestone fires.
    pub fn trigger(&self) -> u64 {
        self.trigger
    }

    /// Label used in progress records and reports.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Invoke the milestone's action.
    pub fn fire(&self) -> ActionResult {
        self.action.invoke()
    }
}
