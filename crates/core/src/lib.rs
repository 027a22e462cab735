//! Tempo core data models.
//!
//! This crate defines the values the timed execution engine schedules and
//! the reports it hands back: actions, milestones, timed events, progress
//! records and the error taxonomy.

#![warn(missing_docs)]

// Identities
mod id;

// Schedulable units
mod action;
mod milestone;
mod event;

// Observation and results
mod progress;
mod report;
mod error;

// Re-exports
pub use id::DispatchId;

pub use action::{Action, ActionResult, TickAction};
pub use milestone::Milestone;
pub use event::TimedEvent;

pub use progress::{Progress, ProgressKind};
pub use report::{
    CountdownReport, GroupReport, MilestoneReport, TickFailure, UnitOutcome, UnitReport,
};
pub use error::{non_negative_millis, ActionError, EngineError, Interrupted, Result, TaskError};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
