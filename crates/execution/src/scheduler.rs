//! Fan-out dispatch shared by event groups and task groups.
//!
//! One tokio task is spawned per unit. Every worker owns one barrier
//! [`Arrival`](crate::barrier::Arrival) and a sender for its [`UnitReport`];
//! the report is sent before the arrival is consumed, so once the barrier
//! releases the caller every report that will ever arrive is already queued.

use crate::barrier::JoinBarrier;
use crate::cancel::CancelToken;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::deadline::{self, Deadline};
use crate::observer::{NoopObserver, Observer};
use crate::worker::WorkerContext;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tempo_core::{DispatchId, EngineError, GroupReport, Result, UnitOutcome, UnitReport};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Lifecycle of an event group or task group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// Built, not yet run
    Created,
    /// Workers are running
    Dispatched,
    /// Every worker reached a terminal state
    AllJoined,
}

/// What a unit's work produced.
pub(crate) struct UnitRun {
    pub(crate) outcome: UnitOutcome,
    pub(crate) fired_at: Option<Duration>,
}

pub(crate) type UnitFuture = Pin<Box<dyn Future<Output = UnitRun> + Send>>;

/// One labeled piece of fan-out work.
pub(crate) struct Unit {
    pub(crate) label: String,
    pub(crate) work: Box<dyn FnOnce(WorkerContext) -> UnitFuture + Send>,
}

/// Clock, observer, cancellation and lifecycle of one single-use group.
pub(crate) struct Dispatch {
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) observer: Arc<dyn Observer>,
    pub(crate) cancel: CancelToken,
    pub(crate) config: EngineConfig,
    state: watch::Sender<GroupState>,
}

impl Dispatch {
    pub(crate) fn new() -> Self {
        let (state, _rx) = watch::channel(GroupState::Created);
        Self {
            clock: Arc::new(SystemClock::new()),
            observer: Arc::new(NoopObserver),
            cancel: CancelToken::new(),
            config: EngineConfig::default(),
            state,
        }
    }

    pub(crate) fn state(&self) -> GroupState {
        *self.state.borrow()
    }

    /// Run every unit on its own worker and wait for all of them.
    pub(crate) async fn join_all(
        &self,
        what: &'static str,
        units: Vec<Unit>,
    ) -> Result<GroupReport> {
        let began = self.state.send_if_modified(|state| {
            if *state == GroupState::Created {
                *state = GroupState::Dispatched;
                true
            } else {
                false
            }
        });
        if !began {
            return Err(EngineError::AlreadyStarted { what });
        }

        let dispatch = DispatchId::new();
        let expected: Vec<String> = units.iter().map(|u| u.label.clone()).collect();
        let started = self.clock.now();
        info!("Dispatching {} {} with {} workers", what, dispatch, units.len());

        let deadline = deadline::arm_optional(&self.clock, &self.cancel, self.config.deadline);
        let (barrier, arrivals) = JoinBarrier::new(units.len());
        let (tx, mut rx) = mpsc::unbounded_channel();

        for (unit, arrival) in units.into_iter().zip(arrivals) {
            let ctx = WorkerContext::new(
                dispatch,
                unit.label.clone(),
                self.clock.clone(),
                self.cancel.clone(),
                self.observer.clone(),
                started,
            );
            let tx = tx.clone();

            tokio::spawn(async move {
                let run = (unit.work)(ctx.clone()).await;
                match &run.outcome {
                    UnitOutcome::Succeeded => debug!("Worker '{}' succeeded", unit.label),
                    UnitOutcome::Failed { error } => {
                        warn!("Worker '{}' failed: {}", unit.label, error)
                    }
                    UnitOutcome::Interrupted => debug!("Worker '{}' interrupted", unit.label),
                }

                let _ = tx.send(UnitReport {
                    label: unit.label,
                    outcome: run.outcome,
                    fired_at: run.fired_at,
                    finished_at: ctx.elapsed(),
                });
                arrival.arrive();
            });
        }
        drop(tx);

        barrier.wait().await;
        let timed_out = deadline.map(Deadline::disarm).unwrap_or(false);

        let mut arrived = Vec::with_capacity(expected.len());
        while let Ok(report) = rx.try_recv() {
            arrived.push(report);
        }

        let report = GroupReport::assemble(
            dispatch,
            &expected,
            arrived,
            self.cancel.is_cancelled() && !timed_out,
            timed_out,
            self.clock.now().saturating_sub(started),
        );
        self.state.send_replace(GroupState::AllJoined);

        info!(
            "Joined {} {}: {} succeeded, {} failed, {} skipped",
            what,
            dispatch,
            report.succeeded().len(),
            report.failed().len(),
            report.skipped().len()
        );
        Ok(report)
    }
}

/// Reject duplicate labels; they key the report.
pub(crate) fn ensure_unique_labels<'a>(
    what: &str,
    labels: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let mut seen = HashSet::new();
    for label in labels {
        if !seen.insert(label) {
            return Err(EngineError::InvalidConfiguration(format!(
                "duplicate {} label '{}'",
                what, label
            )));
        }
    }
    Ok(())
}
