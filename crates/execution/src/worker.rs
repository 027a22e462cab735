//! Per-worker execution context.

use crate::cancel::CancelToken;
use crate::clock::{self, Clock};
use crate::observer::Observer;
use std::sync::Arc;
use std::time::Duration;
use tempo_core::{DispatchId, Interrupted, Progress, ProgressKind};

/// What a worker knows about the dispatch it belongs to.
///
/// Handed to every fan-out worker and independent task. Its [`wait`] is the
/// only suspension point the engine knows about.
///
/// [`wait`]: WorkerContext::wait
#[derive(Clone)]
pub struct WorkerContext {
    dispatch: DispatchId,
    label: String,
    clock: Arc<dyn Clock>,
    cancel: CancelToken,
    observer: Arc<dyn Observer>,
    started: Duration,
}

impl WorkerContext {
    pub(crate) fn new(
        dispatch: DispatchId,
        label: impl Into<String>,
        clock: Arc<dyn Clock>,
        cancel: CancelToken,
        observer: Arc<dyn Observer>,
        started: Duration,
    ) -> Self {
        Self {
            dispatch,
            label: label.into(),
            clock,
            cancel,
            observer,
            started,
        }
    }

    /// Dispatch this worker belongs to.
    pub fn dispatch(&self) -> DispatchId {
        self.dispatch
    }

    /// Label of the unit this worker runs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Clock time since the dispatch started.
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.started)
    }

    /// Whether the dispatch has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Suspend for `duration`, or fail with [`Interrupted`] on cancellation.
    pub async fn wait(&self, duration: Duration) -> Result<(), Interrupted> {
        clock::wait(self.clock.as_ref(), duration, &self.cancel).await
    }

    /// Emit a progress record for this worker.
    pub(crate) fn emit(&self, label: &str, kind: ProgressKind) {
        self.observer
            .observe(&Progress::new(self.dispatch, label, kind, self.elapsed()));
    }
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("dispatch", &self.dispatch)
            .field("label", &self.label)
            .field("started", &self.started)
            .finish()
    }
}
