//! Observability hook.
//!
//! The engine performs no output of its own. It hands a [`Progress`] record
//! to an [`Observer`] once per tick and once per fired milestone, event or
//! finished task; rendering is left to whoever implements the trait.

use tempo_core::{Progress, ProgressKind};
use tokio::sync::mpsc;
use tracing::info;

/// Receives progress records from a running dispatch.
///
/// Observers are called from worker tasks and must not block.
pub trait Observer: Send + Sync {
    /// Handle one progress record.
    fn observe(&self, progress: &Progress);
}

impl<F> Observer for F
where
    F: Fn(&Progress) + Send + Sync,
{
    fn observe(&self, progress: &Progress) {
        self(progress)
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn observe(&self, _progress: &Progress) {}
}

/// Logs every record through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn observe(&self, progress: &Progress) {
        match &progress.kind {
            ProgressKind::Tick { value } => {
                info!(dispatch = %progress.dispatch, value, "tick {}", progress.label)
            }
            ProgressKind::Milestone { trigger } => {
                info!(dispatch = %progress.dispatch, trigger, "milestone {}", progress.label)
            }
            ProgressKind::Event { delay } => {
                info!(dispatch = %progress.dispatch, ?delay, "event {}", progress.label)
            }
            ProgressKind::Task { succeeded } => {
                info!(dispatch = %progress.dispatch, succeeded, "task {}", progress.label)
            }
        }
    }
}

/// Forwards records into an unbounded channel, turning them into a stream.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<Progress>,
}

impl ChannelObserver {
    /// Create an observer and the receiving end of its stream.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Progress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Observer for ChannelObserver {
    fn observe(&self, progress: &Progress) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send(progress.clone());
    }
}
