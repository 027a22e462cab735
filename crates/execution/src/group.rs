//! Independent task group.
//!
//! Runs arbitrary named async tasks concurrently through the same barrier as
//! the event fan-out. The engine assumes nothing about shared state between
//! tasks; if they share anything, synchronizing it is up to the caller.

use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::observer::Observer;
use crate::scheduler::{self, Dispatch, GroupState, Unit, UnitFuture, UnitRun};
use crate::worker::WorkerContext;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tempo_core::{GroupReport, ProgressKind, Result, TaskError, UnitOutcome};

/// A unit of independent concurrent work.
///
/// Tasks should suspend through [`WorkerContext::wait`] so cancellation can
/// reach them; suspension anywhere else is opaque to the engine.
#[async_trait]
pub trait Task: Send + Sync {
    /// Run the task to completion.
    async fn run(&self, ctx: &WorkerContext) -> std::result::Result<(), TaskError>;
}

/// Adapts a closure returning a future into a [`Task`].
pub struct FnTask<F>(F);

impl<F> FnTask<F> {
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: Fn(WorkerContext) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<(), TaskError>> + Send + 'static,
{
    async fn run(&self, ctx: &WorkerContext) -> std::result::Result<(), TaskError> {
        (self.0)(ctx.clone()).await
    }
}

/// A task with its label.
#[derive(Clone)]
pub struct NamedTask {
    label: String,
    task: Arc<dyn Task>,
}

impl NamedTask {
    /// Label a task.
    pub fn new(label: impl Into<String>, task: impl Task + 'static) -> Self {
        Self {
            label: label.into(),
            task: Arc::new(task),
        }
    }

    /// Label a closure returning a future.
    pub fn from_fn<F, Fut>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(WorkerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), TaskError>> + Send + 'static,
    {
        Self::new(label, FnTask::new(f))
    }

    /// Task label.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for NamedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedTask").field("label", &self.label).finish()
    }
}

/// A single-use group of independent tasks.
pub struct TaskGroup {
    tasks: Vec<NamedTask>,
    dispatch: Dispatch,
}

impl TaskGroup {
    /// Create a group, rejecting duplicate labels.
    pub fn new(tasks: Vec<NamedTask>) -> Result<Self> {
        scheduler::ensure_unique_labels("task", tasks.iter().map(NamedTask::label))?;
        Ok(Self {
            tasks,
            dispatch: Dispatch::new(),
        })
    }

    /// Use a different clock (defaults to the system clock).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.dispatch.clock = clock;
        self
    }

    /// Attach an observer.
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.dispatch.observer = observer;
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.dispatch.config = config;
        self
    }

    /// Labels of the tasks in this group.
    pub fn labels(&self) -> Vec<&str> {
        self.tasks.iter().map(NamedTask::label).collect()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GroupState {
        self.dispatch.state()
    }

    /// Raise the group's cancellation signal. Idempotent.
    pub fn cancel(&self) {
        self.dispatch.cancel.cancel();
    }

    /// A handle for cancelling the group from another task.
    pub fn cancel_token(&self) -> CancelToken {
        self.dispatch.cancel.clone()
    }

    /// Start every task at once and block until all have finished.
    pub async fn run_independent(&self) -> Result<GroupReport> {
        let units = self.tasks.iter().cloned().map(task_unit).collect();
        self.dispatch.join_all("task group", units).await
    }
}

fn task_unit(named: NamedTask) -> Unit {
    Unit {
        label: named.label.clone(),
        work: Box::new(move |ctx: WorkerContext| -> UnitFuture {
            Box::pin(async move {
                let fired_at = ctx.elapsed();
                let outcome = match named.task.run(&ctx).await {
                    Ok(()) => UnitOutcome::Succeeded,
                    Err(TaskError::Interrupted(_)) => UnitOutcome::Interrupted,
                    Err(TaskError::Failed(error)) => UnitOutcome::Failed { error },
                };

                // Interrupted tasks did not finish; the report lists them as skipped
                if outcome.fired() {
                    ctx.emit(
                        &named.label,
                        ProgressKind::Task {
                            succeeded: outcome.is_success(),
                        },
                    );
                }
                UnitRun {
                    outcome,
                    fired_at: Some(fired_at),
                }
            })
        }),
    }
}
