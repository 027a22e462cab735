//! Concurrent event fan-out with a join barrier.
//!
//! Each [`TimedEvent`] gets its own worker that waits out the event's delay
//! and then fires its action. Actions fire roughly in ascending delay order,
//! but nothing serializes the workers: events with equal or very close
//! delays may fire in either order, and callers must not depend on it.

use crate::cancel::CancelToken;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::observer::{NoopObserver, Observer};
use crate::scheduler::{self, Dispatch, GroupState, Unit, UnitFuture, UnitRun};
use crate::worker::WorkerContext;
use std::sync::Arc;
use std::time::Duration;
use tempo_core::{Action, GroupReport, ProgressKind, Result, TimedEvent, UnitOutcome};

/// A single-use set of timed events.
///
/// Lifecycle: `Created → Dispatched → AllJoined`.
pub struct EventGroup {
    events: Vec<TimedEvent>,
    dispatch: Dispatch,
}

impl EventGroup {
    /// Create a group, rejecting duplicate labels.
    pub fn new(events: Vec<TimedEvent>) -> Result<Self> {
        scheduler::ensure_unique_labels("event", events.iter().map(TimedEvent::label))?;
        Ok(Self {
            events,
            dispatch: Dispatch::new(),
        })
    }

    /// Start building a group event by event.
    pub fn builder() -> EventGroupBuilder {
        EventGroupBuilder::default()
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

    /// The events of this group.
    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GroupState {
        self.dispatch.state()
    }

    /// Raise the group's cancellation signal.
    ///
    /// Workers still waiting out their delay wake up as interrupted. Safe to
    /// call any number of times, including after the group joined.
    pub fn cancel(&self) {
        self.dispatch.cancel.cancel();
    }

    /// A handle for cancelling the group from another task.
    pub fn cancel_token(&self) -> CancelToken {
        self.dispatch.cancel.clone()
    }

    /// Run every event on its own worker and block until all have joined.
    ///
    /// Action failures are isolated to their worker and returned in the
    /// report; they never wake the caller early.
    pub async fn run_all(&self) -> Result<GroupReport> {
        let units = self.events.iter().cloned().map(event_unit).collect();
        self.dispatch.join_all("event group", units).await
    }
}

/// Builder for [`EventGroup`]; labels are checked in [`build`](Self::build).
pub struct EventGroupBuilder {
    events: Vec<TimedEvent>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn Observer>,
    config: EngineConfig,
}

impl Default for EventGroupBuilder {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            clock: Arc::new(SystemClock::new()),
            observer: Arc::new(NoopObserver),
            config: EngineConfig::default(),
        }
    }
}

impl EventGroupBuilder {
    /// Add an event.
    pub fn event(mut self, event: TimedEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Add an event firing `action` after `delay`.
    pub fn after(self, delay: Duration, label: impl Into<String>, action: Action) -> Self {
        self.event(TimedEvent::new(label, delay, action))
    }

    /// Use a different clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach an observer.
    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate and build the group.
    pub fn build(self) -> Result<EventGroup> {
        Ok(EventGroup::new(self.events)?
            .with_clock(self.clock)
            .with_observer(self.observer)
            .with_config(self.config))
    }
}

fn event_unit(event: TimedEvent) -> Unit {
    Unit {
        label: event.label().to_string(),
        work: Box::new(move |ctx: WorkerContext| -> UnitFuture {
            Box::pin(async move {
                if ctx.wait(event.delay()).await.is_err() {
                    return UnitRun {
                        outcome: UnitOutcome::Interrupted,
                        fired_at: None,
                    };
                }

                let fired_at = ctx.elapsed();
                ctx.emit(
                    event.label(),
                    ProgressKind::Event {
                        delay: event.delay(),
                    },
                );
                UnitRun {
                    outcome: event.fire().into(),
                    fired_at: Some(fired_at),
                }
            })
        }),
    }
}
