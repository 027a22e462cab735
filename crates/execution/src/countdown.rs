//! Sequential countdown timer.
//!
//! A countdown runs on a single logical thread of control: it counts from
//! `start` down to zero, emitting a base tick for every value and firing the
//! milestones bound to that value in registration order, with one
//! `tick_interval` wait between consecutive ticks (none after the last).

use crate::barrier::JoinBarrier;
use crate::cancel::CancelToken;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::deadline::{self, Deadline};
use crate::observer::{NoopObserver, Observer};
use crate::worker::WorkerContext;
use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tempo_core::{
    ActionError, ActionResult, CountdownReport, DispatchId, EngineError, Milestone,
    MilestoneReport, ProgressKind, Result, TickAction, TickFailure, UnitOutcome,
};
use tokio::sync::{oneshot, watch};
use tracing::{info, warn};

/// Lifecycle of a countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    /// Built, not yet started
    Idle,
    /// The run loop is active
    Running,
    /// The run loop exited, normally or interrupted
    Done,
}

/// A countdown from `start` to zero with milestone actions.
pub struct Countdown {
    start: u64,
    tick_interval: Duration,
    milestones: Vec<Milestone>,
    tick_action: Option<TickAction>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn Observer>,
    cancel: CancelToken,
    config: EngineConfig,
    state: watch::Sender<CountdownState>,
}

impl Countdown {
    /// Create a countdown with default clock, observer and configuration.
    pub fn new(start: u64, tick_interval: Duration, milestones: Vec<Milestone>) -> Result<Self> {
        Self::builder(start, tick_interval).milestones(milestones).build()
    }

    /// Start building a countdown.
    pub fn builder(start: u64, tick_interval: Duration) -> CountdownBuilder {
        CountdownBuilder::new(start, tick_interval)
    }

    /// Value the countdown starts from.
    pub fn start_value(&self) -> u64 {
        self.start
    }

    /// Wait between consecutive ticks.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Registered milestones, in registration order.
    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CountdownState {
        *self.state.borrow()
    }

    /// Raise the cancellation signal. Idempotent, and a no-op once done.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle for cancelling the countdown from another task.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the countdown on the calling task until it reaches zero or is
    /// interrupted.
    ///
    /// Interruption is not an error: it is reported through
    /// [`CountdownReport::interrupted_at`] and the skipped milestones.
    pub async fn start(&self) -> Result<CountdownReport> {
        let began = self.state.send_if_modified(|state| {
            if *state == CountdownState::Idle {
                *state = CountdownState::Running;
                true
            } else {
                false
            }
        });
        if !began {
            return Err(EngineError::AlreadyStarted { what: "countdown" });
        }

        let dispatch = DispatchId::new();
        let ctx = WorkerContext::new(
            dispatch,
            "countdown",
            self.clock.clone(),
            self.cancel.clone(),
            self.observer.clone(),
            self.clock.now(),
        );
        info!(
            "Starting countdown {} from {} every {:?}",
            dispatch, self.start, self.tick_interval
        );

        let deadline = deadline::arm_optional(&self.clock, &self.cancel, self.config.deadline);
        let mut report = CountdownReport::new(dispatch, self.start);
        self.run_loop(&ctx, &mut report).await;

        report.timed_out = deadline.map(Deadline::disarm).unwrap_or(false);
        report.elapsed = ctx.elapsed();
        self.state.send_replace(CountdownState::Done);

        match report.interrupted_at {
            None => info!("Countdown {} finished", dispatch),
            Some(at) => info!("Countdown {} interrupted at {}", dispatch, at),
        }
        Ok(report)
    }

    /// Run the countdown on its own worker.
    pub fn spawn(self) -> CountdownHandle {
        let cancel = self.cancel.clone();
        let state = self.state.subscribe();
        let (barrier, mut arrivals) = JoinBarrier::new(1);
        let arrival = arrivals.pop();
        let (tx, report) = oneshot::channel();

        tokio::spawn(async move {
            let _ = tx.send(self.start().await);
            drop(arrival);
        });

        CountdownHandle {
            cancel,
            state,
            barrier,
            report,
        }
    }

    async fn run_loop(&self, ctx: &WorkerContext, report: &mut CountdownReport) {
        for current in (0..=self.start).rev() {
            report.ticks.push(current);
            ctx.emit(&current.to_string(), ProgressKind::Tick { value: current });
            if let Some(action) = &self.tick_action {
                if let Err(error) = isolated(|| action.invoke(current)) {
                    warn!("Tick action failed at {}: {}", current, error);
                    report.tick_failures.push(TickFailure {
                        value: current,
                        error,
                    });
                }
            }

            for milestone in self.milestones.iter().filter(|m| m.trigger() == current) {
                let fired_at = ctx.elapsed();
                ctx.emit(milestone.label(), ProgressKind::Milestone { trigger: current });
                let outcome = UnitOutcome::from(isolated(|| milestone.fire()));
                if let UnitOutcome::Failed { error } = &outcome {
                    warn!("Milestone '{}' failed: {}", milestone.label(), error);
                }
                report.milestones.push(MilestoneReport {
                    label: milestone.label().to_string(),
                    trigger: current,
                    outcome,
                    fired_at,
                });
            }

            if current > 0 && ctx.wait(self.tick_interval).await.is_err() {
                report.interrupted_at = Some(current);
                report.skipped = self
                    .milestones
                    .iter()
                    .filter(|m| m.trigger() < current)
                    .map(|m| m.label().to_string())
                    .collect();
                return;
            }
        }
    }
}

/// Run a countdown action, turning a panic into an [`ActionError`] so the
/// loop keeps counting.
fn isolated(action: impl FnOnce() -> ActionResult) -> ActionResult {
    panic::catch_unwind(AssertUnwindSafe(action))
        .unwrap_or_else(|payload| Err(ActionError::new(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match detail {
        Some(detail) => format!("action panicked: {}", detail),
        None => "action panicked".to_string(),
    }
}

/// Builder for [`Countdown`]; validation happens in [`build`](Self::build).
pub struct CountdownBuilder {
    start: u64,
    tick_interval: Duration,
    milestones: Vec<Milestone>,
    tick_action: Option<TickAction>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn Observer>,
    config: EngineConfig,
}

impl CountdownBuilder {
    /// Create a builder for a countdown from `start`.
    pub fn new(start: u64, tick_interval: Duration) -> Self {
        Self {
            start,
            tick_interval,
            milestones: Vec::new(),
            tick_action: None,
            clock: Arc::new(SystemClock::new()),
            observer: Arc::new(NoopObserver),
            config: EngineConfig::default(),
        }
    }

    /// Register a milestone.
    pub fn milestone(mut self, milestone: Milestone) -> Self {
        self.milestones.push(milestone);
        self
    }

    /// Register several milestones, keeping their order.
    pub fn milestones(mut self, milestones: impl IntoIterator<Item = Milestone>) -> Self {
        self.milestones.extend(milestones);
        self
    }

    /// Set the per-tick base action.
    pub fn tick_action(mut self, action: TickAction) -> Self {
        self.tick_action = Some(action);
        self
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

    /// Require unique milestone triggers.
    pub fn unique_triggers(mut self) -> Self {
        self.config.unique_triggers = true;
        self
    }

    /// Validate and build the countdown.
    pub fn build(self) -> Result<Countdown> {
        let mut triggers = HashSet::new();
        for milestone in &self.milestones {
            if milestone.trigger() > self.start {
                return Err(EngineError::InvalidConfiguration(format!(
                    "milestone '{}' triggers at {} but the countdown starts at {}",
                    milestone.label(),
                    milestone.trigger(),
                    self.start
                )));
            }
            if !triggers.insert(milestone.trigger()) && self.config.unique_triggers {
                return Err(EngineError::InvalidConfiguration(format!(
                    "duplicate milestone trigger {}",
                    milestone.trigger()
                )));
            }
        }

        let (state, _rx) = watch::channel(CountdownState::Idle);
        Ok(Countdown {
            start: self.start,
            tick_interval: self.tick_interval,
            milestones: self.milestones,
            tick_action: self.tick_action,
            clock: self.clock,
            observer: self.observer,
            cancel: CancelToken::new(),
            config: self.config,
            state,
        })
    }
}

/// A countdown running on its own worker.
pub struct CountdownHandle {
    cancel: CancelToken,
    state: watch::Receiver<CountdownState>,
    barrier: JoinBarrier,
    report: oneshot::Receiver<Result<CountdownReport>>,
}

impl CountdownHandle {
    /// Raise the countdown's cancellation signal. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle for cancelling the countdown from elsewhere.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CountdownState {
        *self.state.borrow()
    }

    /// Block until the countdown is done and return its report.
    pub async fn join(self) -> Result<CountdownReport> {
        self.barrier.wait().await;
        self.report.await.unwrap_or_else(|_| {
            Err(EngineError::WorkerLost {
                label: "countdown".to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::observer::ChannelObserver;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempo_core::{Action, ActionError, Progress};

    fn counting(calls: &Arc<AtomicUsize>) -> Action {
        let calls = calls.clone();
        Action::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    /// Release one sleeper at a time until the countdown finishes.
    async fn drive(clock: &VirtualClock, handle: CountdownHandle) -> CountdownReport {
        let join = handle.join();
        tokio::pin!(join);
        loop {
            tokio::select! {
                biased;
                report = &mut join => return report.unwrap(),
                _ = clock.wait_for_sleepers(1) => {
                    clock.advance_to_next();
                }
            }
        }
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Progress>) -> Vec<Progress> {
        let mut records = Vec::new();
        while let Ok(progress) = rx.try_recv() {
            records.push(progress);
        }
        records
    }

    #[tokio::test]
    async fn test_countdown_with_add_milestone() {
        let added = Arc::new(AtomicUsize::new(0));
        let countdown = Countdown::builder(5, Duration::ZERO)
            .milestone(Milestone::new(3, "add", counting(&added)))
            .clock(Arc::new(VirtualClock::new()))
            .build()
            .unwrap();
        assert_eq!(countdown.state(), CountdownState::Idle);

        let report = countdown.start().await.unwrap();
        assert_eq!(report.ticks, vec![5, 4, 3, 2, 1, 0]);
        assert_eq!(added.load(Ordering::SeqCst), 1);
        assert_eq!(report.milestones.len(), 1);
        assert_eq!(report.milestones[0].label, "add");
        assert_eq!(report.milestones[0].trigger, 3);
        assert!(report.is_complete());
        assert_eq!(countdown.state(), CountdownState::Done);
    }

    #[tokio::test]
    async fn test_tick_count_is_start_plus_one() {
        for start in [0u64, 1, 7, 20] {
            let countdown = Countdown::builder(start, Duration::ZERO)
                .clock(Arc::new(VirtualClock::new()))
                .build()
                .unwrap();
            let report = countdown.start().await.unwrap();

            assert_eq!(report.ticks.len() as u64, start + 1);
            assert!(report.ticks.windows(2).all(|w| w[0] == w[1] + 1));
            assert_eq!(report.ticks.last(), Some(&0));
        }
    }

    #[tokio::test]
    async fn test_observer_order_ticks_then_milestones() {
        let (observer, mut rx) = ChannelObserver::new();
        let countdown = Countdown::builder(2, Duration::ZERO)
            .milestone(Milestone::new(1, "first", Action::noop()))
            .milestone(Milestone::new(1, "second", Action::noop()))
            .milestone(Milestone::new(0, "serve", Action::noop()))
            .clock(Arc::new(VirtualClock::new()))
            .observer(Arc::new(observer))
            .build()
            .unwrap();

        countdown.start().await.unwrap();
        let labels: Vec<String> = drain(&mut rx).into_iter().map(|p| p.label).collect();
        assert_eq!(labels, vec!["2", "1", "first", "second", "0", "serve"]);
    }

    #[test]
    fn test_unique_triggers_enforced() {
        let result = Countdown::builder(5, Duration::ZERO)
            .milestone(Milestone::new(3, "a", Action::noop()))
            .milestone(Milestone::new(3, "b", Action::noop()))
            .unique_triggers()
            .build();
        assert!(matches!(result, Err(EngineError::InvalidConfiguration(_))));

        let relaxed = Countdown::new(
            5,
            Duration::ZERO,
            vec![
                Milestone::new(3, "a", Action::noop()),
                Milestone::new(3, "b", Action::noop()),
            ],
        );
        assert!(relaxed.is_ok());
    }

    #[test]
    fn test_trigger_beyond_start_rejected() {
        let result = Countdown::new(
            5,
            Duration::ZERO,
            vec![Milestone::new(6, "never", Action::noop())],
        );
        assert!(matches!(
            result,
            Err(EngineError::InvalidConfiguration(msg)) if msg.contains("never")
        ));
    }

    #[tokio::test]
    async fn test_milestones_fire_at_their_tick_on_virtual_clock() {
        let clock = VirtualClock::new();
        let countdown = Countdown::builder(4, Duration::from_secs(1))
            .milestones([
                Milestone::new(3, "coffee", Action::noop()),
                Milestone::new(1, "sugar", Action::noop()),
                Milestone::new(0, "serve", Action::noop()),
            ])
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();

        let report = drive(&clock, countdown.spawn()).await;
        let fired: Vec<(&str, Duration)> = report
            .milestones
            .iter()
            .map(|m| (m.label.as_str(), m.fired_at))
            .collect();
        assert_eq!(
            fired,
            vec![
                ("coffee", Duration::from_secs(1)),
                ("sugar", Duration::from_secs(3)),
                ("serve", Duration::from_secs(4)),
            ]
        );
        // No trailing wait after the final tick.
        assert_eq!(report.elapsed, Duration::from_secs(4));
        assert_eq!(clock.pending(), 0);
    }

    #[tokio::test]
    async fn test_cancel_stops_countdown_and_skips_milestones() {
        let clock = VirtualClock::new();
        let countdown = Countdown::builder(10, Duration::from_secs(1))
            .milestones([
                Milestone::new(9, "early", Action::noop()),
                Milestone::new(2, "late", Action::noop()),
                Milestone::new(0, "serve", Action::noop()),
            ])
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        let handle = countdown.spawn();

        for _ in 0..2 {
            clock.wait_for_sleepers(1).await;
            clock.advance_to_next();
        }
        clock.wait_for_sleepers(1).await;
        assert_eq!(handle.state(), CountdownState::Running);

        handle.cancel();
        handle.cancel();
        let report = handle.join().await.unwrap();

        assert_eq!(report.ticks, vec![10, 9, 8]);
        assert_eq!(report.interrupted_at, Some(8));
        assert_eq!(report.skipped, vec!["late", "serve"]);
        assert_eq!(report.milestones.len(), 1);
        assert!(!report.timed_out);
        assert!(!report.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_countdown() {
        let countdown = Countdown::builder(10, Duration::from_secs(1))
            .config(EngineConfig::new().with_deadline(Duration::from_millis(3500)))
            .build()
            .unwrap();

        let report = countdown.start().await.unwrap();
        assert!(report.timed_out);
        assert_eq!(report.ticks, vec![10, 9, 8, 7]);
        assert_eq!(report.interrupted_at, Some(7));
    }

    #[tokio::test]
    async fn test_action_failures_do_not_abort() {
        let countdown = Countdown::builder(3, Duration::ZERO)
            .milestone(Milestone::new(
                2,
                "spill",
                Action::new(|| Err(ActionError::new("cup tipped over"))),
            ))
            .tick_action(TickAction::new(|current| {
                if current == 1 {
                    Err(ActionError::new("display glitch"))
                } else {
                    Ok(())
                }
            }))
            .clock(Arc::new(VirtualClock::new()))
            .build()
            .unwrap();

        let report = countdown.start().await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.ticks, vec![3, 2, 1, 0]);
        assert_eq!(report.tick_failures.len(), 1);
        assert_eq!(report.tick_failures[0].value, 1);
        let failed = report.failed_milestones();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].1.message, "cup tipped over");
    }

    #[tokio::test]
    async fn test_panicking_milestone_is_recorded() {
        let served = Arc::new(AtomicUsize::new(0));
        let countdown = Countdown::builder(3, Duration::ZERO)
            .milestone(Milestone::new(2, "boom", Action::new(|| panic!("grinder exploded"))))
            .milestone(Milestone::new(0, "serve", counting(&served)))
            .clock(Arc::new(VirtualClock::new()))
            .build()
            .unwrap();

        let report = countdown.start().await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.ticks, vec![3, 2, 1, 0]);
        assert_eq!(served.load(Ordering::SeqCst), 1);

        let failed = report.failed_milestones();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "boom");
        assert!(failed[0].1.message.contains("grinder exploded"));
        assert_eq!(countdown.state(), CountdownState::Done);
    }

    #[tokio::test]
    async fn test_panicking_tick_action_keeps_spawned_report() {
        let countdown = Countdown::builder(2, Duration::ZERO)
            .tick_action(TickAction::new(|current| {
                if current == 1 {
                    panic!("display on fire");
                }
                Ok(())
            }))
            .clock(Arc::new(VirtualClock::new()))
            .build()
            .unwrap();

        let report = countdown.spawn().join().await.unwrap();
        assert_eq!(report.ticks, vec![2, 1, 0]);
        assert_eq!(report.tick_failures.len(), 1);
        assert_eq!(report.tick_failures[0].value, 1);
        assert!(report.tick_failures[0].error.message.contains("display on fire"));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let served = Arc::new(AtomicUsize::new(0));
        let countdown = Countdown::builder(0, Duration::from_secs(1))
            .milestone(Milestone::new(0, "serve", counting(&served)))
            .clock(Arc::new(VirtualClock::new()))
            .build()
            .unwrap();
        countdown.cancel();

        // Zero never waits, so the raised token is never observed
        let report = countdown.start().await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.ticks, vec![0]);
        assert_eq!(served.load(Ordering::SeqCst), 1);

        let countdown = Countdown::builder(3, Duration::from_secs(1))
            .milestone(Milestone::new(0, "serve", Action::noop()))
            .clock(Arc::new(VirtualClock::new()))
            .build()
            .unwrap();
        countdown.cancel();

        let report = countdown.start().await.unwrap();
        assert_eq!(report.ticks, vec![3]);
        assert_eq!(report.interrupted_at, Some(3));
        assert_eq!(report.skipped, vec!["serve"]);
        assert!(!report.timed_out);
    }

    #[tokio::test]
    async fn test_countdown_runs_once() {
        let countdown = Countdown::builder(1, Duration::ZERO)
            .clock(Arc::new(VirtualClock::new()))
            .build()
            .unwrap();
        countdown.start().await.unwrap();

        countdown.cancel();
        assert_eq!(countdown.state(), CountdownState::Done);
        assert!(matches!(
            countdown.start().await,
            Err(EngineError::AlreadyStarted { what: "countdown" })
        ));
    }
}
