//! Clock and delay primitive.
//!
//! Every suspension point of the engine goes through [`wait`], which sleeps on
//! a [`Clock`] and races the sleep against the dispatch's cancellation token.
//! [`SystemClock`] uses tokio timers; [`VirtualClock`] only moves when a test
//! tells it to.

use crate::cancel::CancelToken;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tempo_core::Interrupted;
use tokio::sync::watch;

/// A source of relative time that can suspend the caller.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;

    /// Suspend for at least `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Wait for `duration` on `clock`, or fail with [`Interrupted`] once `cancel`
/// is raised.
///
/// Cancellation wins over an expired sleep, and a zero duration returns
/// immediately unless the token is already raised.
pub async fn wait(
    clock: &dyn Clock,
    duration: Duration,
    cancel: &CancelToken,
) -> Result<(), Interrupted> {
    if cancel.is_cancelled() {
        return Err(Interrupted);
    }
    if duration.is_zero() {
        return Ok(());
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted),
        _ = clock.sleep(duration) => Ok(()),
    }
}

/// Wall-clock time backed by tokio timers.
///
/// Because it uses `tokio::time`, it also follows paused test time.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Default)]
struct VirtualState {
    now: Duration,
    next_sleeper: u64,
    /// Pending sleepers by id, with their deadline
    sleepers: BTreeMap<u64, Duration>,
}

/// Logical clock advanced on demand.
///
/// Sleepers register a deadline and are released only when [`advance`] or
/// [`advance_to_next`] moves logical time past it. Sleepers sharing a
/// deadline are released together; which one runs first is up to the
/// scheduler.
///
/// [`advance`]: VirtualClock::advance
/// [`advance_to_next`]: VirtualClock::advance_to_next
#[derive(Debug, Clone)]
pub struct VirtualClock {
    state: Arc<watch::Sender<VirtualState>>,
}

impl VirtualClock {
    /// Create a virtual clock at logical time zero.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(VirtualState::default());
        Self {
            state: Arc::new(tx),
        }
    }

    /// Move logical time forward, releasing every sleeper that is due.
    pub fn advance(&self, by: Duration) {
        self.state.send_modify(|s| {
            s.now += by;
            let now = s.now;
            s.sleepers.retain(|_, deadline| *deadline > now);
        });
    }

    /// Jump to the earliest pending deadline and release the sleepers due then.
    ///
    /// Returns the new logical time, or `None` when nobody is sleeping.
    pub fn advance_to_next(&self) -> Option<Duration> {
        let mut reached = None;
        self.state.send_if_modified(|s| {
            let Some(next) = s.sleepers.values().min().copied() else {
                return false;
            };
            s.now = s.now.max(next);
            let now = s.now;
            s.sleepers.retain(|_, deadline| *deadline > now);
            reached = Some(now);
            true
        });
        reached
    }

    /// Number of sleepers currently waiting.
    pub fn pending(&self) -> usize {
        self.state.borrow().sleepers.len()
    }

    /// Wait until at least `count` sleepers are registered.
    pub async fn wait_for_sleepers(&self, count: usize) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|s| s.sleepers.len() >= count).await;
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Unregisters a sleeper whose future was dropped before its deadline.
struct SleeperGuard<'a> {
    state: &'a watch::Sender<VirtualState>,
    id: u64,
}

impl Drop for SleeperGuard<'_> {
    fn drop(&mut self) {
        let id = self.id;
        self.state.send_if_modified(|s| s.sleepers.remove(&id).is_some());
    }
}

#[async_trait]
impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        self.state.borrow().now
    }

    async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }

        let mut registered = (0, Duration::ZERO);
        self.state.send_modify(|s| {
            let id = s.next_sleeper;
            s.next_sleeper += 1;
            let deadline = s.now + duration;
            s.sleepers.insert(id, deadline);
            registered = (id, deadline);
        });
        let (id, deadline) = registered;

        let _guard = SleeperGuard {
            state: &self.state,
            id,
        };
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|s| s.now >= deadline).await;
    }
}
