//! Deadline watchdog for a dispatch.

use crate::cancel::CancelToken;
use crate::clock::Clock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Raises a dispatch's cancellation token when its deadline expires.
pub(crate) struct Deadline {
    watchdog: JoinHandle<()>,
    expired: Arc<AtomicBool>,
}

impl Deadline {
    /// Start watching; the deadline is measured on `clock`.
    pub(crate) fn arm(clock: Arc<dyn Clock>, cancel: CancelToken, after: Duration) -> Self {
        let expired = Arc::new(AtomicBool::new(false));
        let flag = expired.clone();
        let watchdog = tokio::spawn(async move {
            clock.sleep(after).await;
            // A caller's earlier cancel is not a timeout.
            if !cancel.is_cancelled() {
                flag.store(true, Ordering::SeqCst);
                debug!("Deadline of {:?} expired, cancelling dispatch", after);
                cancel.cancel();
            }
        });

        Self { watchdog, expired }
    }

    /// Stop watching and report whether the deadline fired.
    pub(crate) fn disarm(self) -> bool {
        self.watchdog.abort();
        self.expired.load(Ordering::SeqCst)
    }
}

/// Arm a deadline if one is configured.
pub(crate) fn arm_optional(
    clock: &Arc<dyn Clock>,
    cancel: &CancelToken,
    deadline: Option<Duration>,
) -> Option<Deadline> {
    deadline.map(|after| Deadline::arm(clock.clone(), cancel.clone(), after))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;

    #[tokio::test]
    async fn test_deadline_cancels_on_expiry() {
        let clock = VirtualClock::new();
        let cancel = CancelToken::new();
        let deadline = Deadline::arm(
            Arc::new(clock.clone()),
            cancel.clone(),
            Duration::from_secs(2),
        );

        clock.wait_for_sleepers(1).await;
        clock.advance(Duration::from_secs(2));
        cancel.cancelled().await;

        assert!(deadline.disarm());
    }

    #[tokio::test]
    async fn test_disarmed_deadline_never_fires() {
        let clock = VirtualClock::new();
        let cancel = CancelToken::new();
        let deadline = Deadline::arm(
            Arc::new(clock.clone()),
            cancel.clone(),
            Duration::from_secs(2),
        );

        clock.wait_for_sleepers(1).await;
        assert!(!deadline.disarm());
        tokio::task::yield_now().await;
        clock.advance(Duration::from_secs(5));
        tokio::task::yield_now().await;
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_caller_cancel_is_not_a_timeout() {
        let clock = VirtualClock::new();
        let cancel = CancelToken::new();
        let deadline = Deadline::arm(
            Arc::new(clock.clone()),
            cancel.clone(),
            Duration::from_secs(1),
        );

        clock.wait_for_sleepers(1).await;
        cancel.cancel();
        clock.advance(Duration::from_secs(1));
        tokio::task::yield_now().await;
        assert!(!deadline.disarm());
    }
}
