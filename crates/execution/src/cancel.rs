//! Cooperative cancellation.

use std::sync::Arc;
use tokio::sync::watch;

/// A single cooperative cancellation signal shared by one dispatch.
///
/// Raising it wakes every worker blocked in [`wait`](crate::clock::wait).
/// Raising it again, or after the dispatch finished, has no further effect.
#[derive(Debug, Clone)]
pub struct CancelToken {
    raised: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// Create a token that has not been raised.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            raised: Arc::new(tx),
        }
    }

    /// Raise the signal.
    ///
    /// Returns `true` only for the call that actually raised it.
    pub fn cancel(&self) -> bool {
        self.raised.send_if_modified(|raised| {
            if *raised {
                false
            } else {
                *raised = true;
                true
            }
        })
    }

    /// Whether the signal has been raised.
    pub fn is_cancelled(&self) -> bool {
        *self.raised.borrow()
    }

    /// Resolve once the signal is raised.
    pub async fn cancelled(&self) {
        let mut rx = self.raised.subscribe();
        let _ = rx.wait_for(|raised| *raised).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
