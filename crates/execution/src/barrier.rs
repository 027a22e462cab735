//! Counting join barrier.
//!
//! A barrier is created for exactly `n` workers and hands out `n` single-use
//! [`Arrival`] tokens. Each token decrements the count once, when it is
//! consumed or dropped, so a worker that is interrupted or even unwinds from
//! a panic still releases its slot.

use std::sync::Arc;
use tokio::sync::watch;

/// Releases the waiting caller once every worker has arrived.
#[derive(Debug)]
pub struct JoinBarrier {
    remaining: watch::Receiver<usize>,
}

/// One worker's right to decrement the barrier.
#[derive(Debug)]
pub struct Arrival {
    counter: Arc<watch::Sender<usize>>,
}

impl JoinBarrier {
    /// Create a barrier for `workers` workers, with one arrival per worker.
    pub fn new(workers: usize) -> (Self, Vec<Arrival>) {
        let (tx, rx) = watch::channel(workers);
        let counter = Arc::new(tx);
        let arrivals = (0..workers)
            .map(|_| Arrival {
                counter: counter.clone(),
            })
            .collect();

        (Self { remaining: rx }, arrivals)
    }

    /// Workers that have not arrived yet.
    pub fn remaining(&self) -> usize {
        *self.remaining.borrow()
    }

    /// Wait until every worker has arrived.
    pub async fn wait(mut self) {
        // A closed channel means every arrival is gone, so the count is zero.
        let _ = self.remaining.wait_for(|remaining| *remaining == 0).await;
    }
}

impl Arrival {
    /// Report this worker's terminal state.
    pub fn arrive(self) {}
}

impl Drop for Arrival {
    fn drop(&mut self) {
        self.counter
            .send_modify(|remaining| *remaining = remaining.saturating_sub(1));
    }
}
