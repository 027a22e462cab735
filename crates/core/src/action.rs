//! Action values - the user code the engine schedules.
//!
//! Actions take no arguments and return success or an [`ActionError`]. The
//! engine never inspects what they do; it only decides when they run.

use crate::error::ActionError;
use std::fmt;
use std::sync::Arc;

/// Outcome of invoking an action.
pub type ActionResult = Result<(), ActionError>;

/// A shareable, argument-less callable.
#[derive(Clone)]
pub struct Action(Arc<dyn Fn() -> ActionResult + Send + Sync>);

impl Action {
    /// Wrap a closure as an action.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> ActionResult + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// An action that does nothing and always succeeds.
    pub fn noop() -> Self {
        Self::new(|| Ok(()))
    }

    /// Invoke the action.
    pub fn invoke(&self) -> ActionResult {
        (self.0)()
    }
}

impl Default for Action {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action(..)")
    }
}

/// Per-tick base action of a countdown, receiving the current value.
#[derive(Clone)]
pub struct TickAction(Arc<dyn Fn(u64) -> ActionResult + Send + Sync>);

impl TickAction {
    /// Wrap a closure as a tick action.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(u64) -> ActionResult + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invoke the action for the given countdown value.
    pub fn invoke(&self, current: u64) -> ActionResult {
        (self.0)(current)
    }
}

impl fmt::Debug for TickAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TickAction(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_action_invoke() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let action = Action::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let cloned = action.clone();
        action.invoke().unwrap();
        cloned.invoke().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_action_failure() {
        let action = Action::new(|| Err(ActionError::new("boiler offline")));
        assert_eq!(action.invoke().unwrap_err().message, "boiler offline");
    }

    #[test]
    fn test_tick_action_receives_value() {
        let action = TickAction::new(|current| {
            if current == 3 {
                Err(ActionError::new("three"))
            } else {
                Ok(())
            }
        });
        assert!(action.invoke(4).is_ok());
        assert!(action.invoke(3).is_err());
    }
}
