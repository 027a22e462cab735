//! Engine configuration.

use std::time::Duration;

/// Configuration shared by countdowns and groups.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Deadline after which the dispatch is cancelled (None = no deadline)
    pub deadline: Option<Duration>,
    /// Reject countdowns with more than one milestone per trigger value
    pub unique_triggers: bool,
}

impl EngineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dispatch deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Require unique milestone triggers.
    pub fn with_unique_triggers(mut self) -> Self {
        self.unique_triggers = true;
        self
    }
}
