//! Unique identifiers for Tempo dispatches.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for one dispatch (a countdown run or a group run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchId(Ulid);

impl DispatchId {
    /// Generate a new DispatchId
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for DispatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DispatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for DispatchId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}
