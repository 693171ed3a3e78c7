//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Default number of resting orders the book can hold (2^20).
pub const DEFAULT_CAPACITY: usize = 1 << 20;

/// Default number of levels per side in a depth snapshot.
pub const DEFAULT_DEPTH_LEVELS: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of resting orders.
    pub capacity: usize,
    /// Levels per side used by `MatchingEngine::depth`.
    pub depth_levels: usize,
}

impl EngineConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_depth_levels(mut self, depth_levels: usize) -> Self {
        self.depth_levels = depth_levels;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            depth_levels: DEFAULT_DEPTH_LEVELS,
        }
    }
}
