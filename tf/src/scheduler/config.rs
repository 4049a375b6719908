//! Execution lane configuration

use serde::{Deserialize, Serialize};

/// Execution lane configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Tasks executing at once
    #[serde(rename = "max-concurrent", default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_max_concurrent() -> usize {
    1
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl QueueConfig {
    /// Concurrency limit, never below one
    pub fn limit(&self) -> usize {
        self.max_concurrent.max(1)
    }
}
