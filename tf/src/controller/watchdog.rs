//! Watchdog - stall detection for running workflows
//!
//! A workflow that stays RUNNING without any state change for longer than
//! the timeout is reported once per quiet period. The watchdog only warns;
//! it never changes state.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::{TaskStatus, WorkflowStatus, now_ms};
use crate::state::TeamStore;

/// Configuration for the stall watchdog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Quiet time after which a running workflow counts as stalled
    #[serde(default = "default_timeout_ms", rename = "timeout-ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms", rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,
}

fn default_timeout_ms() -> u64 {
    300_000
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WatchdogConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

pub struct Watchdog {
    config: WatchdogConfig,
    store: Arc<TeamStore>,
    /// Mutation timestamp the last warning was raised for
    warned_for: Option<i64>,
    stall_count: u64,
}

impl Watchdog {
    pub fn new(config: WatchdogConfig, store: Arc<TeamStore>) -> Self {
        Self {
            config,
            store,
            warned_for: None,
            stall_count: 0,
        }
    }

    /// Number of stalls reported so far
    pub fn stall_count(&self) -> u64 {
        self.stall_count
    }

    /// Check for a stall at `now`; returns true when a new stall was reported
    pub fn check_once(&mut self, now: i64) -> bool {
        let state = self.store.get();
        if state.workflow_status != WorkflowStatus::Running {
            return false;
        }
        let last_mutation = self.store.last_mutation_ms();
        let idle_ms = now.saturating_sub(last_mutation);
        if idle_ms < self.config.timeout_ms as i64 || self.warned_for == Some(last_mutation) {
            return false;
        }

        let in_flight: Vec<&str> = state
            .tasks
            .iter()
            .filter(|t| !t.status.is_terminal() && t.status != TaskStatus::Todo)
            .map(|t| t.id.as_str())
            .collect();
        warn!(
            team = %state.name,
            idle_ms,
            tasks = ?in_flight,
            "Workflow has been running without progress"
        );
        self.warned_for = Some(last_mutation);
        self.stall_count += 1;
        true
    }

    /// Run the watchdog loop until `shutdown` flips to true
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            timeout_ms = self.config.timeout_ms,
            poll_interval_ms = self.config.poll_interval_ms,
            "Watchdog started"
        );
        let interval = self.config.poll_interval();

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.check_once(now_ms());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!(stalls = self.stall_count, "Watchdog stopped");
    }
}
