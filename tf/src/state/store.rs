//! TeamStore - the single state-update entry point
//!
//! The store holds the current `TeamState` behind an `Arc`. Updates run a
//! reducer against the current snapshot and swap in the result as a whole,
//! so readers never see a half-applied transition. After each swap the
//! version counter is bumped and the newly appended log entries are
//! published on the log bus, in log order.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::domain::now_ms;
use crate::events::{LogBus, LogEntry};
use crate::lifecycle::LifecycleError;

use super::team_state::TeamState;

pub struct TeamStore {
    state: RwLock<Arc<TeamState>>,
    version: watch::Sender<u64>,
    bus: LogBus,
    last_mutation: AtomicI64,
}

impl TeamStore {
    pub fn new(state: TeamState, channel_capacity: usize) -> Self {
        debug!(team = %state.name, channel_capacity, "TeamStore::new: called");
        let (version, _) = watch::channel(0);
        Self {
            state: RwLock::new(Arc::new(state)),
            version,
            bus: LogBus::new(channel_capacity),
            last_mutation: AtomicI64::new(now_ms()),
        }
    }

    /// Current snapshot
    pub fn get(&self) -> Arc<TeamState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the state with `f(current)`
    ///
    /// On error the state is left untouched and nothing is published.
    pub fn update<F>(&self, f: F) -> Result<Arc<TeamState>, LifecycleError>
    where
        F: FnOnce(&TeamState) -> Result<TeamState, LifecycleError>,
    {
        match self.modify(|state| f(state).map(Some))? {
            Some(next) => Ok(next),
            None => Ok(self.get()),
        }
    }

    /// Like `update`, but `f` may return `None` to leave the state as is
    ///
    /// A `None` neither bumps the version nor counts as a mutation.
    pub fn modify<F>(&self, f: F) -> Result<Option<Arc<TeamState>>, LifecycleError>
    where
        F: FnOnce(&TeamState) -> Result<Option<TeamState>, LifecycleError>,
    {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let current = guard.clone();
        let Some(next) = f(&current)? else {
            return Ok(None);
        };
        let next = Arc::new(next);

        let appended: &[LogEntry] = if next.epoch == current.epoch && next.logs.len() >= current.logs.len() {
            &next.logs[current.logs.len()..]
        } else {
            &next.logs
        };
        debug!(
            appended = appended.len(),
            status = %next.workflow_status,
            "TeamStore::update: swapping state"
        );
        // Published under the write lock so concurrent updates cannot interleave
        for entry in appended {
            self.bus.publish(entry.clone());
        }
        *guard = next.clone();
        drop(guard);

        self.last_mutation.store(now_ms(), Ordering::SeqCst);
        self.version.send_modify(|v| *v += 1);
        Ok(Some(next))
    }

    /// Change notifications; the value is a counter bumped on every update
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Live stream of appended log entries
    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogEntry> {
        self.bus.subscribe()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Unix milliseconds of the most recent successful update
    pub fn last_mutation_ms(&self) -> i64 {
        self.last_mutation.load(Ordering::SeqCst)
    }
}
