//! TaskQueue - bounded-concurrency FIFO execution lane
//!
//! Runs are started in submission order. At most `max_concurrent` runs are
//! active at once; a finished run hands its slot to the head of the queue.
//! The queue is keyed by whatever identifies one run to the caller.

use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::hash::Hash;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::debug;

use super::config::QueueConfig;

/// Result of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleResult {
    /// A slot was free; the caller runs the task now
    Ready,
    /// Waiting behind `position - 1` other tasks
    Queued { position: usize },
    /// Already running or queued
    Rejected { reason: String },
}

/// One run of a task: the same task id in a later epoch is a different run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunKey {
    pub epoch: u64,
    pub task_id: String,
}

impl RunKey {
    pub fn new(epoch: u64, task_id: impl Into<String>) -> Self {
        Self {
            epoch,
            task_id: task_id.into(),
        }
    }
}

impl Display for RunKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.task_id, self.epoch)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueueStats {
    pub total_scheduled: u64,
    pub total_completed: u64,
    pub total_rejected: u64,
    /// Sum of run times of completed tasks
    pub total_run_time_ms: u64,
    pub peak_queue_depth: usize,
    pub peak_concurrent: usize,
}

/// Snapshot for display and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueState<K = String> {
    pub running: Vec<K>,
    pub waiting: Vec<K>,
    pub stats: QueueStats,
}

struct QueueInner<K> {
    waiting: VecDeque<K>,
    /// run key -> start time
    running: HashMap<K, Instant>,
    stats: QueueStats,
}

pub struct TaskQueue<K = String> {
    config: QueueConfig,
    inner: Mutex<QueueInner<K>>,
}

impl<K> TaskQueue<K>
where
    K: Clone + Eq + Hash + Ord + Display,
{
    pub fn new(config: QueueConfig) -> Self {
        debug!(?config, "TaskQueue::new: called");
        Self {
            config,
            inner: Mutex::new(QueueInner {
                waiting: VecDeque::new(),
                running: HashMap::new(),
                stats: QueueStats::default(),
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Submit a run; duplicates of a running or queued run are rejected
    pub async fn submit(&self, key: K) -> ScheduleResult {
        debug!(%key, "TaskQueue::submit: called");
        let mut inner = self.inner.lock().await;

        if inner.running.contains_key(&key) {
            debug!(%key, "TaskQueue::submit: already running, rejecting");
            inner.stats.total_rejected += 1;
            return ScheduleResult::Rejected {
                reason: "Already running".to_string(),
            };
        }
        if inner.waiting.contains(&key) {
            debug!(%key, "TaskQueue::submit: already queued, rejecting");
            inner.stats.total_rejected += 1;
            return ScheduleResult::Rejected {
                reason: "Already queued".to_string(),
            };
        }

        if inner.running.len() < self.config.limit() && inner.waiting.is_empty() {
            debug!(%key, "TaskQueue::submit: slot free, running immediately");
            inner.running.insert(key, Instant::now());
            inner.stats.total_scheduled += 1;
            inner.stats.peak_concurrent = inner.stats.peak_concurrent.max(inner.running.len());
            return ScheduleResult::Ready;
        }

        debug!(%key, "TaskQueue::submit: queued");
        inner.waiting.push_back(key);
        inner.stats.peak_queue_depth = inner.stats.peak_queue_depth.max(inner.waiting.len());
        ScheduleResult::Queued {
            position: inner.waiting.len(),
        }
    }

    /// Mark a run finished and promote the next waiting runs
    ///
    /// Returns the keys the caller must now run, in FIFO order.
    pub async fn complete(&self, key: &K) -> Vec<K> {
        debug!(%key, "TaskQueue::complete: called");
        let mut inner = self.inner.lock().await;

        if let Some(started) = inner.running.remove(key) {
            inner.stats.total_completed += 1;
            inner.stats.total_run_time_ms += started.elapsed().as_millis() as u64;
        } else {
            debug!(%key, "TaskQueue::complete: not running");
        }

        let mut promoted = Vec::new();
        while inner.running.len() < self.config.limit() {
            let Some(next) = inner.waiting.pop_front() else { break };
            debug!(key = %next, "TaskQueue::complete: promoting from queue");
            inner.running.insert(next.clone(), Instant::now());
            inner.stats.total_scheduled += 1;
            inner.stats.peak_concurrent = inner.stats.peak_concurrent.max(inner.running.len());
            promoted.push(next);
        }
        promoted
    }

    pub async fn contains(&self, key: &K) -> bool {
        let inner = self.inner.lock().await;
        inner.running.contains_key(key) || inner.waiting.contains(key)
    }

    /// Drop every waiting run (running ones finish on their own)
    pub async fn clear_waiting(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let dropped = inner.waiting.len();
        inner.waiting.clear();
        debug!(dropped, "TaskQueue::clear_waiting: called");
        dropped
    }

    pub async fn is_idle(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.running.is_empty() && inner.waiting.is_empty()
    }

    pub async fn state(&self) -> QueueState<K> {
        let inner = self.inner.lock().await;
        let mut running: Vec<K> = inner.running.keys().cloned().collect();
        running.sort();
        QueueState {
            running,
            waiting: inner.waiting.iter().cloned().collect(),
            stats: inner.stats.clone(),
        }
    }
}
