//! Per-task stats folded from the event log

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{AgentStatus, TaskStatus};
use crate::events::LogEntry;

use super::usage::LlmUsageStats;

/// Duration and usage of a task's latest execution window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    /// Unix milliseconds of the anchoring DOING entry
    pub start_time: i64,
    /// Unix milliseconds
    pub end_time: i64,
    /// Seconds
    pub duration: f64,
    pub llm_usage: LlmUsageStats,
    pub iteration_count: u64,
}

/// Fold agent activity into usage counters
pub(crate) fn fold_agent_entry(entry: &LogEntry, usage: &mut LlmUsageStats, iterations: &mut u64) {
    match entry.agent_status() {
        Some(AgentStatus::ThinkingEnd) => usage.record_call(entry.token_usage().unwrap_or_default()),
        Some(AgentStatus::ThinkingError) => usage.record_error(),
        Some(AgentStatus::IssuesParsingLlmOutput) => usage.record_parsing_error(),
        Some(AgentStatus::IterationEnd) => *iterations += 1,
        _ => {}
    }
}

pub(crate) fn duration_secs(start: i64, end: i64) -> f64 {
    (end - start).max(0) as f64 / 1000.0
}

/// Compute stats for `task_id` from the log, as of `now`
///
/// The window opens at the task's most recent DOING entry. Only agent entries
/// for the same task are folded, so activity of other tasks never leaks in.
/// A task that never entered DOING gets `start_time = now` and zero usage.
pub fn compute_task_stats(task_id: &str, logs: &[LogEntry], now: i64) -> TaskStats {
    debug!(%task_id, entries = logs.len(), "compute_task_stats: called");

    let anchor = logs.iter().rposition(|e| e.is_task_status(task_id, TaskStatus::Doing));
    let Some(anchor) = anchor else {
        debug!(%task_id, "compute_task_stats: task never started");
        return TaskStats {
            start_time: now,
            end_time: now,
            duration: 0.0,
            ..Default::default()
        };
    };

    let start_time = logs[anchor].timestamp;
    let mut llm_usage = LlmUsageStats::default();
    let mut iteration_count = 0;
    for entry in logs[anchor + 1..]
        .iter()
        .filter(|e| e.agent_status().is_some() && e.task_id() == Some(task_id))
    {
        fold_agent_entry(entry, &mut llm_usage, &mut iteration_count);
    }

    TaskStats {
        start_time,
        end_time: now,
        duration: duration_secs(start_time, now),
        llm_usage,
        iteration_count,
    }
}
