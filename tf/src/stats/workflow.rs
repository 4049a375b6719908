//! Whole-run stats folded from the event log

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::WorkflowStatus;
use crate::events::LogEntry;

use super::cost::{CostBreakdown, PriceTable};
use super::task::{duration_secs, fold_agent_entry};
use super::usage::LlmUsageStats;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStats {
    pub start_time: i64,
    pub end_time: i64,
    /// Seconds
    pub duration: f64,
    pub llm_usage: LlmUsageStats,
    pub iteration_count: u64,
    /// Usage keyed by the agent's model at the time of each event
    pub model_usage: BTreeMap<String, LlmUsageStats>,
    pub cost: CostBreakdown,
    /// Distinct tasks with a status change in the window
    pub task_count: usize,
    /// Distinct agents that reported activity in the window
    pub agent_count: usize,
}

/// Compute stats for the current run, as of `now`
///
/// The window opens at the entry that started the run. Resuming a paused run
/// or reopening a blocked one logs RUNNING again without moving the window.
/// Logs without a start entry fall back to the last RUNNING entry; with
/// neither the window is empty and starts at `now`.
pub fn compute_workflow_stats(logs: &[LogEntry], pricing: &PriceTable, now: i64) -> WorkflowStats {
    debug!(entries = logs.len(), "compute_workflow_stats: called");

    let anchor = logs.iter().rposition(|e| e.started_plan().is_some()).or_else(|| {
        logs.iter()
            .rposition(|e| e.workflow_status() == Some(WorkflowStatus::Running))
    });
    let (start_time, window) = match anchor {
        Some(i) => (logs[i].timestamp, &logs[i + 1..]),
        None => (now, &logs[logs.len()..]),
    };

    let mut llm_usage = LlmUsageStats::default();
    let mut iteration_count = 0;
    let mut model_usage: BTreeMap<String, LlmUsageStats> = BTreeMap::new();
    let mut tasks = BTreeSet::new();
    let mut agents = BTreeSet::new();

    for entry in window {
        if entry.task_status().is_some()
            && let Some(id) = entry.task_id()
        {
            tasks.insert(id.to_string());
        }
        if entry.agent_status().is_none() {
            continue;
        }
        let Some(agent) = entry.agent() else { continue };
        agents.insert(agent.id.clone());
        fold_agent_entry(entry, &mut llm_usage, &mut iteration_count);
        let mut ignored = 0;
        fold_agent_entry(entry, model_usage.entry(agent.model.clone()).or_default(), &mut ignored);
    }

    // Models that only appeared on non-usage events add nothing to the cost
    model_usage.retain(|_, usage| *usage != LlmUsageStats::default());
    let cost = pricing.workflow_cost(&model_usage);

    WorkflowStats {
        start_time,
        end_time: now,
        duration: duration_secs(start_time, now),
        llm_usage,
        iteration_count,
        model_usage,
        cost,
        task_count: tasks.len(),
        agent_count: agents.len(),
    }
}
