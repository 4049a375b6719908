//! The workflow run: tasks, agents, status and the event log

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::Inputs;
use crate::domain::{AgentRecord, Task, TaskStatus, WorkflowStatus};
use crate::events::LogEntry;
use crate::lifecycle::ErrorReport;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowResult {
    /// Deliverable result (absent for an empty plan)
    Completed { result: Option<Value> },
    /// Diagnostic for an errored or blocked run
    Failed { report: ErrorReport },
}

/// Complete state of one team run
///
/// Cloned and replaced as a whole on every update, so a reader always sees a
/// consistent task list and log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamState {
    pub name: String,
    pub workflow_status: WorkflowStatus,
    pub workflow_result: Option<WorkflowResult>,
    /// Plan order
    pub tasks: Vec<Task>,
    pub agents: Vec<AgentRecord>,
    pub inputs: Inputs,
    /// The event log
    pub logs: Vec<LogEntry>,
    /// Bumped on every reset; outcomes from an older epoch are discarded
    pub epoch: u64,
}

impl TeamState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_index(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    pub fn agent(&self, id: &str) -> Option<&AgentRecord> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn agent_mut(&mut self, id: &str) -> Option<&mut AgentRecord> {
        self.agents.iter_mut().find(|a| a.id == id)
    }

    /// Task ids in plan order
    pub fn plan_order(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.id.clone()).collect()
    }

    pub fn tasks_with_status(&self, status: TaskStatus) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.status == status)
    }

    pub fn all_done(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.status == TaskStatus::Done)
    }

    /// Result of the last deliverable task, or of the last task if none is marked
    pub fn deliverable_result(&self) -> Option<Value> {
        self.tasks
            .iter()
            .rev()
            .find(|t| t.is_deliverable)
            .or_else(|| self.tasks.last())
            .and_then(|t| t.result.clone())
    }
}
