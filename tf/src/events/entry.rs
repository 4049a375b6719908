//! Event log entries
//!
//! The event log is append-only. Entries are never edited after they are
//! pushed, and their position in the log is the causal order every derived
//! view (stats, context, status history) relies on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::Inputs;
use crate::domain::{AgentRecord, AgentSnapshot, AgentStatus, Feedback, Task, TaskSnapshot, TaskStatus, WorkflowStatus};
use crate::lifecycle::ErrorReport;
use crate::stats::{CostBreakdown, TaskStats, TokenUsage, WorkflowStats};

/// One immutable record in the event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unix milliseconds
    pub timestamp: i64,

    /// Human readable summary
    pub description: String,

    #[serde(flatten)]
    pub kind: LogKind,
}

/// Entry payload, discriminated by `log_type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "log_type")]
pub enum LogKind {
    TaskStatusUpdate {
        task: TaskSnapshot,
        #[serde(default)]
        agent: Option<AgentSnapshot>,
        task_status: TaskStatus,
        metadata: TaskLogMetadata,
    },
    AgentStatusUpdate {
        #[serde(default)]
        task: Option<TaskSnapshot>,
        agent: AgentSnapshot,
        agent_status: AgentStatus,
        metadata: AgentLogMetadata,
    },
    WorkflowStatusUpdate {
        workflow_status: WorkflowStatus,
        metadata: WorkflowLogMetadata,
    },
}

/// Stats captured at the moment a task transition was logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatsSnapshot {
    pub stats: TaskStats,
    pub cost: CostBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLogMetadata {
    /// Absent on the DOING entry that opens an execution window
    #[serde(default)]
    pub stats: Option<TaskStatsSnapshot>,
    pub detail: TaskLogDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskLogDetail {
    StatusChanged,
    Completed { result: Value },
    Failed { report: ErrorReport },
    FeedbackReceived { feedback: Feedback },
    Validated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentLogMetadata {
    Plain,
    Usage { usage: TokenUsage },
    Error { message: String },
    Iteration { iteration: u32 },
    Tool { tool: String },
    Output { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowLogMetadata {
    /// Opening entry of a run; makes a replayed log self-contained
    Started { plan: Vec<String>, inputs: Inputs },
    StatusChanged,
    Finished {
        #[serde(default)]
        result: Option<Value>,
        stats: WorkflowStats,
    },
    Blocked {
        task_id: String,
        report: ErrorReport,
        stats: WorkflowStats,
    },
    Errored {
        task_id: String,
        report: ErrorReport,
        stats: WorkflowStats,
    },
}

impl LogEntry {
    /// Build a task status entry
    pub fn task_update(
        timestamp: i64,
        task: &Task,
        agent: Option<&AgentRecord>,
        task_status: TaskStatus,
        metadata: TaskLogMetadata,
        description: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            description: description.into(),
            kind: LogKind::TaskStatusUpdate {
                task: task.snapshot(),
                agent: agent.map(AgentRecord::snapshot),
                task_status,
                metadata,
            },
        }
    }

    /// Build an agent status entry
    pub fn agent_update(
        timestamp: i64,
        task: Option<&Task>,
        agent: &AgentRecord,
        agent_status: AgentStatus,
        metadata: AgentLogMetadata,
        description: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            description: description.into(),
            kind: LogKind::AgentStatusUpdate {
                task: task.map(Task::snapshot),
                agent: agent.snapshot(),
                agent_status,
                metadata,
            },
        }
    }

    /// Build a workflow status entry
    pub fn workflow_update(
        timestamp: i64,
        workflow_status: WorkflowStatus,
        metadata: WorkflowLogMetadata,
        description: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            description: description.into(),
            kind: LogKind::WorkflowStatusUpdate {
                workflow_status,
                metadata,
            },
        }
    }

    pub fn log_type(&self) -> &'static str {
        match &self.kind {
            LogKind::TaskStatusUpdate { .. } => "TaskStatusUpdate",
            LogKind::AgentStatusUpdate { .. } => "AgentStatusUpdate",
            LogKind::WorkflowStatusUpdate { .. } => "WorkflowStatusUpdate",
        }
    }

    /// Task the entry refers to, if any
    pub fn task(&self) -> Option<&TaskSnapshot> {
        match &self.kind {
            LogKind::TaskStatusUpdate { task, .. } => Some(task),
            LogKind::AgentStatusUpdate { task, .. } => task.as_ref(),
            LogKind::WorkflowStatusUpdate { .. } => None,
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task().map(|t| t.id.as_str())
    }

    pub fn agent(&self) -> Option<&AgentSnapshot> {
        match &self.kind {
            LogKind::TaskStatusUpdate { agent, .. } => agent.as_ref(),
            LogKind::AgentStatusUpdate { agent, .. } => Some(agent),
            LogKind::WorkflowStatusUpdate { .. } => None,
        }
    }

    pub fn task_status(&self) -> Option<TaskStatus> {
        match &self.kind {
            LogKind::TaskStatusUpdate { task_status, .. } => Some(*task_status),
            _ => None,
        }
    }

    pub fn agent_status(&self) -> Option<AgentStatus> {
        match &self.kind {
            LogKind::AgentStatusUpdate { agent_status, .. } => Some(*agent_status),
            _ => None,
        }
    }

    pub fn workflow_status(&self) -> Option<WorkflowStatus> {
        match &self.kind {
            LogKind::WorkflowStatusUpdate { workflow_status, .. } => Some(*workflow_status),
            _ => None,
        }
    }

    /// True for a TaskStatusUpdate of `task_id` with the given status
    pub fn is_task_status(&self, task_id: &str, status: TaskStatus) -> bool {
        self.task_status() == Some(status) && self.task_id() == Some(task_id)
    }

    /// Token usage reported by a THINKING_END entry
    pub fn token_usage(&self) -> Option<TokenUsage> {
        match &self.kind {
            LogKind::AgentStatusUpdate {
                metadata: AgentLogMetadata::Usage { usage },
                ..
            } => Some(*usage),
            _ => None,
        }
    }

    /// Plan order and inputs recorded by a run's opening entry
    pub fn started_plan(&self) -> Option<(&[String], &Inputs)> {
        match &self.kind {
            LogKind::WorkflowStatusUpdate {
                metadata: WorkflowLogMetadata::Started { plan, inputs },
                ..
            } => Some((plan.as_slice(), inputs)),
            _ => None,
        }
    }
}

/// Plan order recorded by the most recent run-opening entry in `logs`
pub fn recorded_plan(logs: &[LogEntry]) -> Option<Vec<String>> {
    logs.iter().rev().find_map(|e| e.started_plan().map(|(plan, _)| plan.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;

    fn task() -> Task {
        Task::new("a1", "Count to three").with_id("t1")
    }

    fn agent() -> AgentRecord {
        AgentRecord::new("a1", "Counter")
    }

    #[test]
    fn test_task_entry_accessors() {
        let meta = TaskLogMetadata {
            stats: None,
            detail: TaskLogDetail::StatusChanged,
        };
        let entry = LogEntry::task_update(10, &task(), Some(&agent()), TaskStatus::Doing, meta, "start");
        assert_eq!(entry.log_type(), "TaskStatusUpdate");
        assert_eq!(entry.task_id(), Some("t1"));
        assert_eq!(entry.agent().map(|a| a.id.as_str()), Some("a1"));
        assert!(entry.is_task_status("t1", TaskStatus::Doing));
        assert!(!entry.is_task_status("t2", TaskStatus::Doing));
        assert!(entry.agent_status().is_none());
    }

    #[test]
    fn test_agent_entry_usage() {
        let entry = LogEntry::agent_update(
            5,
            Some(&task()),
            &agent(),
            AgentStatus::ThinkingEnd,
            AgentLogMetadata::Usage {
                usage: TokenUsage::new(3, 4),
            },
            "thought",
        );
        assert_eq!(entry.token_usage(), Some(TokenUsage::new(3, 4)));
        assert_eq!(entry.agent_status(), Some(AgentStatus::ThinkingEnd));
        assert_eq!(entry.task_id(), Some("t1"));
    }

    #[test]
    fn test_json_shape_is_tagged() {
        let entry = LogEntry::workflow_update(
            1,
            WorkflowStatus::Running,
            WorkflowLogMetadata::Started {
                plan: vec!["t1".into(), "t2".into()],
                inputs: Inputs::new(),
            },
            "Workflow started",
        );
        let json: Value = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["log_type"], "WorkflowStatusUpdate");
        assert_eq!(json["workflow_status"], "RUNNING");
        assert_eq!(json["metadata"]["kind"], "started");

        let back: LogEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
        assert_eq!(recorded_plan(&[back]), Some(vec!["t1".to_string(), "t2".to_string()]));
    }
}
