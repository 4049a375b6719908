//! Lifecycle error types

use thiserror::Error;

use crate::domain::{TaskStatus, WorkflowStatus};

/// Reasons a task, agent or workflow transition is refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Illegal task transition for {task_id}: {from} -> {to}")]
    IllegalTaskTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Illegal workflow transition: {from} -> {to}")]
    IllegalWorkflowTransition { from: WorkflowStatus, to: WorkflowStatus },

    #[error("Malformed task: {0}")]
    Malformed(String),

    #[error("Workflow is {0}, no further changes accepted")]
    WorkflowClosed(WorkflowStatus),
}

impl LifecycleError {
    /// True when the request itself was fine but arrived in the wrong state
    pub fn is_illegal_transition(&self) -> bool {
        matches!(
            self,
            Self::IllegalTaskTransition { .. } | Self::IllegalWorkflowTransition { .. } | Self::WorkflowClosed(_)
        )
    }
}
