//! Agent status updates
//!
//! Agents report what they are doing (thinking, using a tool, finishing an
//! iteration). Each report sets the agent's status and appends one
//! AgentStatusUpdate entry; the stats engine reads usage from these.

use tracing::debug;

use crate::domain::AgentStatus;
use crate::events::{AgentLogMetadata, LogEntry};
use crate::state::TeamState;

use super::error::LifecycleError;

#[derive(Debug, Clone, PartialEq)]
pub struct AgentUpdate {
    pub agent_id: String,
    /// Task the agent is working on, if any
    pub task_id: Option<String>,
    pub status: AgentStatus,
    pub metadata: AgentLogMetadata,
    pub description: String,
}

impl AgentUpdate {
    pub fn new(agent_id: impl Into<String>, status: AgentStatus) -> Self {
        Self {
            agent_id: agent_id.into(),
            task_id: None,
            status,
            metadata: AgentLogMetadata::Plain,
            description: status.to_string(),
        }
    }

    pub fn for_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: AgentLogMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

pub(crate) fn apply_agent(state: &mut TeamState, update: AgentUpdate, now: i64) -> Result<(), LifecycleError> {
    debug!(agent_id = %update.agent_id, status = %update.status, "apply_agent: called");
    let task = match &update.task_id {
        Some(id) => Some(
            state
                .task(id)
                .cloned()
                .ok_or_else(|| LifecycleError::TaskNotFound(id.clone()))?,
        ),
        None => None,
    };
    let agent = state
        .agent_mut(&update.agent_id)
        .ok_or_else(|| LifecycleError::AgentNotFound(update.agent_id.clone()))?;
    agent.status = update.status;
    let entry = LogEntry::agent_update(
        now,
        task.as_ref(),
        agent,
        update.status,
        update.metadata,
        update.description,
    );
    state.logs.push(entry);
    Ok(())
}
