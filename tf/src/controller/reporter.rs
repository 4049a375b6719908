//! AgentReporter - status reporting handle handed to an agent
//!
//! A reporter is bound to one task, one agent and the run epoch it was
//! created in. Reports made after a reset belong to a run that no longer
//! exists and are dropped.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{AgentStatus, now_ms};
use crate::events::AgentLogMetadata;
use crate::lifecycle::{AgentUpdate, LifecycleError, dispatch_agent};
use crate::state::TeamStore;
use crate::stats::TokenUsage;

#[derive(Clone)]
pub struct AgentReporter {
    store: Arc<TeamStore>,
    agent_id: String,
    task_id: String,
    epoch: u64,
}

impl AgentReporter {
    pub fn new(store: Arc<TeamStore>, agent_id: impl Into<String>, task_id: impl Into<String>, epoch: u64) -> Self {
        Self {
            store,
            agent_id: agent_id.into(),
            task_id: task_id.into(),
            epoch,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Record a status with metadata
    pub fn report(
        &self,
        status: AgentStatus,
        metadata: AgentLogMetadata,
        description: impl Into<String>,
    ) -> Result<(), LifecycleError> {
        debug!(agent_id = %self.agent_id, task_id = %self.task_id, %status, "AgentReporter::report: called");
        if self.store.get().epoch != self.epoch {
            debug!(epoch = self.epoch, "AgentReporter::report: stale epoch, dropping");
            return Ok(());
        }
        let update = AgentUpdate::new(self.agent_id.clone(), status)
            .for_task(self.task_id.clone())
            .with_metadata(metadata)
            .with_description(description);
        let epoch = self.epoch;
        self.store
            .modify(|state| {
                if state.epoch != epoch {
                    return Ok(None);
                }
                dispatch_agent(state, update, now_ms()).map(Some)
            })
            .map(|_| ())
    }

    /// Report, logging instead of returning a failure
    fn emit(&self, status: AgentStatus, metadata: AgentLogMetadata, description: String) {
        if let Err(e) = self.report(status, metadata, description) {
            warn!(agent_id = %self.agent_id, task_id = %self.task_id, error = %e, "AgentReporter: report rejected");
        }
    }

    // === Convenience methods ===

    pub fn thinking(&self) {
        self.emit(AgentStatus::Thinking, AgentLogMetadata::Plain, "Agent is thinking".to_string());
    }

    /// A model call succeeded; this is what the stats engine counts
    pub fn thinking_end(&self, usage: TokenUsage) {
        self.emit(
            AgentStatus::ThinkingEnd,
            AgentLogMetadata::Usage { usage },
            format!("Agent finished thinking ({} tokens)", usage.total()),
        );
    }

    pub fn thinking_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.emit(
            AgentStatus::ThinkingError,
            AgentLogMetadata::Error {
                message: message.clone(),
            },
            format!("Model call failed: {}", message),
        );
    }

    /// The model answered with something that could not be parsed
    pub fn parsing_error(&self, output: impl Into<String>) {
        self.emit(
            AgentStatus::IssuesParsingLlmOutput,
            AgentLogMetadata::Output { text: output.into() },
            "Could not parse model output".to_string(),
        );
    }

    pub fn iteration_start(&self, iteration: u32) {
        self.emit(
            AgentStatus::IterationStart,
            AgentLogMetadata::Iteration { iteration },
            format!("Iteration {} started", iteration),
        );
    }

    pub fn iteration_end(&self, iteration: u32) {
        self.emit(
            AgentStatus::IterationEnd,
            AgentLogMetadata::Iteration { iteration },
            format!("Iteration {} finished", iteration),
        );
    }

    pub fn using_tool(&self, tool: impl Into<String>) {
        let tool = tool.into();
        let description = format!("Using tool {}", tool);
        self.emit(AgentStatus::UsingTool, AgentLogMetadata::Tool { tool }, description);
    }

    pub fn tool_end(&self, tool: impl Into<String>) {
        let tool = tool.into();
        let description = format!("Tool {} finished", tool);
        self.emit(AgentStatus::UsingToolEnd, AgentLogMetadata::Tool { tool }, description);
    }

    pub fn final_answer(&self, text: impl Into<String>) {
        self.emit(
            AgentStatus::FinalAnswer,
            AgentLogMetadata::Output { text: text.into() },
            "Agent gave a final answer".to_string(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentRecord, Task};
    use crate::lifecycle::{ReduceContext, WorkflowEvent, dispatch_workflow};
    use crate::state::TeamState;
    use crate::stats::{PriceTable, compute_task_stats};

    fn store() -> Arc<TeamStore> {
        let mut state = TeamState::new("crew");
        state.agents.push(AgentRecord::new("a1", "Ada"));
        state.tasks.push(Task::new("a1", "one").with_id("t1"));
        Arc::new(TeamStore::new(state, 64))
    }

    #[test]
    fn test_reports_feed_task_stats() {
        let store = store();
        let reporter = AgentReporter::new(store.clone(), "a1", "t1", 0);
        reporter.iteration_start(1);
        reporter.thinking();
        reporter.thinking_end(TokenUsage::new(100, 50));
        reporter.parsing_error("???");
        reporter.iteration_end(1);

        let state = store.get();
        assert_eq!(state.logs.len(), 5);
        assert_eq!(state.agent("a1").unwrap().status, AgentStatus::IterationEnd);

        // Without a DOING anchor the usage is outside any task window
        let stats = compute_task_stats("t1", &state.logs, now_ms());
        assert_eq!(stats.llm_usage.calls_count, 0);
    }

    #[test]
    fn test_stale_epoch_is_dropped() {
        let store = store();
        let reporter = AgentReporter::new(store.clone(), "a1", "t1", 0);
        let pricing = PriceTable::empty();
        store
            .update(|s| dispatch_workflow(s, WorkflowEvent::Reset, &ReduceContext::new(&pricing, 1)))
            .unwrap();
        reporter.thinking();
        assert!(store.get().logs.is_empty());
    }

    #[test]
    fn test_unknown_task_is_rejected() {
        let store = store();
        let reporter = AgentReporter::new(store.clone(), "a1", "ghost", 0);
        assert!(reporter.report(AgentStatus::Thinking, AgentLogMetadata::Plain, "x").is_err());
    }
}
