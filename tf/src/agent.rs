//! Agent collaborator interface
//!
//! The core never talks to a model. It hands a task to an `Agent` and routes
//! the returned outcome (or error) back into the lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::context::Inputs;
use crate::controller::AgentReporter;
use crate::domain::{Feedback, Task};
use crate::stats::TokenUsage;

/// What an agent produced for a task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed { result: Value },
    /// The agent cannot proceed without outside input
    Blocked { reason: String },
}

impl TaskOutcome {
    pub fn completed(result: impl Into<Value>) -> Self {
        Self::Completed { result: result.into() }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self::Blocked { reason: reason.into() }
    }
}

/// An autonomous worker that executes tasks
///
/// `task.description` is already interpolated. Errors are caught by the
/// controller and turn the task BLOCKED; they never escape further.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn work_on_task(
        &self,
        task: &Task,
        inputs: &Inputs,
        context: &str,
        reporter: &AgentReporter,
    ) -> eyre::Result<TaskOutcome>;

    /// Re-run a task with the feedback entries still PENDING
    async fn work_on_feedback(
        &self,
        task: &Task,
        feedback: &[Feedback],
        context: &str,
        reporter: &AgentReporter,
    ) -> eyre::Result<TaskOutcome>;
}

/// Agents by id
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, agent: Arc<dyn Agent>) {
        let id = id.into();
        debug!(%id, "AgentRegistry::register: called");
        self.agents.insert(id, agent);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Rough token estimate (four characters per token)
pub fn estimate_tokens(text: &str) -> u64 {
    text.chars().count().div_ceil(4) as u64
}

/// Dry-run agent that echoes the task back as its result
///
/// Reports one iteration with an estimated token usage, so runs made with it
/// still produce meaningful stats.
#[derive(Debug, Clone, Default)]
pub struct EchoAgent;

impl EchoAgent {
    fn run(&self, prompt: &str, answer: String, reporter: &AgentReporter) -> TaskOutcome {
        reporter.iteration_start(1);
        reporter.thinking();
        reporter.thinking_end(TokenUsage::new(estimate_tokens(prompt), estimate_tokens(&answer)));
        reporter.final_answer(answer.clone());
        reporter.iteration_end(1);
        TaskOutcome::completed(answer)
    }
}

#[async_trait]
impl Agent for EchoAgent {
    async fn work_on_task(
        &self,
        task: &Task,
        _inputs: &Inputs,
        context: &str,
        reporter: &AgentReporter,
    ) -> eyre::Result<TaskOutcome> {
        debug!(task_id = %task.id, "EchoAgent::work_on_task: called");
        let prompt = format!("{}\n{}", task.description, context);
        Ok(self.run(&prompt, task.description.clone(), reporter))
    }

    async fn work_on_feedback(
        &self,
        task: &Task,
        feedback: &[Feedback],
        context: &str,
        reporter: &AgentReporter,
    ) -> eyre::Result<TaskOutcome> {
        debug!(task_id = %task.id, feedback = feedback.len(), "EchoAgent::work_on_feedback: called");
        let notes: Vec<&str> = feedback.iter().map(|f| f.content.as_str()).collect();
        let answer = format!("{}\nRevised for: {}", task.description, notes.join("; "));
        let prompt = format!("{}\n{}\n{}", task.description, notes.join("\n"), context);
        Ok(self.run(&prompt, answer, reporter))
    }
}
