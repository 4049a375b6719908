//! Shared helpers for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use teamflow::{
    Agent, AgentRecord, AgentReporter, Feedback, Inputs, Task, TaskOutcome, Team, TeamBuilder, TokenUsage,
    WorkflowOutcome,
};

/// What a scripted agent does on one call
pub enum Step {
    Complete { result: String, usage: TokenUsage },
    Fail(String),
    Block(String),
    /// Signal `started`, wait for `release`, then complete
    Gated {
        started: Arc<Notify>,
        release: Arc<Notify>,
        result: String,
    },
}

impl Step {
    pub fn complete(result: &str, input_tokens: u64, output_tokens: u64) -> Self {
        Self::Complete {
            result: result.to_string(),
            usage: TokenUsage::new(input_tokens, output_tokens),
        }
    }
}

/// One recorded agent call
#[derive(Debug, Clone)]
pub struct Call {
    pub task_id: String,
    pub description: String,
    pub context: String,
    /// Feedback contents for a revision call, empty otherwise
    pub feedback: Vec<String>,
}

/// Agent that follows per-task scripts and records every call
#[derive(Default)]
pub struct ScriptedAgent {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedAgent {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, task_id: &str, step: Step) {
        self.scripts
            .lock()
            .unwrap()
            .entry(task_id.to_string())
            .or_default()
            .push_back(step);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, task_id: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.task_id == task_id).collect()
    }

    async fn run(&self, task: &Task, feedback: Vec<String>, context: &str, reporter: &AgentReporter) -> eyre::Result<TaskOutcome> {
        self.calls.lock().unwrap().push(Call {
            task_id: task.id.clone(),
            description: task.description.clone(),
            context: context.to_string(),
            feedback,
        });
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&task.id)
            .and_then(|steps| steps.pop_front())
            .unwrap_or_else(|| Step::complete(&format!("done: {}", task.description), 10, 5));

        reporter.iteration_start(1);
        reporter.thinking();
        let outcome = match step {
            Step::Complete { result, usage } => {
                reporter.thinking_end(usage);
                Ok(TaskOutcome::completed(result))
            }
            Step::Fail(message) => {
                reporter.thinking_error(&message);
                Err(eyre::eyre!(message))
            }
            Step::Block(reason) => {
                reporter.thinking_end(TokenUsage::new(10, 5));
                Ok(TaskOutcome::blocked(reason))
            }
            Step::Gated {
                started,
                release,
                result,
            } => {
                started.notify_one();
                release.notified().await;
                reporter.thinking_end(TokenUsage::new(10, 5));
                Ok(TaskOutcome::completed(result))
            }
        };
        reporter.iteration_end(1);
        outcome
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn work_on_task(
        &self,
        task: &Task,
        _inputs: &Inputs,
        context: &str,
        reporter: &AgentReporter,
    ) -> eyre::Result<TaskOutcome> {
        self.run(task, Vec::new(), context, reporter).await
    }

    async fn work_on_feedback(
        &self,
        task: &Task,
        feedback: &[Feedback],
        context: &str,
        reporter: &AgentReporter,
    ) -> eyre::Result<TaskOutcome> {
        let feedback = feedback.iter().map(|f| f.content.clone()).collect();
        self.run(task, feedback, context, reporter).await
    }
}

/// Team with one agent `a1` on gpt-4o-mini and the given tasks
pub fn team_builder(agent: &Arc<ScriptedAgent>, tasks: Vec<Task>) -> TeamBuilder {
    let mut builder = Team::builder("crew").agent(
        AgentRecord::new("a1", "Ada").with_model("openai", "gpt-4o-mini"),
        agent.clone(),
    );
    for task in tasks {
        builder = builder.task(task);
    }
    builder
}

pub fn task(id: &str, description: &str) -> Task {
    Task::new("a1", description).with_id(id)
}

/// Wait for the run to settle, failing the test after five seconds
pub async fn settled(team: &Team) -> WorkflowOutcome {
    tokio::time::timeout(Duration::from_secs(5), team.wait_until_settled())
        .await
        .expect("workflow did not settle in time")
}

/// Wait for a gated step to start
pub async fn started(notify: &Notify) {
    tokio::time::timeout(Duration::from_secs(5), notify.notified())
        .await
        .expect("agent did not start in time");
}

/// Poll `check` against the team state until it holds
pub async fn eventually<F>(team: &Team, check: F)
where
    F: Fn(&teamflow::TeamState) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check(&team.state()) {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
