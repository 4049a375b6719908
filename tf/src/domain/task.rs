//! Task domain type
//!
//! A task is one step of the linear team plan. It is owned by exactly one
//! agent for its whole life and collects feedback as it is revised.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use super::id::generate_id;
use super::status::{FeedbackStatus, TaskStatus};

/// A piece of human feedback attached to a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: String,
    pub content: String,
    pub status: FeedbackStatus,
    /// Unix milliseconds
    pub timestamp: i64,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Feedback {
    /// Create a new PENDING feedback entry
    pub fn new(content: impl Into<String>, user_id: Option<String>, timestamp: i64) -> Self {
        let content = content.into();
        Self {
            id: generate_id("feedback", &content),
            content,
            status: FeedbackStatus::Pending,
            timestamp,
            user_id,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == FeedbackStatus::Pending
    }
}

/// A task in the team plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: String,

    /// Short display title
    #[serde(default)]
    pub title: String,

    /// What the agent is asked to do; may contain `{placeholders}`
    pub description: String,

    /// What a good result looks like
    #[serde(default)]
    pub expected_output: String,

    pub status: TaskStatus,

    /// Owning agent, fixed when the plan is built
    pub agent_id: String,

    /// Set on completion
    #[serde(default)]
    pub result: Option<Value>,

    #[serde(default)]
    pub feedback_history: Vec<Feedback>,

    /// This task's result becomes the workflow result
    #[serde(default)]
    pub is_deliverable: bool,

    /// Completion waits for a human to validate
    #[serde(default)]
    pub external_validation_required: bool,

    /// Last error message, if the task was blocked
    #[serde(default)]
    pub error: Option<String>,
}

impl Task {
    /// Create a new TODO task owned by `agent_id`
    pub fn new(agent_id: impl Into<String>, description: impl Into<String>) -> Self {
        let description = description.into();
        Self {
            id: generate_id("task", &description),
            title: String::new(),
            description,
            expected_output: String::new(),
            status: TaskStatus::Todo,
            agent_id: agent_id.into(),
            result: None,
            feedback_history: Vec::new(),
            is_deliverable: false,
            external_validation_required: false,
            error: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_expected_output(mut self, expected_output: impl Into<String>) -> Self {
        self.expected_output = expected_output.into();
        self
    }

    /// Mark this task as the workflow deliverable
    pub fn deliverable(mut self) -> Self {
        self.is_deliverable = true;
        self
    }

    /// Route completion through the validation gate
    pub fn requiring_validation(mut self) -> Self {
        self.external_validation_required = true;
        self
    }

    /// Title if set, otherwise the description
    pub fn display_name(&self) -> &str {
        if self.title.is_empty() { &self.description } else { &self.title }
    }

    /// Feedback entries not yet processed, oldest first
    pub fn pending_feedback(&self) -> Vec<Feedback> {
        self.feedback_history.iter().filter(|f| f.is_pending()).cloned().collect()
    }

    pub fn has_pending_feedback(&self) -> bool {
        self.feedback_history.iter().any(Feedback::is_pending)
    }

    /// Mark every PENDING feedback entry PROCESSED, returning how many changed
    pub fn process_feedback(&mut self) -> usize {
        let mut count = 0;
        for feedback in self.feedback_history.iter_mut().filter(|f| f.is_pending()) {
            feedback.status = FeedbackStatus::Processed;
            count += 1;
        }
        count
    }

    /// Put the task back to its pre-run shape
    pub fn reset(&mut self) {
        self.status = TaskStatus::Todo;
        self.result = None;
        self.error = None;
        self.feedback_history.clear();
    }

    /// Check the structural invariants a transition relies on
    pub fn validate_structure(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("task has an empty id".to_string());
        }
        if self.agent_id.trim().is_empty() {
            return Err(format!("task {} has no agent", self.id));
        }
        let mut seen = HashSet::new();
        for feedback in &self.feedback_history {
            if feedback.id.trim().is_empty() {
                return Err(format!("task {} has feedback with an empty id", self.id));
            }
            if !seen.insert(feedback.id.as_str()) {
                return Err(format!("task {} has duplicate feedback id {}", self.id, feedback.id));
            }
        }
        Ok(())
    }

    /// Immutable copy for the event log
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status,
            agent_id: self.agent_id.clone(),
            result: self.result.clone(),
            is_deliverable: self.is_deliverable,
        }
    }
}

/// Task as captured in a log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub agent_id: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub is_deliverable: bool,
}

impl TaskSnapshot {
    pub fn display_name(&self) -> &str {
        if self.title.is_empty() { &self.description } else { &self.title }
    }
}

/// Render a task result the way it appears in prompts and context
pub fn result_text(result: &Value) -> String {
    match result {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
