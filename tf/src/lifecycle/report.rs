//! Structured diagnostics for blocked and errored tasks
//!
//! A report goes into the event log and to `tracing`, so a live observer and
//! a later replay see the same message.

use serde::{Deserialize, Serialize};

use crate::domain::Task;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// What happened
    pub message: String,
    /// What a human should do about it
    pub recommended_action: String,
    /// Original error payload, if any
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>, recommended_action: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            recommended_action: recommended_action.into(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// The agent failed while working on the task
    pub fn task_error(task: &Task, error: &str) -> Self {
        Self::new(
            format!("Task '{}' failed: {}", task.display_name(), error),
            "Check the agent's configuration and inputs, then give the task feedback to retry it",
        )
        .with_error(error)
    }

    /// The agent reported it cannot proceed
    pub fn task_blocked(task: &Task, reason: &str) -> Self {
        Self::new(
            format!("Task '{}' is blocked: {}", task.display_name(), reason),
            "Provide the missing information as feedback on the task",
        )
        .with_error(reason)
    }

    pub fn awaiting_validation(task: &Task) -> Self {
        Self::new(
            format!("Task '{}' is awaiting validation", task.display_name()),
            "Review the result and validate the task, or send feedback to revise it",
        )
    }

    /// Nothing left to run but a task is still blocked
    pub fn still_blocked(task: &Task) -> Self {
        let mut report = Self::new(
            format!("Task '{}' ({}) is still unresolved", task.display_name(), task.status),
            "Provide feedback on or validate the task to continue",
        );
        report.error = task.error.clone();
        report
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}. Recommended action: {}", self.message, self.recommended_action)?;
        if let Some(error) = &self.error {
            write!(f, " (error: {})", error)?;
        }
        Ok(())
    }
}
