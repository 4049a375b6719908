//! Status enums for tasks, agents, workflows and feedback
//!
//! Task and workflow statuses carry explicit transition tables. Agent
//! statuses are recorded as reported and are not table-checked.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Not yet started
    #[default]
    Todo,
    /// Handed to the execution lane
    Doing,
    /// Failed or waiting on outside input
    Blocked,
    /// Feedback received, will be re-run
    Revise,
    /// Completed
    Done,
    /// Completed, waiting for a human to approve
    AwaitingValidation,
    /// Approved, about to complete
    Validated,
    /// Suspended with the workflow
    Paused,
    /// Leaving PAUSED, about to continue
    Resumed,
    /// Stopped by the user
    Aborted,
}

impl TaskStatus {
    /// Legal successor statuses
    pub fn successors(&self) -> &'static [TaskStatus] {
        use TaskStatus::*;
        match self {
            Todo => &[Doing],
            Doing => &[Done, AwaitingValidation, Blocked, Revise, Paused, Aborted],
            AwaitingValidation => &[Validated, Revise],
            Validated => &[Done],
            Revise => &[Doing],
            Paused => &[Resumed, Aborted],
            Resumed => &[Doing],
            Blocked => &[Revise],
            Done => &[Revise],
            Aborted => &[],
        }
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        self.successors().contains(&next)
    }

    /// Terminal for the task itself (feedback may still reopen DONE and BLOCKED)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted | Self::Blocked)
    }

    /// Statuses that accept user feedback
    pub fn accepts_feedback(&self) -> bool {
        self.can_transition_to(Self::Revise)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Todo => "TODO",
            Self::Doing => "DOING",
            Self::Blocked => "BLOCKED",
            Self::Revise => "REVISE",
            Self::Done => "DONE",
            Self::AwaitingValidation => "AWAITING_VALIDATION",
            Self::Validated => "VALIDATED",
            Self::Paused => "PAUSED",
            Self::Resumed => "RESUMED",
            Self::Aborted => "ABORTED",
        };
        write!(f, "{}", s)
    }
}

/// Workflow (team run) status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    #[default]
    Initial,
    Running,
    Paused,
    Stopping,
    Stopped,
    Errored,
    Finished,
    Blocked,
}

impl WorkflowStatus {
    /// Legal successor statuses (reset to INITIAL is handled separately)
    pub fn successors(&self) -> &'static [WorkflowStatus] {
        use WorkflowStatus::*;
        match self {
            Initial => &[Running],
            Running => &[Paused, Stopping, Errored, Finished, Blocked],
            Paused => &[Running, Stopping],
            Blocked => &[Running, Stopping, Errored],
            Stopping => &[Stopped],
            Errored => &[Running],
            Finished | Stopped => &[],
        }
    }

    pub fn can_transition_to(&self, next: WorkflowStatus) -> bool {
        self.successors().contains(&next)
    }

    /// No outgoing transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Stopped)
    }

    /// The run cannot proceed without outside action
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Finished | Self::Stopped | Self::Errored | Self::Blocked)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initial => "INITIAL",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::Errored => "ERRORED",
            Self::Finished => "FINISHED",
            Self::Blocked => "BLOCKED",
        };
        write!(f, "{}", s)
    }
}

/// Agent activity status, reported by the agent while it works
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    #[default]
    Initial,
    Thinking,
    ThinkingEnd,
    ThinkingError,
    Thought,
    ExecutingAction,
    UsingTool,
    UsingToolEnd,
    UsingToolError,
    ToolDoesNotExist,
    Observation,
    FinalAnswer,
    TaskCompleted,
    MaxIterationsError,
    IssuesParsingLlmOutput,
    SelfQuestion,
    IterationStart,
    IterationEnd,
    AgenticLoopError,
    WeirdLlmOutput,
    Paused,
    Resumed,
    TaskAborted,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Reuse the serde names so logs and display agree
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(s)) => write!(f, "{}", s),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// Feedback processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackStatus {
    #[default]
    Pending,
    Processed,
}

impl std::fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Processed => write!(f, "PROCESSED"),
        }
    }
}

/// Parse a status by its wire name, case-insensitively
fn parse_status<T: DeserializeOwned>(kind: &str, s: &str) -> Result<T, String> {
    let name = s.trim().to_uppercase().replace('-', "_");
    serde_json::from_value(serde_json::Value::String(name)).map_err(|_| format!("Unknown {} status: {}", kind, s))
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_status("task", s)
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_status("workflow", s)
    }
}

impl FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_status("agent", s)
    }
}

impl FromStr for FeedbackStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_status("feedback", s)
    }
}
