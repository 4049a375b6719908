//! teamflow - task/agent/workflow state machine for agent teams
//!
//! A team runs a linear plan of tasks, each owned by an agent. Every task,
//! agent and the workflow itself move through a closed set of statuses, and
//! every move is appended to an event log. Stats (duration, token usage,
//! cost) and the context handed to later tasks are pure folds over that log.
//!
//! # Modules
//!
//! - [`domain`] - Tasks, agent records, feedback and status enums
//! - [`events`] - Event log entries, live bus, JSONL persistence
//! - [`stats`] - Log-derived stats and the model price table
//! - [`context`] - Context derivation and description interpolation
//! - [`lifecycle`] - Task and workflow transitions as pure reducers
//! - [`state`] - Team state and the store that owns it
//! - [`scheduler`] - FIFO execution lane
//! - [`controller`] - Agent runs, status reporting, stall watchdog
//! - [`agent`] - Agent collaborator trait
//! - [`team`] - Public team API
//! - [`plan`] - YAML team plans
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod agent;
pub mod cli;
pub mod config;
pub mod context;
pub mod controller;
pub mod domain;
pub mod events;
pub mod lifecycle;
pub mod plan;
pub mod scheduler;
pub mod state;
pub mod stats;
pub mod team;

// Re-export commonly used types
pub use agent::{Agent, AgentRegistry, EchoAgent, TaskOutcome};
pub use config::Config;
pub use context::{Inputs, derive_context, interpolate};
pub use controller::{AgentReporter, WatchdogConfig, WorkflowController};
pub use domain::{
    AgentRecord, AgentStatus, Feedback, FeedbackStatus, IdResolver, LlmSettings, Task, TaskStatus, WorkflowStatus,
};
pub use events::{LogEntry, LogKind, read_log_file, write_log_file};
pub use lifecycle::{ErrorReport, LifecycleError, TaskEvent, WorkflowEvent};
pub use plan::TeamPlan;
pub use scheduler::QueueConfig;
pub use state::{TeamState, TeamStore, WorkflowResult};
pub use stats::{
    CostBreakdown, LlmUsageStats, PriceTable, TaskStats, TokenUsage, WorkflowStats, compute_task_stats,
    compute_workflow_stats,
};
pub use team::{Team, TeamBuilder, TeamError, WorkflowOutcome};
