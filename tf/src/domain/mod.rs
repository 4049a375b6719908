//! Domain types for teamflow
//!
//! Tasks, agent records, feedback and the status enums that drive them.

mod agent;
mod id;
mod status;
mod task;

pub use agent::{AgentRecord, AgentSnapshot, LlmSettings};
pub use id::{IdResolver, generate_id, now_ms};
pub use status::{AgentStatus, FeedbackStatus, TaskStatus, WorkflowStatus};
pub use task::{Feedback, Task, TaskSnapshot, result_text};
