//! Stats engine
//!
//! Pure folds over the event log. Nothing here is cached: the log is
//! append-only, so recomputing on demand always gives the current answer.

mod cost;
mod task;
mod usage;
mod workflow;

pub use cost::{CostBreakdown, ModelPrice, PriceTable, UNKNOWN_COST};
pub use task::{TaskStats, compute_task_stats};
pub use usage::{LlmUsageStats, TokenUsage};
pub use workflow::{WorkflowStats, compute_workflow_stats};
