//! Execution lane for task runs
//!
//! A FIFO queue with a concurrency limit (one by default).

mod config;
mod queue;

pub use config::QueueConfig;
pub use queue::{QueueState, QueueStats, RunKey, ScheduleResult, TaskQueue};
