//! Event log: entry types, live bus and JSONL persistence

mod bus;
mod entry;
mod sink;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, LogBus};
pub use entry::{
    AgentLogMetadata, LogEntry, LogKind, TaskLogDetail, TaskLogMetadata, TaskStatsSnapshot, WorkflowLogMetadata,
    recorded_plan,
};
pub use sink::{LogSink, read_log_file, spawn_log_sink, write_log_file};
