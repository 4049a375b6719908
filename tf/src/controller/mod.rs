//! Execution control: agent runs, status reporting, stall detection

mod core;
mod reporter;
mod watchdog;

pub use self::core::{ControllerHandle, WorkflowController};
pub use reporter::AgentReporter;
pub use watchdog::{Watchdog, WatchdogConfig};
