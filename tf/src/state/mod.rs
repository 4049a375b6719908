//! Team state and the store that owns it

mod store;
mod team_state;

pub use store::TeamStore;
pub use team_state::{TeamState, WorkflowResult};
