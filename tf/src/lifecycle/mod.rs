//! Task and workflow lifecycle as pure reducers
//!
//! `dispatch_*` take the current state and an event and return the next
//! state. Follow-on effects (a completed task advancing the plan, a failed
//! task blocking the workflow) are applied in the same dispatch, in order, so
//! the result is either fully applied or not at all.

mod agent;
mod error;
mod report;
mod task;
mod workflow;

use std::collections::VecDeque;

use tracing::debug;

use crate::state::TeamState;
use crate::stats::PriceTable;

pub use agent::AgentUpdate;
pub use error::LifecycleError;
pub use report::ErrorReport;
pub use task::TaskEvent;
pub use workflow::WorkflowEvent;

/// Environment a reducer needs besides the state
#[derive(Debug, Clone, Copy)]
pub struct ReduceContext<'a> {
    pub pricing: &'a PriceTable,
    /// Timestamp for every entry appended by this dispatch
    pub now: i64,
}

impl<'a> ReduceContext<'a> {
    pub fn new(pricing: &'a PriceTable, now: i64) -> Self {
        Self { pricing, now }
    }
}

/// Follow-on work produced by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Workflow(WorkflowEvent),
    Task { task_id: String, event: TaskEvent },
}

fn drain(state: &mut TeamState, mut queue: VecDeque<Effect>, ctx: &ReduceContext<'_>) -> Result<(), LifecycleError> {
    while let Some(effect) = queue.pop_front() {
        let more = match effect {
            Effect::Workflow(event) => workflow::apply_workflow(state, event, ctx)?,
            Effect::Task { task_id, event } => task::apply_task(state, &task_id, event, ctx)?,
        };
        queue.extend(more);
    }
    Ok(())
}

/// Apply a task event and its consequences
pub fn dispatch_task(
    state: &TeamState,
    task_id: &str,
    event: TaskEvent,
    ctx: &ReduceContext<'_>,
) -> Result<TeamState, LifecycleError> {
    debug!(%task_id, event = event.name(), "dispatch_task: called");
    let mut next = state.clone();
    let effects = task::apply_task(&mut next, task_id, event, ctx)?;
    drain(&mut next, effects.into(), ctx)?;
    Ok(next)
}

/// Apply a workflow event and its consequences
pub fn dispatch_workflow(
    state: &TeamState,
    event: WorkflowEvent,
    ctx: &ReduceContext<'_>,
) -> Result<TeamState, LifecycleError> {
    debug!(event = event.name(), "dispatch_workflow: called");
    let mut next = state.clone();
    let effects = workflow::apply_workflow(&mut next, event, ctx)?;
    drain(&mut next, effects.into(), ctx)?;
    Ok(next)
}

/// Record an agent status report
pub fn dispatch_agent(state: &TeamState, update: AgentUpdate, now: i64) -> Result<TeamState, LifecycleError> {
    let mut next = state.clone();
    agent::apply_agent(&mut next, update, now)?;
    Ok(next)
}
