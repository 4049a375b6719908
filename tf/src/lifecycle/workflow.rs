//! Workflow transitions
//!
//! User-driven events (start, pause, resume, stop) are strict and fail on an
//! illegal transition. Follow-on events produced by task transitions (advance,
//! finish, block, error, reopen) are lenient: when they do not apply to the
//! current status they change nothing, which makes FINISHED reachable once.

use tracing::{debug, error, info};

use crate::context::Inputs;
use crate::domain::{AgentStatus, TaskStatus, WorkflowStatus};
use crate::events::{LogEntry, WorkflowLogMetadata};
use crate::state::{TeamState, WorkflowResult};
use crate::stats::compute_workflow_stats;

use super::error::LifecycleError;
use super::report::ErrorReport;
use super::task::TaskEvent;
use super::{Effect, ReduceContext};

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    Start { inputs: Inputs },
    /// Start the next TODO task if nothing is in flight
    AdvancePlan,
    Finish,
    Block { task_id: String, report: ErrorReport },
    Error { task_id: String, report: ErrorReport },
    /// Feedback or validation makes a blocked or errored run live again
    Reopen,
    Pause,
    Resume,
    Stop,
    Stopped,
    /// Back to INITIAL with the same plan
    Reset,
    /// Back to INITIAL with no tasks or agents
    ClearAll,
}

impl WorkflowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::AdvancePlan => "advance_plan",
            Self::Finish => "finish",
            Self::Block { .. } => "block",
            Self::Error { .. } => "error",
            Self::Reopen => "reopen",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Stopped => "stopped",
            Self::Reset => "reset",
            Self::ClearAll => "clear_all",
        }
    }
}

/// Apply one workflow event in place
pub(crate) fn apply_workflow(
    state: &mut TeamState,
    event: WorkflowEvent,
    ctx: &ReduceContext<'_>,
) -> Result<Vec<Effect>, LifecycleError> {
    debug!(status = %state.workflow_status, event = event.name(), "apply_workflow: called");
    match event {
        WorkflowEvent::Start { inputs } => start(state, inputs, ctx),
        WorkflowEvent::AdvancePlan => Ok(advance_plan(state)),
        WorkflowEvent::Finish => {
            finish(state, ctx);
            Ok(Vec::new())
        }
        WorkflowEvent::Block { task_id, report } => {
            halt(state, WorkflowStatus::Blocked, task_id, report, ctx);
            Ok(Vec::new())
        }
        WorkflowEvent::Error { task_id, report } => {
            halt(state, WorkflowStatus::Errored, task_id, report, ctx);
            Ok(Vec::new())
        }
        WorkflowEvent::Reopen => {
            reopen(state, ctx);
            Ok(Vec::new())
        }
        WorkflowEvent::Pause => pause(state, ctx),
        WorkflowEvent::Resume => resume(state, ctx),
        WorkflowEvent::Stop => stop(state, ctx),
        WorkflowEvent::Stopped => {
            set_status(state, WorkflowStatus::Stopped, "Workflow stopped", ctx)?;
            Ok(Vec::new())
        }
        WorkflowEvent::Reset => {
            reset(state);
            Ok(Vec::new())
        }
        WorkflowEvent::ClearAll => {
            clear_all(state);
            Ok(Vec::new())
        }
    }
}

fn ensure(state: &TeamState, to: WorkflowStatus) -> Result<(), LifecycleError> {
    if state.workflow_status.can_transition_to(to) {
        Ok(())
    } else {
        Err(LifecycleError::IllegalWorkflowTransition {
            from: state.workflow_status,
            to,
        })
    }
}

/// Checked transition with a plain StatusChanged entry
fn set_status(
    state: &mut TeamState,
    to: WorkflowStatus,
    description: &str,
    ctx: &ReduceContext<'_>,
) -> Result<(), LifecycleError> {
    ensure(state, to)?;
    state.workflow_status = to;
    state.logs.push(LogEntry::workflow_update(
        ctx.now,
        to,
        WorkflowLogMetadata::StatusChanged,
        description,
    ));
    Ok(())
}

fn start(state: &mut TeamState, inputs: Inputs, ctx: &ReduceContext<'_>) -> Result<Vec<Effect>, LifecycleError> {
    if state.workflow_status != WorkflowStatus::Initial {
        return Err(LifecycleError::IllegalWorkflowTransition {
            from: state.workflow_status,
            to: WorkflowStatus::Running,
        });
    }
    info!(team = %state.name, tasks = state.tasks.len(), "start: workflow running");
    state.workflow_status = WorkflowStatus::Running;
    state.workflow_result = None;
    state.inputs = inputs.clone();
    state.logs.push(LogEntry::workflow_update(
        ctx.now,
        WorkflowStatus::Running,
        WorkflowLogMetadata::Started {
            plan: state.plan_order(),
            inputs,
        },
        format!("Workflow started for team {}", state.name),
    ));

    if state.tasks.is_empty() {
        Ok(vec![Effect::Workflow(WorkflowEvent::Finish)])
    } else {
        Ok(vec![Effect::Workflow(WorkflowEvent::AdvancePlan)])
    }
}

fn advance_plan(state: &TeamState) -> Vec<Effect> {
    if state.workflow_status != WorkflowStatus::Running {
        debug!(status = %state.workflow_status, "advance_plan: workflow not running");
        return Vec::new();
    }
    let in_flight = state.tasks.iter().any(|t| {
        matches!(
            t.status,
            TaskStatus::Doing | TaskStatus::Revise | TaskStatus::Paused | TaskStatus::Resumed
        )
    });
    if in_flight {
        debug!("advance_plan: a task is in flight");
        return Vec::new();
    }

    if let Some(next) = state.tasks_with_status(TaskStatus::Todo).next() {
        debug!(task_id = %next.id, "advance_plan: starting next task");
        return vec![Effect::Task {
            task_id: next.id.clone(),
            event: TaskEvent::Started,
        }];
    }
    if state.all_done() {
        return vec![Effect::Workflow(WorkflowEvent::Finish)];
    }
    // Nothing runnable, but something still waits on a human
    state
        .tasks
        .iter()
        .find(|t| matches!(t.status, TaskStatus::Blocked | TaskStatus::AwaitingValidation))
        .map(|t| {
            vec![Effect::Workflow(WorkflowEvent::Block {
                task_id: t.id.clone(),
                report: ErrorReport::still_blocked(t),
            })]
        })
        .unwrap_or_default()
}

fn finish(state: &mut TeamState, ctx: &ReduceContext<'_>) {
    if state.workflow_status != WorkflowStatus::Running {
        debug!(status = %state.workflow_status, "finish: not running, ignoring");
        return;
    }
    let result = state.deliverable_result();
    let stats = compute_workflow_stats(&state.logs, ctx.pricing, ctx.now);
    info!(team = %state.name, cost = %stats.cost, "finish: workflow finished");
    state.workflow_status = WorkflowStatus::Finished;
    state.workflow_result = Some(WorkflowResult::Completed { result: result.clone() });
    state.logs.push(LogEntry::workflow_update(
        ctx.now,
        WorkflowStatus::Finished,
        WorkflowLogMetadata::Finished { result, stats },
        "Workflow finished",
    ));
}

/// RUNNING -> BLOCKED, or RUNNING/BLOCKED -> ERRORED
fn halt(
    state: &mut TeamState,
    to: WorkflowStatus,
    task_id: String,
    report: ErrorReport,
    ctx: &ReduceContext<'_>,
) {
    if !state.workflow_status.can_transition_to(to) {
        debug!(status = %state.workflow_status, %to, "halt: not applicable, ignoring");
        return;
    }
    error!(team = %state.name, %task_id, %to, %report, "workflow halted");
    let stats = compute_workflow_stats(&state.logs, ctx.pricing, ctx.now);
    state.workflow_status = to;
    state.workflow_result = Some(WorkflowResult::Failed { report: report.clone() });
    let (metadata, description) = if to == WorkflowStatus::Errored {
        (
            WorkflowLogMetadata::Errored { task_id, report, stats },
            "Workflow errored",
        )
    } else {
        (
            WorkflowLogMetadata::Blocked { task_id, report, stats },
            "Workflow blocked",
        )
    };
    state.logs.push(LogEntry::workflow_update(ctx.now, to, metadata, description));
}

fn reopen(state: &mut TeamState, ctx: &ReduceContext<'_>) {
    if !matches!(state.workflow_status, WorkflowStatus::Blocked | WorkflowStatus::Errored) {
        return;
    }
    info!(team = %state.name, from = %state.workflow_status, "reopen: workflow running again");
    state.workflow_status = WorkflowStatus::Running;
    state.workflow_result = None;
    state.logs.push(LogEntry::workflow_update(
        ctx.now,
        WorkflowStatus::Running,
        WorkflowLogMetadata::StatusChanged,
        "Workflow running again",
    ));
}

fn pause(state: &mut TeamState, ctx: &ReduceContext<'_>) -> Result<Vec<Effect>, LifecycleError> {
    set_status(state, WorkflowStatus::Paused, "Workflow paused", ctx)?;
    Ok(state
        .tasks_with_status(TaskStatus::Doing)
        .map(|t| Effect::Task {
            task_id: t.id.clone(),
            event: TaskEvent::Paused,
        })
        .collect())
}

fn resume(state: &mut TeamState, ctx: &ReduceContext<'_>) -> Result<Vec<Effect>, LifecycleError> {
    if state.workflow_status != WorkflowStatus::Paused {
        return Err(LifecycleError::IllegalWorkflowTransition {
            from: state.workflow_status,
            to: WorkflowStatus::Running,
        });
    }
    set_status(state, WorkflowStatus::Running, "Workflow resumed", ctx)?;
    let mut effects: Vec<Effect> = state
        .tasks_with_status(TaskStatus::Paused)
        .map(|t| Effect::Task {
            task_id: t.id.clone(),
            event: TaskEvent::Resumed,
        })
        .collect();
    effects.push(Effect::Workflow(WorkflowEvent::AdvancePlan));
    Ok(effects)
}

fn stop(state: &mut TeamState, ctx: &ReduceContext<'_>) -> Result<Vec<Effect>, LifecycleError> {
    set_status(state, WorkflowStatus::Stopping, "Workflow stopping", ctx)?;
    let mut effects: Vec<Effect> = state
        .tasks
        .iter()
        .filter(|t| matches!(t.status, TaskStatus::Doing | TaskStatus::Paused))
        .map(|t| Effect::Task {
            task_id: t.id.clone(),
            event: TaskEvent::Aborted {
                reason: "workflow stopped".to_string(),
            },
        })
        .collect();
    effects.push(Effect::Workflow(WorkflowEvent::Stopped));
    Ok(effects)
}

fn reset(state: &mut TeamState) {
    info!(team = %state.name, epoch = state.epoch + 1, "reset: workflow back to INITIAL");
    state.epoch += 1;
    state.workflow_status = WorkflowStatus::Initial;
    state.workflow_result = None;
    state.inputs.clear();
    state.logs.clear();
    for task in &mut state.tasks {
        task.reset();
    }
    for agent in &mut state.agents {
        agent.status = AgentStatus::Initial;
    }
}

fn clear_all(state: &mut TeamState) {
    info!(team = %state.name, "clear_all: removing tasks and agents");
    reset(state);
    state.tasks.clear();
    state.agents.clear();
}
