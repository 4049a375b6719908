//! Task transitions
//!
//! Each named operation checks the transition table, mutates the task, and
//! appends exactly one TaskStatusUpdate entry carrying a fresh stats snapshot
//! and cost. Workflow consequences are returned as effects.

use serde_json::Value;
use tracing::{debug, error, info};

use crate::domain::{AgentStatus, Feedback, TaskStatus, WorkflowStatus};
use crate::events::{LogEntry, TaskLogDetail, TaskLogMetadata, TaskStatsSnapshot};
use crate::state::TeamState;
use crate::stats::compute_task_stats;

use super::error::LifecycleError;
use super::report::ErrorReport;
use super::workflow::WorkflowEvent;
use super::{Effect, ReduceContext};

/// Something that happens to a task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// Picked up for execution (TODO or REVISE -> DOING)
    Started,
    /// The agent produced a result
    Completed { result: Value },
    /// The agent call failed
    Errored { error: String },
    /// The agent reported it cannot proceed
    Blocked { reason: String },
    Aborted { reason: String },
    Paused,
    Resumed,
    FeedbackProvided { content: String, user_id: Option<String> },
    Validated,
}

impl TaskEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed { .. } => "completed",
            Self::Errored { .. } => "errored",
            Self::Blocked { .. } => "blocked",
            Self::Aborted { .. } => "aborted",
            Self::Paused => "paused",
            Self::Resumed => "resumed",
            Self::FeedbackProvided { .. } => "feedback",
            Self::Validated => "validated",
        }
    }
}

/// Apply one task event in place
pub(crate) fn apply_task(
    state: &mut TeamState,
    task_id: &str,
    event: TaskEvent,
    ctx: &ReduceContext<'_>,
) -> Result<Vec<Effect>, LifecycleError> {
    debug!(%task_id, event = event.name(), "apply_task: called");
    let index = state
        .task_index(task_id)
        .ok_or_else(|| LifecycleError::TaskNotFound(task_id.to_string()))?;
    state.tasks[index]
        .validate_structure()
        .map_err(LifecycleError::Malformed)?;

    match event {
        TaskEvent::Started => start(state, index, ctx),
        TaskEvent::Completed { result } => complete(state, index, result, ctx),
        TaskEvent::Errored { error } => fail(state, index, &error, false, ctx),
        TaskEvent::Blocked { reason } => fail(state, index, &reason, true, ctx),
        TaskEvent::Aborted { reason } => abort(state, index, &reason, ctx),
        TaskEvent::Paused => pause(state, index, ctx),
        TaskEvent::Resumed => resume(state, index, ctx),
        TaskEvent::FeedbackProvided { content, user_id } => feedback(state, index, content, user_id, ctx),
        TaskEvent::Validated => validate(state, index, ctx),
    }
}

fn ensure(state: &TeamState, index: usize, to: TaskStatus) -> Result<(), LifecycleError> {
    let task = &state.tasks[index];
    if task.status.can_transition_to(to) {
        Ok(())
    } else {
        Err(LifecycleError::IllegalTaskTransition {
            task_id: task.id.clone(),
            from: task.status,
            to,
        })
    }
}

fn set_agent_status(state: &mut TeamState, index: usize, status: AgentStatus) {
    let agent_id = state.tasks[index].agent_id.clone();
    if let Some(agent) = state.agent_mut(&agent_id) {
        agent.status = status;
    }
}

/// Append the single TaskStatusUpdate for a transition
fn log_task(
    state: &mut TeamState,
    index: usize,
    status: TaskStatus,
    detail: TaskLogDetail,
    with_stats: bool,
    description: String,
    ctx: &ReduceContext<'_>,
) {
    let task = &state.tasks[index];
    let agent = state.agent(&task.agent_id);
    let stats = with_stats.then(|| {
        let stats = compute_task_stats(&task.id, &state.logs, ctx.now);
        let model = agent.map(|a| a.llm.model.as_str()).unwrap_or_default();
        TaskStatsSnapshot {
            stats,
            cost: ctx.pricing.cost(model, stats.llm_usage.tokens()),
        }
    });
    let entry = LogEntry::task_update(
        ctx.now,
        task,
        agent,
        status,
        TaskLogMetadata { stats, detail },
        description,
    );
    state.logs.push(entry);
}

fn start(state: &mut TeamState, index: usize, ctx: &ReduceContext<'_>) -> Result<Vec<Effect>, LifecycleError> {
    ensure(state, index, TaskStatus::Doing)?;
    let task = &mut state.tasks[index];
    task.status = TaskStatus::Doing;
    let description = format!("Task started: {}", task.display_name());
    debug!(task_id = %task.id, "start: task moved to DOING");
    log_task(state, index, TaskStatus::Doing, TaskLogDetail::StatusChanged, false, description, ctx);
    Ok(Vec::new())
}

fn complete(
    state: &mut TeamState,
    index: usize,
    result: Value,
    ctx: &ReduceContext<'_>,
) -> Result<Vec<Effect>, LifecycleError> {
    let needs_validation =
        state.tasks[index].external_validation_required && state.tasks[index].status != TaskStatus::Validated;

    if needs_validation {
        ensure(state, index, TaskStatus::AwaitingValidation)?;
        let task = &mut state.tasks[index];
        task.status = TaskStatus::AwaitingValidation;
        task.result = Some(result.clone());
        task.process_feedback();
        let report = ErrorReport::awaiting_validation(task);
        let task_id = task.id.clone();
        let description = format!("Task awaiting validation: {}", task.display_name());
        info!(%task_id, "complete: task awaiting validation");
        log_task(
            state,
            index,
            TaskStatus::AwaitingValidation,
            TaskLogDetail::Completed { result },
            true,
            description,
            ctx,
        );
        return Ok(vec![Effect::Workflow(WorkflowEvent::Block { task_id, report })]);
    }

    ensure(state, index, TaskStatus::Done)?;
    let task = &mut state.tasks[index];
    task.status = TaskStatus::Done;
    task.result = Some(result.clone());
    task.error = None;
    task.process_feedback();
    let description = format!("Task completed: {}", task.display_name());
    info!(task_id = %task.id, "complete: task done");
    set_agent_status(state, index, AgentStatus::TaskCompleted);
    log_task(
        state,
        index,
        TaskStatus::Done,
        TaskLogDetail::Completed { result },
        true,
        description,
        ctx,
    );

    if state.all_done() {
        Ok(vec![Effect::Workflow(WorkflowEvent::Finish)])
    } else {
        Ok(vec![Effect::Workflow(WorkflowEvent::AdvancePlan)])
    }
}

/// Shared bookkeeping of `error` and `blocked`
fn fail(
    state: &mut TeamState,
    index: usize,
    message: &str,
    always_block: bool,
    ctx: &ReduceContext<'_>,
) -> Result<Vec<Effect>, LifecycleError> {
    ensure(state, index, TaskStatus::Blocked)?;
    let task = &mut state.tasks[index];
    task.status = TaskStatus::Blocked;
    task.error = Some(message.to_string());
    task.process_feedback();
    let report = if always_block {
        ErrorReport::task_blocked(task, message)
    } else {
        ErrorReport::task_error(task, message)
    };
    let task_id = task.id.clone();
    let escalate_as_block = always_block || task.external_validation_required;
    let description = format!("Task blocked: {}", task.display_name());
    error!(%task_id, %report, "task blocked");
    log_task(
        state,
        index,
        TaskStatus::Blocked,
        TaskLogDetail::Failed { report: report.clone() },
        true,
        description,
        ctx,
    );

    let event = if escalate_as_block {
        WorkflowEvent::Block { task_id, report }
    } else {
        WorkflowEvent::Error { task_id, report }
    };
    Ok(vec![Effect::Workflow(event)])
}

fn abort(
    state: &mut TeamState,
    index: usize,
    reason: &str,
    ctx: &ReduceContext<'_>,
) -> Result<Vec<Effect>, LifecycleError> {
    ensure(state, index, TaskStatus::Aborted)?;
    let task = &mut state.tasks[index];
    task.status = TaskStatus::Aborted;
    let description = format!("Task aborted: {} ({})", task.display_name(), reason);
    info!(task_id = %task.id, %reason, "abort: task aborted");
    set_agent_status(state, index, AgentStatus::TaskAborted);
    log_task(state, index, TaskStatus::Aborted, TaskLogDetail::StatusChanged, true, description, ctx);
    Ok(Vec::new())
}

fn pause(state: &mut TeamState, index: usize, ctx: &ReduceContext<'_>) -> Result<Vec<Effect>, LifecycleError> {
    ensure(state, index, TaskStatus::Paused)?;
    let task = &mut state.tasks[index];
    task.status = TaskStatus::Paused;
    let description = format!("Task paused: {}", task.display_name());
    set_agent_status(state, index, AgentStatus::Paused);
    log_task(state, index, TaskStatus::Paused, TaskLogDetail::StatusChanged, true, description, ctx);
    Ok(Vec::new())
}

/// PAUSED -> RESUMED -> DOING, logged once as RESUMED
///
/// No DOING entry is written, so the stats window opened by the original
/// DOING entry stays in place.
fn resume(state: &mut TeamState, index: usize, ctx: &ReduceContext<'_>) -> Result<Vec<Effect>, LifecycleError> {
    ensure(state, index, TaskStatus::Resumed)?;
    let task = &mut state.tasks[index];
    task.status = TaskStatus::Doing;
    let description = format!("Task resumed: {}", task.display_name());
    set_agent_status(state, index, AgentStatus::Resumed);
    log_task(state, index, TaskStatus::Resumed, TaskLogDetail::StatusChanged, true, description, ctx);
    Ok(Vec::new())
}

fn feedback(
    state: &mut TeamState,
    index: usize,
    content: String,
    user_id: Option<String>,
    ctx: &ReduceContext<'_>,
) -> Result<Vec<Effect>, LifecycleError> {
    if matches!(state.workflow_status, WorkflowStatus::Finished | WorkflowStatus::Stopped) {
        return Err(LifecycleError::WorkflowClosed(state.workflow_status));
    }
    ensure(state, index, TaskStatus::Revise)?;
    let feedback = Feedback::new(content, user_id, ctx.now);
    let task = &mut state.tasks[index];
    task.feedback_history.push(feedback.clone());
    task.status = TaskStatus::Revise;
    let description = format!("Feedback received for task: {}", task.display_name());
    info!(task_id = %task.id, feedback_id = %feedback.id, "feedback: task set to REVISE");
    log_task(
        state,
        index,
        TaskStatus::Revise,
        TaskLogDetail::FeedbackReceived { feedback },
        true,
        description,
        ctx,
    );
    Ok(vec![Effect::Workflow(WorkflowEvent::Reopen)])
}

/// Gate in front of completion: AWAITING_VALIDATION -> VALIDATED -> DONE
fn validate(state: &mut TeamState, index: usize, ctx: &ReduceContext<'_>) -> Result<Vec<Effect>, LifecycleError> {
    ensure(state, index, TaskStatus::Validated)?;
    let task = &mut state.tasks[index];
    task.status = TaskStatus::Validated;
    let task_id = task.id.clone();
    let result = task.result.clone().unwrap_or(Value::Null);
    let description = format!("Task validated: {}", task.display_name());
    info!(%task_id, "validate: task validated");
    log_task(state, index, TaskStatus::Validated, TaskLogDetail::Validated, true, description, ctx);
    Ok(vec![
        Effect::Workflow(WorkflowEvent::Reopen),
        Effect::Task {
            task_id,
            event: TaskEvent::Completed { result },
        },
    ])
}
