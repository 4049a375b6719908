//! WorkflowController - runs agents for tasks as the state moves
//!
//! The controller observes the store. Every task that enters DOING (and
//! every task waiting in REVISE) is submitted to the execution lane in the
//! order the log recorded it. When a run finishes its outcome is applied
//! back through the task lifecycle, unless the run went stale in the
//! meantime (reset, abort, new feedback), in which case it is discarded.
//! Outcomes that arrive while their task is PAUSED are parked and applied
//! on resume.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::agent::{Agent, AgentRegistry, TaskOutcome};
use crate::context::{Inputs, derive_context, interpolate};
use crate::domain::{Feedback, Task, TaskStatus, WorkflowStatus, now_ms};
use crate::lifecycle::{LifecycleError, ReduceContext, TaskEvent, WorkflowEvent, dispatch_task, dispatch_workflow};
use crate::scheduler::{QueueConfig, QueueState, RunKey, ScheduleResult, TaskQueue};
use crate::state::{TeamState, TeamStore};
use crate::stats::PriceTable;

use super::reporter::AgentReporter;
use super::watchdog::{Watchdog, WatchdogConfig};

/// Agent result, or the error text of a failed or panicked run
type RunResult = Result<TaskOutcome, String>;

/// Log position already scanned for DOING entries
#[derive(Debug, Default)]
struct Cursor {
    epoch: u64,
    position: usize,
}

enum Parked {
    /// The run finished while the task was paused
    Outcome(RunResult),
    /// The task was paused before its run started
    NotStarted,
}

struct ParkedRun {
    epoch: u64,
    parked: Parked,
}

/// Everything one agent run needs, captured from a single snapshot
struct Run {
    task: Task,
    inputs: Inputs,
    context: String,
    feedback: Vec<Feedback>,
    agent: Arc<dyn Agent>,
    reporter: AgentReporter,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Illegal transitions are the caller's mistake; anything else is structural
fn log_refusal(e: &LifecycleError, task_id: Option<&str>, event: &str) {
    if e.is_illegal_transition() {
        warn!(task_id = task_id.unwrap_or("-"), event, error = %e, "Transition refused");
    } else {
        error!(task_id = task_id.unwrap_or("-"), event, error = %e, "Transition failed");
    }
}

fn outcome_event(outcome: &RunResult) -> TaskEvent {
    match outcome {
        Ok(TaskOutcome::Completed { result }) => TaskEvent::Completed { result: result.clone() },
        Ok(TaskOutcome::Blocked { reason }) => TaskEvent::Blocked { reason: reason.clone() },
        Err(error) => TaskEvent::Errored { error: error.clone() },
    }
}

pub struct WorkflowController {
    store: Arc<TeamStore>,
    agents: RwLock<AgentRegistry>,
    queue: TaskQueue<RunKey>,
    pricing: Arc<PriceTable>,
    cursor: Mutex<Cursor>,
    parked: Mutex<HashMap<String, ParkedRun>>,
}

impl WorkflowController {
    pub fn new(
        store: Arc<TeamStore>,
        agents: AgentRegistry,
        queue_config: QueueConfig,
        pricing: Arc<PriceTable>,
    ) -> Arc<Self> {
        debug!(agents = agents.len(), ?queue_config, "WorkflowController::new: called");
        Arc::new(Self {
            store,
            agents: RwLock::new(agents),
            queue: TaskQueue::new(queue_config),
            pricing,
            cursor: Mutex::new(Cursor::default()),
            parked: Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &Arc<TeamStore> {
        &self.store
    }

    pub fn pricing(&self) -> &PriceTable {
        &self.pricing
    }

    /// Make an agent available to tasks that name `id`
    pub fn register_agent(&self, id: impl Into<String>, agent: Arc<dyn Agent>) {
        self.agents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(id, agent);
    }

    pub async fn queue_state(&self) -> QueueState<RunKey> {
        self.queue.state().await
    }

    /// Apply a workflow event through the store
    ///
    /// A refused event leaves the state unchanged.
    pub fn dispatch(&self, event: WorkflowEvent) -> Result<Arc<TeamState>, LifecycleError> {
        let pricing = self.pricing.clone();
        let name = event.name();
        self.store
            .update(|s| dispatch_workflow(s, event, &ReduceContext::new(&pricing, now_ms())))
            .inspect_err(|e| log_refusal(e, None, name))
    }

    /// Apply a task event through the store
    ///
    /// A refused event leaves the state unchanged.
    pub fn dispatch_task(&self, task_id: &str, event: TaskEvent) -> Result<Arc<TeamState>, LifecycleError> {
        let pricing = self.pricing.clone();
        let name = event.name();
        self.store
            .update(|s| dispatch_task(s, task_id, event, &ReduceContext::new(&pricing, now_ms())))
            .inspect_err(|e| log_refusal(e, Some(task_id), name))
    }

    /// Submit every task that became runnable since the last call
    ///
    /// DOING entries are taken from the log in append order, which is what
    /// makes the lane FIFO. Waiting REVISE tasks are picked up from the
    /// current state.
    pub async fn sync(self: &Arc<Self>) {
        let candidates = {
            let state = self.store.get();
            let mut cursor = lock(&self.cursor);
            if cursor.epoch != state.epoch || cursor.position > state.logs.len() {
                debug!(epoch = state.epoch, "WorkflowController::sync: new run, rewinding cursor");
                *cursor = Cursor {
                    epoch: state.epoch,
                    position: 0,
                };
            }

            let epoch = state.epoch;
            let mut candidates: Vec<RunKey> = state.logs[cursor.position..]
                .iter()
                .filter(|entry| entry.task_status() == Some(TaskStatus::Doing))
                .filter_map(|entry| entry.task_id().map(|id| RunKey::new(epoch, id)))
                .collect();
            cursor.position = state.logs.len();

            if state.workflow_status == WorkflowStatus::Running {
                candidates.extend(
                    state
                        .tasks_with_status(TaskStatus::Revise)
                        .map(|t| RunKey::new(epoch, t.id.clone())),
                );
            }
            candidates
        };

        for key in candidates {
            self.submit(key).await;
        }
    }

    async fn submit(self: &Arc<Self>, key: RunKey) {
        match self.queue.submit(key.clone()).await {
            ScheduleResult::Ready => self.spawn_execute(key),
            ScheduleResult::Queued { position } => {
                debug!(%key, position, "WorkflowController::submit: waiting for the lane");
            }
            ScheduleResult::Rejected { reason } => {
                debug!(%key, %reason, "WorkflowController::submit: not submitted");
            }
        }
    }

    fn spawn_execute(self: &Arc<Self>, key: RunKey) {
        let this = self.clone();
        tokio::spawn(async move {
            this.execute(key).await;
        });
    }

    /// Run one task and release its slot
    ///
    /// A run from an earlier epoch still holds its slot until the agent
    /// returns, so the lane never has more agents working than its limit.
    async fn execute(self: Arc<Self>, key: RunKey) {
        debug!(%key, "WorkflowController::execute: called");
        if let Some(run) = self.prepare(&key) {
            let outcome = Self::invoke(run).await;
            self.settle(&key.task_id, key.epoch, outcome);
        }

        let promoted = self.queue.complete(&key).await;
        for next in promoted {
            self.spawn_execute(next);
        }
        self.sync().await;
    }

    /// Decide whether the run for `key` starts now, and capture what it needs
    fn prepare(&self, key: &RunKey) -> Option<Run> {
        let task_id = key.task_id.as_str();
        let status = {
            let mut parked = lock(&self.parked);
            let state = self.store.get();
            if state.epoch != key.epoch {
                debug!(%key, epoch = state.epoch, "WorkflowController::prepare: run is from an earlier epoch");
                return None;
            }
            let task = state.task(task_id)?;
            if task.status == TaskStatus::Paused {
                debug!(%task_id, "WorkflowController::prepare: paused before start, parking");
                parked.insert(
                    task_id.to_string(),
                    ParkedRun {
                        epoch: state.epoch,
                        parked: Parked::NotStarted,
                    },
                );
                return None;
            }
            task.status
        };

        match status {
            TaskStatus::Doing => {}
            TaskStatus::Revise => {
                let pricing = self.pricing.clone();
                let started = self.store.modify(|s| {
                    let runnable = s.epoch == key.epoch
                        && s.workflow_status == WorkflowStatus::Running
                        && s.task(task_id).map(|t| t.status) == Some(TaskStatus::Revise);
                    if !runnable {
                        return Ok(None);
                    }
                    dispatch_task(s, task_id, TaskEvent::Started, &ReduceContext::new(&pricing, now_ms())).map(Some)
                });
                match started {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        debug!(%task_id, "WorkflowController::prepare: workflow not running, deferring");
                        return None;
                    }
                    Err(e) => {
                        error!(%task_id, error = %e, "Failed to restart task");
                        return None;
                    }
                }
            }
            other => {
                debug!(%task_id, status = %other, "WorkflowController::prepare: nothing to run");
                return None;
            }
        }

        let state = self.store.get();
        if state.epoch != key.epoch {
            return None;
        }
        let task = state.task(task_id)?;
        let agent = self
            .agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&task.agent_id);
        let Some(agent) = agent else {
            let message = format!("No agent registered with id {}", task.agent_id);
            self.settle(task_id, state.epoch, Err(message));
            return None;
        };

        let context = derive_context(&state.logs, &state.plan_order(), task_id);
        let mut prompt_task = task.clone();
        prompt_task.description = interpolate(&task.description, &state.inputs, &state.tasks);
        let reporter = AgentReporter::new(self.store.clone(), task.agent_id.clone(), task_id, state.epoch);

        Some(Run {
            feedback: task.pending_feedback(),
            task: prompt_task,
            inputs: state.inputs.clone(),
            context,
            agent,
            reporter,
        })
    }

    /// Call the agent on its own tokio task so a panic becomes an error
    async fn invoke(run: Run) -> RunResult {
        let Run {
            task,
            inputs,
            context,
            feedback,
            agent,
            reporter,
        } = run;
        let task_id = task.id.clone();
        info!(%task_id, agent_id = %reporter.agent_id(), revision = !feedback.is_empty(), "Running task");

        let handle = tokio::spawn(async move {
            if feedback.is_empty() {
                agent.work_on_task(&task, &inputs, &context, &reporter).await
            } else {
                agent.work_on_feedback(&task, &feedback, &context, &reporter).await
            }
        });

        match handle.await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => {
                warn!(%task_id, error = %e, "Agent run failed");
                Err(format!("{:#}", e))
            }
            Err(e) => {
                error!(%task_id, error = %e, "Agent run panicked");
                Err(format!("Agent run panicked: {}", e))
            }
        }
    }

    /// Route a finished run back into the lifecycle
    fn settle(&self, task_id: &str, epoch: u64, outcome: RunResult) {
        let mut parked = lock(&self.parked);
        let mut park = false;
        let event = outcome_event(&outcome);
        let pricing = self.pricing.clone();

        let applied = self.store.modify(|s| {
            if s.epoch != epoch {
                return Ok(None);
            }
            match s.task(task_id).map(|t| t.status) {
                Some(TaskStatus::Doing) => {
                    dispatch_task(s, task_id, event, &ReduceContext::new(&pricing, now_ms())).map(Some)
                }
                Some(TaskStatus::Paused) => {
                    park = true;
                    Ok(None)
                }
                _ => Ok(None),
            }
        });

        match applied {
            Ok(Some(state)) => {
                debug!(%task_id, status = %state.workflow_status, "WorkflowController::settle: outcome applied");
            }
            Ok(None) if park => {
                debug!(%task_id, "WorkflowController::settle: task paused, parking outcome");
                parked.insert(
                    task_id.to_string(),
                    ParkedRun {
                        epoch,
                        parked: Parked::Outcome(outcome),
                    },
                );
            }
            Ok(None) => {
                debug!(%task_id, epoch, "WorkflowController::settle: stale outcome, discarding");
            }
            Err(e) => {
                error!(%task_id, error = %e, "Failed to apply task outcome");
            }
        }
    }

    /// Resume the workflow and replay what was parked while paused
    pub async fn resume(self: &Arc<Self>) -> Result<(), LifecycleError> {
        let (epoch, parked) = {
            let mut parked = lock(&self.parked);
            let state = self.dispatch(WorkflowEvent::Resume)?;
            let runs: Vec<(String, ParkedRun)> = parked.drain().collect();
            (state.epoch, runs)
        };

        for (task_id, run) in parked {
            if run.epoch != epoch {
                continue;
            }
            match run.parked {
                Parked::Outcome(outcome) => self.settle(&task_id, epoch, outcome),
                Parked::NotStarted => self.submit(RunKey::new(epoch, task_id)).await,
            }
        }
        self.sync().await;
        Ok(())
    }

    /// Stop the workflow; running agents finish but their outcomes are dropped
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        {
            let mut parked = lock(&self.parked);
            self.dispatch(WorkflowEvent::Stop)?;
            parked.clear();
        }
        self.queue.clear_waiting().await;
        Ok(())
    }

    /// Return to INITIAL, or to an empty team with `clear_all`
    pub async fn reset(&self, clear_all: bool) -> Result<(), LifecycleError> {
        {
            let mut parked = lock(&self.parked);
            let event = if clear_all {
                WorkflowEvent::ClearAll
            } else {
                WorkflowEvent::Reset
            };
            self.dispatch(event)?;
            parked.clear();
        }
        self.queue.clear_waiting().await;
        Ok(())
    }

    /// Start the background tasks that drive this controller
    pub fn spawn(self: &Arc<Self>, watchdog: WatchdogConfig) -> ControllerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let this = self.clone();
        let mut versions = self.store.subscribe();
        let mut shutdown = shutdown_rx.clone();
        let observer = tokio::spawn(async move {
            debug!("WorkflowController observer started");
            loop {
                tokio::select! {
                    changed = versions.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        this.sync().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("WorkflowController observer stopped");
        });

        let watchdog = tokio::spawn(Watchdog::new(watchdog, self.store.clone()).run(shutdown_rx));

        ControllerHandle {
            shutdown: shutdown_tx,
            tasks: vec![observer, watchdog],
        }
    }
}

/// Owns the controller's background tasks
pub struct ControllerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ControllerHandle {
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }

    /// Signal shutdown and wait for the background tasks to exit
    pub async fn shutdown(self) {
        debug!("ControllerHandle::shutdown: called");
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Controller task ended abnormally");
            }
        }
    }
}
