//! Team - the public face of a workflow run
//!
//! A `Team` owns the store, the controller and its background tasks. All
//! mutations go through the controller, which funnels them into the store's
//! single update entry point.

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentRegistry};
use crate::context::Inputs;
use crate::controller::{ControllerHandle, WatchdogConfig, WorkflowController};
use crate::domain::{AgentRecord, Task, TaskStatus, WorkflowStatus, now_ms};
use crate::events::{DEFAULT_CHANNEL_CAPACITY, LogEntry};
use crate::lifecycle::{LifecycleError, TaskEvent, WorkflowEvent};
use crate::scheduler::QueueConfig;
use crate::state::{TeamState, TeamStore, WorkflowResult};
use crate::stats::{PriceTable, TaskStats, WorkflowStats, compute_task_stats, compute_workflow_stats};

#[derive(Debug, Error)]
pub enum TeamError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Workflow is already {0}")]
    AlreadyRunning(WorkflowStatus),

    #[error("Task {task_id} is assigned to unknown agent {agent_id}")]
    UnknownAgent { task_id: String, agent_id: String },

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Team has been shut down")]
    ControllerUnavailable,
}

/// What `wait_until_settled` reports
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowOutcome {
    pub status: WorkflowStatus,
    pub result: Option<WorkflowResult>,
    pub stats: WorkflowStats,
}

pub struct TeamBuilder {
    name: String,
    agents: Vec<(AgentRecord, Arc<dyn Agent>)>,
    tasks: Vec<Task>,
    queue: QueueConfig,
    watchdog: WatchdogConfig,
    channel_capacity: usize,
    pricing: Option<PriceTable>,
}

impl TeamBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
            tasks: Vec::new(),
            queue: QueueConfig::default(),
            watchdog: WatchdogConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            pricing: None,
        }
    }

    pub fn agent(mut self, record: AgentRecord, agent: Arc<dyn Agent>) -> Self {
        self.agents.push((record, agent));
        self
    }

    /// Tasks run in the order they are added
    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn queue_config(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn watchdog_config(mut self, watchdog: WatchdogConfig) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Price table for cost figures; defaults to the built-in table
    pub fn pricing(mut self, pricing: PriceTable) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Assemble the team and start its controller
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<Team, TeamError> {
        debug!(team = %self.name, agents = self.agents.len(), tasks = self.tasks.len(), "TeamBuilder::build: called");
        let mut state = TeamState::new(self.name);
        let mut registry = AgentRegistry::new();
        for (record, agent) in self.agents {
            if state.agent(&record.id).is_some() {
                return Err(TeamError::DuplicateId(record.id));
            }
            registry.register(record.id.clone(), agent);
            state.agents.push(record);
        }
        for task in self.tasks {
            check_task(&state, &task)?;
            state.tasks.push(task);
        }

        let pricing = match self.pricing {
            Some(pricing) => pricing,
            None => PriceTable::builtin().unwrap_or_else(|e| {
                warn!(error = %e, "Built-in price table unavailable, costs will be unknown");
                PriceTable::empty()
            }),
        };

        let store = Arc::new(TeamStore::new(state, self.channel_capacity));
        let controller = WorkflowController::new(store, registry, self.queue, Arc::new(pricing));
        let handle = controller.spawn(self.watchdog);
        Ok(Team {
            controller,
            handle: Mutex::new(Some(handle)),
        })
    }
}

fn check_task(state: &TeamState, task: &Task) -> Result<(), TeamError> {
    if state.task(&task.id).is_some() {
        return Err(TeamError::DuplicateId(task.id.clone()));
    }
    task.validate_structure().map_err(LifecycleError::Malformed)?;
    if state.agent(&task.agent_id).is_none() {
        return Err(TeamError::UnknownAgent {
            task_id: task.id.clone(),
            agent_id: task.agent_id.clone(),
        });
    }
    Ok(())
}

pub struct Team {
    controller: Arc<WorkflowController>,
    handle: Mutex<Option<ControllerHandle>>,
}

impl Team {
    pub fn builder(name: impl Into<String>) -> TeamBuilder {
        TeamBuilder::new(name)
    }

    fn ensure_available(&self) -> Result<(), TeamError> {
        match &*self.handle.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(_) => Ok(()),
            None => Err(TeamError::ControllerUnavailable),
        }
    }

    /// Start a run with `inputs`
    ///
    /// A team whose previous run has settled is reset first.
    pub async fn start(&self, inputs: Inputs) -> Result<(), TeamError> {
        debug!(inputs = inputs.len(), "Team::start: called");
        self.ensure_available()?;
        let status = self.state().workflow_status;
        match status {
            WorkflowStatus::Initial => {}
            WorkflowStatus::Running | WorkflowStatus::Paused | WorkflowStatus::Stopping => {
                return Err(TeamError::AlreadyRunning(status));
            }
            _ => {
                info!(%status, "Resetting settled workflow before start");
                self.controller.reset(false).await?;
            }
        }
        self.controller.dispatch(WorkflowEvent::Start { inputs })?;
        info!(team = %self.state().name, "Workflow started");
        Ok(())
    }

    /// Wait until the run is FINISHED, ERRORED, BLOCKED or STOPPED
    ///
    /// Returns at once for a team that was never started.
    pub async fn wait_until_settled(&self) -> WorkflowOutcome {
        let mut versions = self.controller.store().subscribe();
        loop {
            let state = self.state();
            let waiting = !state.workflow_status.is_settled() && state.workflow_status != WorkflowStatus::Initial;
            if !waiting || versions.changed().await.is_err() {
                let stats = compute_workflow_stats(&state.logs, self.controller.pricing(), now_ms());
                return WorkflowOutcome {
                    status: state.workflow_status,
                    result: state.workflow_result.clone(),
                    stats,
                };
            }
        }
    }

    pub async fn pause(&self) -> Result<(), TeamError> {
        self.ensure_available()?;
        self.controller.dispatch(WorkflowEvent::Pause)?;
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), TeamError> {
        self.ensure_available()?;
        self.controller.resume().await?;
        Ok(())
    }

    /// Abort in-flight tasks and stop the run
    pub async fn stop(&self) -> Result<(), TeamError> {
        self.controller.stop().await?;
        Ok(())
    }

    /// Send a task back for revision
    pub fn provide_feedback(&self, task_id: &str, content: impl Into<String>) -> Result<(), TeamError> {
        let content = content.into();
        debug!(%task_id, "Team::provide_feedback: called");
        self.ensure_available()?;
        self.controller.dispatch_task(
            task_id,
            TaskEvent::FeedbackProvided {
                content,
                user_id: None,
            },
        )?;
        Ok(())
    }

    /// Approve a task waiting for validation
    pub fn validate_task(&self, task_id: &str) -> Result<(), TeamError> {
        debug!(%task_id, "Team::validate_task: called");
        self.ensure_available()?;
        self.controller.dispatch_task(task_id, TaskEvent::Validated)?;
        Ok(())
    }

    pub fn get_task_stats(&self, task_id: &str) -> Result<TaskStats, TeamError> {
        let state = self.state();
        if state.task(task_id).is_none() {
            return Err(LifecycleError::TaskNotFound(task_id.to_string()).into());
        }
        Ok(compute_task_stats(task_id, &state.logs, now_ms()))
    }

    pub fn get_workflow_stats(&self) -> WorkflowStats {
        compute_workflow_stats(&self.state().logs, self.controller.pricing(), now_ms())
    }

    /// Back to INITIAL with the same tasks and agents
    pub async fn reset_workflow_state(&self) -> Result<(), TeamError> {
        self.controller.reset(false).await?;
        Ok(())
    }

    /// Back to INITIAL with no tasks and no agents
    pub async fn clear_all(&self) -> Result<(), TeamError> {
        self.controller.reset(true).await?;
        Ok(())
    }

    /// Add an agent; only while the workflow is INITIAL
    pub fn add_agent(&self, record: AgentRecord, agent: Arc<dyn Agent>) -> Result<(), TeamError> {
        debug!(agent_id = %record.id, "Team::add_agent: called");
        let id = record.id.clone();
        self.compose(|state| {
            if state.agent(&record.id).is_some() {
                return Err(TeamError::DuplicateId(record.id.clone()));
            }
            state.agents.push(record);
            Ok(())
        })?;
        self.controller.register_agent(id, agent);
        Ok(())
    }

    /// Append a task to the plan; only while the workflow is INITIAL
    pub fn add_task(&self, task: Task) -> Result<(), TeamError> {
        debug!(task_id = %task.id, "Team::add_task: called");
        self.compose(|state| {
            check_task(state, &task)?;
            state.tasks.push(task);
            Ok(())
        })
    }

    fn compose<F>(&self, f: F) -> Result<(), TeamError>
    where
        F: FnOnce(&mut TeamState) -> Result<(), TeamError>,
    {
        let mut refused = None;
        self.controller.store().modify(|current| {
            if current.workflow_status != WorkflowStatus::Initial {
                refused = Some(TeamError::AlreadyRunning(current.workflow_status));
                return Ok(None);
            }
            let mut next = current.clone();
            match f(&mut next) {
                Ok(()) => Ok(Some(next)),
                Err(e) => {
                    refused = Some(e);
                    Ok(None)
                }
            }
        })?;
        match refused {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Live stream of new log entries
    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogEntry> {
        self.controller.store().subscribe_logs()
    }

    pub fn state(&self) -> Arc<TeamState> {
        self.controller.store().get()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.state().logs.clone()
    }

    /// Tasks currently in `status`, in plan order
    pub fn tasks_with_status(&self, status: TaskStatus) -> Vec<Task> {
        self.state().tasks_with_status(status).cloned().collect()
    }

    pub fn pricing(&self) -> &PriceTable {
        self.controller.pricing()
    }

    /// Stop the controller's background tasks
    ///
    /// The state stays readable; operations that need the controller fail
    /// with `ControllerUnavailable`.
    pub async fn shutdown(&self) {
        let handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }
}
