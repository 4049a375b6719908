//! Team plan files
//!
//! A plan names the agents and the ordered task list of one team, plus
//! default inputs. Example:
//!
//! ```yaml
//! name: article-crew
//! agents:
//!   - id: writer
//!     name: Wendy
//!     model: gpt-4o-mini
//! tasks:
//!   - id: outline
//!     description: Outline an article about {topic}
//!     agent: writer
//! inputs:
//!   topic: Rust
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::Agent;
use crate::context::Inputs;
use crate::domain::{AgentRecord, LlmSettings, Task, generate_id};
use crate::team::TeamBuilder;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamPlan {
    pub name: String,

    #[serde(default)]
    pub agents: Vec<AgentSpec>,

    /// Plan order
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,

    /// Inputs used unless overridden on the command line
    #[serde(default)]
    pub inputs: Inputs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub role: String,

    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,
}

fn default_provider() -> String {
    LlmSettings::default().provider
}

fn default_model() -> String {
    LlmSettings::default().model
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Generated from the title (or description) when absent
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub title: String,

    pub description: String,

    #[serde(default, rename = "expected-output")]
    pub expected_output: String,

    /// Owning agent id
    pub agent: String,

    #[serde(default)]
    pub deliverable: bool,

    #[serde(default, rename = "external-validation")]
    pub external_validation: bool,
}

impl AgentSpec {
    pub fn record(&self) -> AgentRecord {
        AgentRecord::new(&self.id, &self.name)
            .with_role(&self.role)
            .with_model(&self.provider, &self.model)
    }
}

impl TaskSpec {
    pub fn task(&self) -> Task {
        let id = self.id.clone().unwrap_or_else(|| {
            let title = if self.title.is_empty() { &self.description } else { &self.title };
            generate_id("task", title)
        });
        let mut task = Task::new(&self.agent, &self.description)
            .with_id(id)
            .with_title(&self.title)
            .with_expected_output(&self.expected_output);
        if self.deliverable {
            task = task.deliverable();
        }
        if self.external_validation {
            task = task.requiring_validation();
        }
        task
    }
}

impl TeamPlan {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(?path, "TeamPlan::load: called");
        let content = fs::read_to_string(path).context(format!("Failed to read plan {}", path.display()))?;
        Self::parse(&content).context(format!("Failed to parse plan {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let plan: Self = serde_yaml::from_str(content)?;
        if plan.tasks.is_empty() {
            tracing::warn!(team = %plan.name, "Plan has no tasks");
        }
        Ok(plan)
    }

    /// Builder for this plan; `make_agent` supplies the behaviour for each agent
    pub fn into_builder<F>(self, make_agent: F) -> TeamBuilder
    where
        F: Fn(&AgentSpec) -> Arc<dyn Agent>,
    {
        let mut builder = TeamBuilder::new(&self.name);
        for spec in &self.agents {
            builder = builder.agent(spec.record(), make_agent(spec));
        }
        for spec in &self.tasks {
            builder = builder.task(spec.task());
        }
        builder
    }
}
