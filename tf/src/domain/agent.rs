//! Agent record kept in team state
//!
//! The record is the bookkeeping side of an agent (identity, model, current
//! status). The behaviour lives behind the `Agent` trait.

use serde::{Deserialize, Serialize};

use super::status::AgentStatus;

/// Model settings used for cost lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmSettings {
    pub provider: String,
    pub model: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    pub status: AgentStatus,
    #[serde(default)]
    pub llm: LlmSettings,
}

impl AgentRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: String::new(),
            status: AgentStatus::Initial,
            llm: LlmSettings::default(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_model(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.llm = LlmSettings {
            provider: provider.into(),
            model: model.into(),
        };
        self
    }

    /// Immutable copy for the event log
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
            model: self.llm.model.clone(),
        }
    }
}

/// Agent as captured in a log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    /// Model at the time of the event; usage is bucketed by this
    pub model: String,
}
