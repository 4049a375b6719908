//! Static per-model price table and cost derivation
//!
//! Unknown models never fail a stats computation; they price as the
//! `CostBreakdown::unknown()` sentinel (every field -1).

use std::collections::BTreeMap;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::usage::{LlmUsageStats, TokenUsage};

/// Embedded price table
const BUILTIN_PRICING: &str = include_str!("pricing.yml");

const TOKENS_PER_MILLION: f64 = 1_000_000.0;

/// Sentinel value for "cost unknown"
pub const UNKNOWN_COST: f64 = -1.0;

/// Price of one model in USD per million tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    #[serde(default)]
    pub provider: String,

    #[serde(rename = "input-price-per-million-tokens")]
    pub input_price_per_million_tokens: f64,

    #[serde(rename = "output-price-per-million-tokens")]
    pub output_price_per_million_tokens: f64,
}

/// Cost of some usage, in USD
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

impl CostBreakdown {
    pub fn zero() -> Self {
        Self {
            input_cost: 0.0,
            output_cost: 0.0,
            total_cost: 0.0,
        }
    }

    pub fn unknown() -> Self {
        Self {
            input_cost: UNKNOWN_COST,
            output_cost: UNKNOWN_COST,
            total_cost: UNKNOWN_COST,
        }
    }

    pub fn is_known(&self) -> bool {
        self.total_cost >= 0.0
    }
}

impl std::fmt::Display for CostBreakdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_known() {
            write!(
                f,
                "${:.6} (input ${:.6}, output ${:.6})",
                self.total_cost, self.input_cost, self.output_cost
            )
        } else {
            write!(f, "unknown")
        }
    }
}

#[derive(Debug, Deserialize)]
struct PricingFile {
    #[serde(default)]
    version: String,
    models: BTreeMap<String, ModelPrice>,
}

/// Model id -> price lookup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    version: String,
    models: BTreeMap<String, ModelPrice>,
}

impl PriceTable {
    /// An empty table (every model prices as unknown)
    pub fn empty() -> Self {
        Self::default()
    }

    /// The embedded price table
    pub fn builtin() -> Result<Self> {
        debug!("PriceTable::builtin: called");
        Self::from_yaml(BUILTIN_PRICING).context("Failed to parse built-in price table")
    }

    /// Parse a price table document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: PricingFile = serde_yaml::from_str(content).context("Invalid price table")?;
        for (model, price) in &file.models {
            if price.input_price_per_million_tokens < 0.0 || price.output_price_per_million_tokens < 0.0 {
                return Err(eyre::eyre!("Negative price for model {}", model));
            }
        }
        Ok(Self {
            version: file.version,
            models: file.models,
        })
    }

    /// Add or replace entries
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, ModelPrice>) -> Self {
        for (model, price) in overrides {
            debug!(%model, "PriceTable::with_overrides: overriding price");
            self.models.insert(model.clone(), price.clone());
        }
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn get(&self, model: &str) -> Option<&ModelPrice> {
        self.models.get(model)
    }

    pub fn models(&self) -> impl Iterator<Item = (&String, &ModelPrice)> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Price the given token usage for one model
    pub fn cost(&self, model: &str, usage: TokenUsage) -> CostBreakdown {
        let Some(price) = self.models.get(model) else {
            warn!(%model, "PriceTable::cost: no pricing for model");
            return CostBreakdown::unknown();
        };
        let input_cost = usage.input_tokens as f64 / TOKENS_PER_MILLION * price.input_price_per_million_tokens;
        let output_cost = usage.output_tokens as f64 / TOKENS_PER_MILLION * price.output_price_per_million_tokens;
        CostBreakdown {
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
        }
    }

    /// Sum per-model costs; any unknown model makes the whole result unknown
    pub fn workflow_cost(&self, model_usage: &BTreeMap<String, LlmUsageStats>) -> CostBreakdown {
        debug!(models = model_usage.len(), "PriceTable::workflow_cost: called");
        let mut total = CostBreakdown::zero();
        for (model, usage) in model_usage {
            let cost = self.cost(model, usage.tokens());
            if !cost.is_known() {
                return CostBreakdown::unknown();
            }
            total.input_cost += cost.input_cost;
            total.output_cost += cost.output_cost;
            total.total_cost += cost.total_cost;
        }
        total
    }
}
