//! teamflow configuration types and loading

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::controller::WatchdogConfig;
use crate::events::DEFAULT_CHANNEL_CAPACITY;
use crate::scheduler::QueueConfig;
use crate::stats::{ModelPrice, PriceTable};

/// Main teamflow configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level when `--log-level` is not given
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Execution lane
    pub queue: QueueConfig,

    /// Stall detection
    pub watchdog: WatchdogConfig,

    /// Model prices
    pub pricing: PricingConfig,

    /// Live log stream
    pub events: EventsConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .teamflow.yml
        let local_config = PathBuf::from(".teamflow.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/teamflow/teamflow.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("teamflow").join("teamflow.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Effective price table: built-in (unless disabled) plus overrides
    pub fn price_table(&self) -> Result<PriceTable> {
        let base = if self.pricing.use_builtin {
            PriceTable::builtin()?
        } else {
            PriceTable::empty()
        };
        Ok(base.with_overrides(&self.pricing.models))
    }
}

/// Price table configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Start from the embedded price table
    #[serde(rename = "use-builtin")]
    pub use_builtin: bool,

    /// Model id -> price, added to or replacing built-in entries
    pub models: BTreeMap<String, ModelPrice>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            use_builtin: true,
            models: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Entries buffered for slow log subscribers
    #[serde(rename = "channel-capacity")]
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}
