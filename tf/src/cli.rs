//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// teamflow - run agent teams through a task plan
#[derive(Parser)]
#[command(
    name = "tf",
    about = "Run agent teams through a task plan and inspect their event logs",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/teamflow/logs/teamflow.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, help = "Log level (overrides config)")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run a team plan with the dry-run echo agent
    Run {
        /// Plan file (YAML)
        plan: PathBuf,

        /// Run input, repeatable
        #[arg(short, long = "input", value_name = "KEY=VALUE", value_parser = parse_input)]
        inputs: Vec<(String, String)>,

        /// Write the event log to this JSONL file
        #[arg(short, long)]
        events: Option<PathBuf>,

        /// Approve tasks waiting for validation instead of stopping
        #[arg(long)]
        auto_validate: bool,

        /// Print log entries as they happen
        #[arg(short, long)]
        follow: bool,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show workflow or task stats from an event log
    Stats {
        /// Event log (JSONL)
        events: PathBuf,

        /// Task id (prefix or slug fragment)
        #[arg(short, long)]
        task: Option<String>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the context a task receives from earlier tasks
    Context {
        /// Event log (JSONL)
        events: PathBuf,

        /// Task id (prefix or slug fragment)
        #[arg(short, long)]
        task: String,
    },

    /// List the effective price table
    Pricing {
        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Price a token usage sample
    Cost {
        /// Model id
        #[arg(short, long)]
        model: String,

        /// Input tokens
        #[arg(long)]
        input: u64,

        /// Output tokens
        #[arg(long)]
        output: u64,
    },
}

/// Output format for stats and pricing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

/// Parse a `key=value` run input
pub fn parse_input(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected KEY=VALUE, got: {}", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Empty input name in: {}", s));
    }
    Ok((key.to_string(), value.to_string()))
}
