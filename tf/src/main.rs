//! tf - teamflow command line
//!
//! Runs team plans and inspects recorded event logs.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, eyre};
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use teamflow::cli::{Cli, Command, OutputFormat};
use teamflow::config::Config;
use teamflow::events::{LogEntry, LogKind, read_log_file, recorded_plan, spawn_log_sink};
use teamflow::stats::ModelPrice;
use teamflow::{
    Agent, EchoAgent, IdResolver, Inputs, PriceTable, TaskStats, TaskStatus, TeamPlan, WorkflowResult,
    WorkflowStats, WorkflowStatus, compute_task_stats, compute_workflow_stats, derive_context,
};

fn setup_logging(level: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("teamflow")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let level = tracing::Level::from_str(level).map_err(|_| eyre!("Invalid log level: {}", level))?;
    let log_file = fs::File::create(log_dir.join("teamflow.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config comes first so its log level can apply
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    let level = cli
        .log_level
        .clone()
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    setup_logging(&level).context("Failed to setup logging")?;

    match cli.command {
        Command::Run {
            plan,
            inputs,
            events,
            auto_validate,
            follow,
            format,
        } => cmd_run(&config, &plan, inputs, events, auto_validate, follow, format).await,
        Command::Stats { events, task, format } => cmd_stats(&config, &events, task.as_deref(), format),
        Command::Context { events, task } => cmd_context(&events, &task),
        Command::Pricing { format } => cmd_pricing(&config, format),
        Command::Cost { model, input, output } => cmd_cost(&config, &model, input, output),
    }
}

async fn cmd_run(
    config: &Config,
    plan_path: &Path,
    cli_inputs: Vec<(String, String)>,
    events: Option<PathBuf>,
    auto_validate: bool,
    follow: bool,
    format: OutputFormat,
) -> Result<()> {
    let plan = TeamPlan::load(plan_path)?;
    let mut inputs: Inputs = plan.inputs.clone();
    inputs.extend(cli_inputs);
    info!(team = %plan.name, tasks = plan.tasks.len(), "Running plan {}", plan_path.display());

    let team = plan
        .into_builder(|_| Arc::new(EchoAgent) as Arc<dyn Agent>)
        .queue_config(config.queue.clone())
        .watchdog_config(config.watchdog.clone())
        .channel_capacity(config.events.channel_capacity)
        .pricing(config.price_table()?)
        .build()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sink = match &events {
        Some(path) => Some(spawn_log_sink(path, team.subscribe_logs(), shutdown_rx.clone())?),
        None => None,
    };
    let follower = follow.then(|| tokio::spawn(follow_logs(team.subscribe_logs(), shutdown_rx.clone())));

    team.start(inputs).await?;
    let outcome = loop {
        let outcome = team.wait_until_settled().await;
        if outcome.status != WorkflowStatus::Blocked || !auto_validate {
            break outcome;
        }
        let awaiting = team.tasks_with_status(TaskStatus::AwaitingValidation);
        if awaiting.is_empty() {
            break outcome;
        }
        for task in awaiting {
            info!(task_id = %task.id, "Auto-validating task");
            if follow {
                println!("{} {}", "validate".cyan(), task.display_name());
            }
            team.validate_task(&task.id)?;
        }
    };

    team.shutdown().await;
    let _ = shutdown_tx.send(true);
    if let Some(follower) = follower {
        let _ = follower.await;
    }
    if let Some(sink) = sink {
        match sink.await {
            Ok(written) => info!(written, "Event log written"),
            Err(e) => warn!(error = %e, "Log sink ended abnormally"),
        }
    }

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "status": outcome.status,
                "result": outcome.result,
                "stats": outcome.stats,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("{} {}", "Workflow".bold(), status_label(outcome.status));
            match &outcome.result {
                Some(WorkflowResult::Completed { result: Some(result) }) => {
                    println!("{}\n{}", "Result:".bold(), teamflow::domain::result_text(result));
                }
                Some(WorkflowResult::Failed { report }) => println!("{} {}", "Error:".red().bold(), report),
                _ => {}
            }
            print_workflow_stats(&outcome.stats);
            if let Some(path) = &events {
                println!("Event log: {}", path.display());
            }
        }
    }

    if outcome.status == WorkflowStatus::Finished {
        Ok(())
    } else {
        Err(eyre!("Workflow ended {}", outcome.status))
    }
}

async fn follow_logs(mut rx: broadcast::Receiver<LogEntry>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(entry) => println!("{}", format_entry(&entry)),
                Err(broadcast::error::RecvError::Lagged(n)) => warn!(missed = n, "Follower lagged"),
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown.changed() => {
                while let Ok(entry) = rx.try_recv() {
                    println!("{}", format_entry(&entry));
                }
                break;
            }
        }
    }
}

fn format_entry(entry: &LogEntry) -> String {
    match &entry.kind {
        LogKind::TaskStatusUpdate { task, task_status, .. } => {
            format!("{} {} {}", format!("{:<10}", "task").blue(), task_status.to_string().bold(), task.display_name())
        }
        LogKind::AgentStatusUpdate { agent, agent_status, .. } => {
            format!("{} {} {}", format!("{:<10}", "agent").magenta(), agent_status, agent.name.dimmed())
        }
        LogKind::WorkflowStatusUpdate { workflow_status, .. } => {
            format!("{} {}", format!("{:<10}", "workflow").yellow(), status_label(*workflow_status))
        }
    }
}

fn status_label(status: WorkflowStatus) -> String {
    let label = status.to_string();
    match status {
        WorkflowStatus::Finished => label.green().bold().to_string(),
        WorkflowStatus::Errored | WorkflowStatus::Blocked => label.red().bold().to_string(),
        WorkflowStatus::Stopped => label.yellow().bold().to_string(),
        _ => label.bold().to_string(),
    }
}

/// Replayed stats end at the last recorded entry, not at the wall clock
fn replay_end(logs: &[LogEntry]) -> i64 {
    logs.last().map(|e| e.timestamp).unwrap_or(0)
}

fn load_events(path: &Path) -> Result<Vec<LogEntry>> {
    let logs = read_log_file(path)?;
    if logs.is_empty() {
        return Err(eyre!("Event log {} is empty", path.display()));
    }
    Ok(logs)
}

/// Resolve a partial task reference against the tasks named in `logs`
fn resolve_task(logs: &[LogEntry], reference: &str) -> Result<String> {
    let ids: HashMap<String, String> = logs
        .iter()
        .filter_map(|e| e.task())
        .map(|t| (t.id.clone(), t.display_name().to_string()))
        .collect();
    match IdResolver::new(&ids).resolve(reference) {
        Ok(Some(id)) => Ok(id),
        Ok(None) => Err(eyre!("No task matches '{}'", reference)),
        Err(candidates) => Err(eyre!(
            "'{}' is ambiguous, candidates: {}",
            reference,
            candidates.join(", ")
        )),
    }
}

fn cmd_stats(config: &Config, events: &Path, task: Option<&str>, format: OutputFormat) -> Result<()> {
    let logs = load_events(events)?;
    let pricing = config.price_table()?;
    let end = replay_end(&logs);

    let Some(reference) = task else {
        let stats = compute_workflow_stats(&logs, &pricing, end);
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
            OutputFormat::Text => print_workflow_stats(&stats),
        }
        return Ok(());
    };

    let task_id = resolve_task(&logs, reference)?;
    let stats = compute_task_stats(&task_id, &logs, end);
    let model = logs
        .iter()
        .rev()
        .filter(|e| e.task_id() == Some(task_id.as_str()))
        .find_map(|e| e.agent())
        .map(|a| a.model.clone());
    let cost = match &model {
        Some(model) => pricing.cost(model, stats.llm_usage.tokens()),
        None => teamflow::CostBreakdown::unknown(),
    };

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "task_id": task_id,
                "model": model,
                "stats": stats,
                "cost": cost,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("{} {}", "Task".bold(), task_id);
            if let Some(model) = &model {
                println!("  Model:       {}", model);
            }
            print_task_stats(&stats);
            println!("  Cost:        {}", cost);
        }
    }
    Ok(())
}

fn print_task_stats(stats: &TaskStats) {
    println!("  Duration:    {:.3}s", stats.duration);
    println!("  Iterations:  {}", stats.iteration_count);
    println!(
        "  Tokens:      {} in / {} out",
        stats.llm_usage.input_tokens, stats.llm_usage.output_tokens
    );
    println!(
        "  Calls:       {} ({} failed, {} parsing errors)",
        stats.llm_usage.calls_count, stats.llm_usage.calls_error_count, stats.llm_usage.parsing_errors
    );
}

fn print_workflow_stats(stats: &WorkflowStats) {
    println!("{}", "Stats".bold());
    println!("  Tasks:       {}", stats.task_count);
    println!("  Agents:      {}", stats.agent_count);
    println!("  Duration:    {:.3}s", stats.duration);
    println!("  Iterations:  {}", stats.iteration_count);
    println!(
        "  Tokens:      {} in / {} out",
        stats.llm_usage.input_tokens, stats.llm_usage.output_tokens
    );
    println!(
        "  Calls:       {} ({} failed, {} parsing errors)",
        stats.llm_usage.calls_count, stats.llm_usage.calls_error_count, stats.llm_usage.parsing_errors
    );
    for (model, usage) in &stats.model_usage {
        println!(
            "    {:<24} {} in / {} out, {} calls",
            model, usage.input_tokens, usage.output_tokens, usage.calls_count
        );
    }
    println!("  Cost:        {}", stats.cost);
}

fn cmd_context(events: &Path, task: &str) -> Result<()> {
    let logs = load_events(events)?;
    let plan = recorded_plan(&logs).ok_or_else(|| eyre!("Event log does not record a plan"))?;
    let task_id = resolve_task(&logs, task)?;
    let context = derive_context(&logs, &plan, &task_id);
    if context.is_empty() {
        println!("{}", "(no context)".dimmed());
    } else {
        print!("{}", context);
    }
    Ok(())
}

fn cmd_pricing(config: &Config, format: OutputFormat) -> Result<()> {
    let pricing = config.price_table()?;
    match format {
        OutputFormat::Json => {
            let models: BTreeMap<&String, &ModelPrice> = pricing.models().collect();
            let report = serde_json::json!({ "version": pricing.version(), "models": models });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => print_pricing(&pricing),
    }
    Ok(())
}

fn print_pricing(pricing: &PriceTable) {
    if !pricing.version().is_empty() {
        println!("{} {}", "Price table".bold(), pricing.version());
    }
    println!(
        "{:<28} {:<10} {:>12} {:>12}",
        "MODEL", "PROVIDER", "INPUT/1M", "OUTPUT/1M"
    );
    for (model, price) in pricing.models() {
        println!(
            "{:<28} {:<10} {:>12.4} {:>12.4}",
            model, price.provider, price.input_price_per_million_tokens, price.output_price_per_million_tokens
        );
    }
}

fn cmd_cost(config: &Config, model: &str, input: u64, output: u64) -> Result<()> {
    let pricing = config.price_table()?;
    let cost = pricing.cost(model, teamflow::TokenUsage::new(input, output));
    if !cost.is_known() {
        return Err(eyre!("No pricing for model {}", model));
    }
    println!("{}", cost);
    Ok(())
}
