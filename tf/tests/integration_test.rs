//! Integration tests for teamflow
//!
//! These drive a full `Team` (store, controller, queue) with scripted agents.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use common::{ScriptedAgent, Step, eventually, settled, started, task, team_builder};
use teamflow::events::{TaskLogDetail, WorkflowLogMetadata, read_log_file, recorded_plan, write_log_file};
use teamflow::{
    FeedbackStatus, Inputs, LifecycleError, LogKind, TaskStatus, TeamError, WorkflowResult, WorkflowStatus,
    compute_task_stats, derive_context,
};

fn inputs(pairs: &[(&str, &str)]) -> Inputs {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn doing_order(logs: &[teamflow::LogEntry]) -> Vec<String> {
    logs.iter()
        .filter(|e| e.task_status() == Some(TaskStatus::Doing))
        .filter_map(|e| e.task_id().map(str::to_string))
        .collect()
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn test_two_task_scenario() {
    let agent = ScriptedAgent::new();
    agent.script("t1", Step::complete("42", 100, 50));
    let team = team_builder(&agent, vec![task("t1", "Compute the answer"), task("t2", "Explain it")])
        .build()
        .unwrap();

    team.start(Inputs::new()).await.unwrap();
    let outcome = settled(&team).await;
    assert_eq!(outcome.status, WorkflowStatus::Finished);

    let state = team.state();
    assert_eq!(state.task("t1").unwrap().status, TaskStatus::Done);
    assert_eq!(state.task("t2").unwrap().status, TaskStatus::Done);

    // Cost recorded on the DONE entry of t1
    let done = state
        .logs
        .iter()
        .find(|e| e.is_task_status("t1", TaskStatus::Done))
        .unwrap();
    let LogKind::TaskStatusUpdate { metadata, .. } = &done.kind else {
        panic!("expected a task entry");
    };
    let cost = metadata.stats.as_ref().unwrap().cost;
    assert!((cost.total_cost - 0.000045).abs() < 1e-12);

    // t2 saw t1's result as its context
    let t2_calls = agent.calls_for("t2");
    assert_eq!(t2_calls.len(), 1);
    assert_eq!(t2_calls[0].context, "Task: Compute the answer\nResult: 42\n");
    assert_eq!(
        derive_context(&state.logs, &state.plan_order(), "t2"),
        "Task: Compute the answer\nResult: 42\n"
    );

    // Deliverable defaults to the last task
    assert_eq!(
        outcome.result,
        Some(WorkflowResult::Completed {
            result: Some(serde_json::json!("done: Explain it"))
        })
    );
}

#[tokio::test]
async fn test_single_lane_runs_in_plan_order() {
    let agent = ScriptedAgent::new();
    let team = team_builder(
        &agent,
        vec![task("t1", "one"), task("t2", "two"), task("t3", "three")],
    )
    .build()
    .unwrap();

    team.start(Inputs::new()).await.unwrap();
    assert_eq!(settled(&team).await.status, WorkflowStatus::Finished);

    let logs = team.logs();
    assert_eq!(doing_order(&logs), vec!["t1", "t2", "t3"]);

    // Execution windows never overlap: each task is DONE before the next starts
    let position = |id: &str, status: TaskStatus| logs.iter().position(|e| e.is_task_status(id, status)).unwrap();
    assert!(position("t1", TaskStatus::Done) < position("t2", TaskStatus::Doing));
    assert!(position("t2", TaskStatus::Done) < position("t3", TaskStatus::Doing));

    // Exactly one finish
    let finished = logs
        .iter()
        .filter(|e| e.workflow_status() == Some(WorkflowStatus::Finished))
        .count();
    assert_eq!(finished, 1);
}

#[tokio::test]
async fn test_inputs_and_task_results_are_interpolated() {
    let agent = ScriptedAgent::new();
    agent.script("t1", Step::complete("an outline", 1, 1));
    let team = team_builder(
        &agent,
        vec![
            task("t1", "Outline {topic}"),
            task("t2", "Expand {taskResult:t1} for {audience}"),
        ],
    )
    .build()
    .unwrap();

    team.start(inputs(&[("topic", "Rust"), ("audience", "beginners")]))
        .await
        .unwrap();
    settled(&team).await;

    assert_eq!(agent.calls_for("t1")[0].description, "Outline Rust");
    assert_eq!(agent.calls_for("t2")[0].description, "Expand an outline for beginners");
}

#[tokio::test]
async fn test_stats_for_task_and_workflow() {
    let agent = ScriptedAgent::new();
    agent.script("t1", Step::complete("ok", 100, 50));
    agent.script("t2", Step::complete("ok", 1_000, 500));
    let team = team_builder(&agent, vec![task("t1", "one"), task("t2", "two")])
        .build()
        .unwrap();
    team.start(Inputs::new()).await.unwrap();
    settled(&team).await;

    let t1 = team.get_task_stats("t1").unwrap();
    assert_eq!(t1.llm_usage.input_tokens, 100);
    assert_eq!(t1.llm_usage.output_tokens, 50);
    assert_eq!(t1.llm_usage.calls_count, 1);
    assert_eq!(t1.iteration_count, 1);

    let workflow = team.get_workflow_stats();
    assert_eq!(workflow.llm_usage.input_tokens, 1_100);
    assert_eq!(workflow.task_count, 2);
    assert!(workflow.model_usage.contains_key("gpt-4o-mini"));
    assert!(workflow.cost.is_known());
    let expected = 1_100.0 / 1e6 * 0.15 + 550.0 / 1e6 * 0.6;
    assert!((workflow.cost.total_cost - expected).abs() < 1e-12);
}

// =============================================================================
// Feedback and validation
// =============================================================================

#[tokio::test]
async fn test_feedback_round_trip() {
    let agent = ScriptedAgent::new();
    let t2_started = Arc::new(Notify::new());
    let t2_release = Arc::new(Notify::new());
    agent.script("t1", Step::complete("draft", 10, 5));
    agent.script("t1", Step::complete("final", 10, 5));
    agent.script(
        "t2",
        Step::Gated {
            started: t2_started.clone(),
            release: t2_release.clone(),
            result: "review".to_string(),
        },
    );
    let team = team_builder(&agent, vec![task("t1", "Write"), task("t2", "Review")])
        .build()
        .unwrap();

    team.start(Inputs::new()).await.unwrap();
    started(&t2_started).await;

    team.provide_feedback("t1", "Add more detail").unwrap();
    let t1 = team.state().task("t1").unwrap().clone();
    assert_eq!(t1.status, TaskStatus::Revise);
    assert_eq!(t1.feedback_history.len(), 1);
    assert_eq!(t1.feedback_history[0].status, FeedbackStatus::Pending);

    t2_release.notify_one();
    let outcome = settled(&team).await;
    assert_eq!(outcome.status, WorkflowStatus::Finished);

    let state = team.state();
    let t1 = state.task("t1").unwrap();
    assert_eq!(t1.status, TaskStatus::Done);
    assert_eq!(t1.result, Some(serde_json::json!("final")));
    assert_eq!(t1.feedback_history.len(), 1);
    assert_eq!(t1.feedback_history[0].status, FeedbackStatus::Processed);

    let revision = &agent.calls_for("t1")[1];
    assert_eq!(revision.feedback, vec!["Add more detail".to_string()]);
    assert_eq!(doing_order(&state.logs), vec!["t1", "t2", "t1"]);
}

#[tokio::test]
async fn test_second_feedback_leaves_processed_entry_alone() {
    let agent = ScriptedAgent::new();
    agent.script("t1", Step::complete("v1", 10, 5));
    agent.script("t1", Step::complete("v2", 10, 5));
    agent.script("t1", Step::complete("v3", 10, 5));
    let team = team_builder(&agent, vec![task("t1", "Draft").requiring_validation()])
        .build()
        .unwrap();

    team.start(Inputs::new()).await.unwrap();
    assert_eq!(settled(&team).await.status, WorkflowStatus::Blocked);

    team.provide_feedback("t1", "first").unwrap();
    assert_eq!(settled(&team).await.status, WorkflowStatus::Blocked);
    let processed = team.state().task("t1").unwrap().feedback_history[0].clone();
    assert_eq!(processed.status, FeedbackStatus::Processed);

    team.provide_feedback("t1", "second").unwrap();
    assert_eq!(settled(&team).await.status, WorkflowStatus::Blocked);

    let t1 = team.state().task("t1").unwrap().clone();
    assert_eq!(t1.result, Some(serde_json::json!("v3")));
    assert_eq!(t1.feedback_history.len(), 2);
    assert_eq!(t1.feedback_history[0], processed);
    assert_eq!(t1.feedback_history[1].content, "second");
    assert_eq!(t1.feedback_history[1].status, FeedbackStatus::Processed);

    // Each revision sees only the feedback still pending at that point
    let calls = agent.calls_for("t1");
    assert_eq!(calls[1].feedback, vec!["first".to_string()]);
    assert_eq!(calls[2].feedback, vec!["second".to_string()]);

    team.validate_task("t1").unwrap();
    assert_eq!(settled(&team).await.status, WorkflowStatus::Finished);
}

#[tokio::test]
async fn test_feedback_after_finish_is_rejected() {
    let agent = ScriptedAgent::new();
    let team = team_builder(&agent, vec![task("t1", "one")]).build().unwrap();
    team.start(Inputs::new()).await.unwrap();
    settled(&team).await;

    let err = team.provide_feedback("t1", "too late").unwrap_err();
    assert!(matches!(
        err,
        TeamError::Lifecycle(LifecycleError::WorkflowClosed(WorkflowStatus::Finished))
    ));
    assert_eq!(team.state().task("t1").unwrap().feedback_history.len(), 0);
}

#[tokio::test]
async fn test_validation_gate() {
    let agent = ScriptedAgent::new();
    agent.script("t1", Step::complete("needs a look", 10, 5));
    let team = team_builder(
        &agent,
        vec![task("t1", "Draft").requiring_validation(), task("t2", "Publish")],
    )
    .build()
    .unwrap();

    team.start(Inputs::new()).await.unwrap();
    let outcome = settled(&team).await;
    assert_eq!(outcome.status, WorkflowStatus::Blocked);
    let t1 = team.state().task("t1").unwrap().clone();
    assert_eq!(t1.status, TaskStatus::AwaitingValidation);
    assert_eq!(t1.result, Some(serde_json::json!("needs a look")));
    assert_eq!(team.state().task("t2").unwrap().status, TaskStatus::Todo);

    team.validate_task("t1").unwrap();
    assert_eq!(settled(&team).await.status, WorkflowStatus::Finished);

    let logs = team.logs();
    let validated = logs
        .iter()
        .position(|e| e.is_task_status("t1", TaskStatus::Validated))
        .unwrap();
    let done = logs.iter().position(|e| e.is_task_status("t1", TaskStatus::Done)).unwrap();
    assert!(validated < done);
    // The agent ran once; validation does not re-run the task
    assert_eq!(agent.calls_for("t1").len(), 1);
}

#[tokio::test]
async fn test_validate_requires_awaiting_validation() {
    let agent = ScriptedAgent::new();
    let team = team_builder(&agent, vec![task("t1", "one")]).build().unwrap();
    let err = team.validate_task("t1").unwrap_err();
    assert!(matches!(
        err,
        TeamError::Lifecycle(LifecycleError::IllegalTaskTransition { .. })
    ));
    team.shutdown().await;
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_agent_error_errors_workflow() {
    let agent = ScriptedAgent::new();
    agent.script("t1", Step::Fail("rate limited".to_string()));
    let team = team_builder(&agent, vec![task("t1", "one"), task("t2", "two")])
        .build()
        .unwrap();

    team.start(Inputs::new()).await.unwrap();
    let outcome = settled(&team).await;
    assert_eq!(outcome.status, WorkflowStatus::Errored);

    let state = team.state();
    let t1 = state.task("t1").unwrap();
    assert_eq!(t1.status, TaskStatus::Blocked);
    assert!(t1.error.as_deref().unwrap().contains("rate limited"));
    assert_eq!(state.task("t2").unwrap().status, TaskStatus::Todo);

    let Some(WorkflowResult::Failed { report }) = outcome.result else {
        panic!("expected a failure report");
    };
    assert!(report.to_string().contains("Recommended action"));

    // The diagnostic is in the log too
    let errored = state
        .logs
        .iter()
        .find_map(|e| match &e.kind {
            LogKind::WorkflowStatusUpdate {
                metadata: WorkflowLogMetadata::Errored { task_id, .. },
                ..
            } => Some(task_id.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(errored, "t1");
    assert!(state.logs.iter().any(|e| matches!(
        &e.kind,
        LogKind::TaskStatusUpdate { metadata, .. } if matches!(metadata.detail, TaskLogDetail::Failed { .. })
    )));
}

#[tokio::test]
async fn test_error_on_validation_task_blocks_workflow() {
    let agent = ScriptedAgent::new();
    agent.script("t1", Step::Fail("bad output".to_string()));
    let team = team_builder(&agent, vec![task("t1", "one").requiring_validation()])
        .build()
        .unwrap();

    team.start(Inputs::new()).await.unwrap();
    assert_eq!(settled(&team).await.status, WorkflowStatus::Blocked);
    assert_eq!(team.state().task("t1").unwrap().status, TaskStatus::Blocked);
}

#[tokio::test]
async fn test_blocked_task_recovers_through_feedback() {
    let agent = ScriptedAgent::new();
    agent.script("t1", Step::Block("Which audience?".to_string()));
    agent.script("t1", Step::complete("for beginners", 10, 5));
    let team = team_builder(&agent, vec![task("t1", "Write")]).build().unwrap();

    team.start(Inputs::new()).await.unwrap();
    assert_eq!(settled(&team).await.status, WorkflowStatus::Blocked);

    team.provide_feedback("t1", "Beginners").unwrap();
    let outcome = settled(&team).await;
    assert_eq!(outcome.status, WorkflowStatus::Finished);

    let t1 = team.state().task("t1").unwrap().clone();
    assert_eq!(t1.status, TaskStatus::Done);
    assert_eq!(t1.feedback_history[0].status, FeedbackStatus::Processed);
    assert_eq!(agent.calls_for("t1")[1].feedback, vec!["Beginners".to_string()]);
}

// =============================================================================
// Pause, stop, reset
// =============================================================================

#[tokio::test]
async fn test_pause_holds_outcome_until_resume() {
    let agent = ScriptedAgent::new();
    let t1_started = Arc::new(Notify::new());
    let t1_release = Arc::new(Notify::new());
    agent.script(
        "t1",
        Step::Gated {
            started: t1_started.clone(),
            release: t1_release.clone(),
            result: "slow".to_string(),
        },
    );
    let team = team_builder(&agent, vec![task("t1", "one"), task("t2", "two")])
        .build()
        .unwrap();

    team.start(Inputs::new()).await.unwrap();
    started(&t1_started).await;

    team.pause().await.unwrap();
    assert_eq!(team.state().workflow_status, WorkflowStatus::Paused);
    assert_eq!(team.state().task("t1").unwrap().status, TaskStatus::Paused);

    // The agent finishes while paused; nothing moves
    t1_release.notify_one();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(team.state().task("t1").unwrap().status, TaskStatus::Paused);
    assert_eq!(team.state().task("t2").unwrap().status, TaskStatus::Todo);

    team.resume().await.unwrap();
    assert_eq!(settled(&team).await.status, WorkflowStatus::Finished);

    // Resumed, not re-run
    assert_eq!(agent.calls_for("t1").len(), 1);
    let logs = team.logs();
    assert_eq!(doing_order(&logs), vec!["t1", "t2"]);
    assert!(logs.iter().any(|e| e.is_task_status("t1", TaskStatus::Resumed)));
}

#[tokio::test]
async fn test_stop_aborts_running_task() {
    let agent = ScriptedAgent::new();
    let t1_started = Arc::new(Notify::new());
    let t1_release = Arc::new(Notify::new());
    agent.script(
        "t1",
        Step::Gated {
            started: t1_started.clone(),
            release: t1_release.clone(),
            result: "never applied".to_string(),
        },
    );
    let team = team_builder(&agent, vec![task("t1", "one"), task("t2", "two")])
        .build()
        .unwrap();

    team.start(Inputs::new()).await.unwrap();
    started(&t1_started).await;
    team.stop().await.unwrap();

    let outcome = settled(&team).await;
    assert_eq!(outcome.status, WorkflowStatus::Stopped);
    assert_eq!(team.state().task("t1").unwrap().status, TaskStatus::Aborted);

    // A late outcome is discarded
    t1_release.notify_one();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let state = team.state();
    assert_eq!(state.task("t1").unwrap().status, TaskStatus::Aborted);
    assert!(state.task("t1").unwrap().result.is_none());
    assert_eq!(state.task("t2").unwrap().status, TaskStatus::Todo);
}

#[tokio::test]
async fn test_reset_and_restart() {
    let agent = ScriptedAgent::new();
    let team = team_builder(&agent, vec![task("t1", "one"), task("t2", "two")])
        .build()
        .unwrap();
    team.start(Inputs::new()).await.unwrap();
    settled(&team).await;

    team.reset_workflow_state().await.unwrap();
    let state = team.state();
    assert_eq!(state.workflow_status, WorkflowStatus::Initial);
    assert!(state.logs.is_empty());
    assert!(state.workflow_result.is_none());
    assert!(state.tasks.iter().all(|t| t.status == TaskStatus::Todo && t.result.is_none()));

    // Starting a settled team resets on its own
    team.start(Inputs::new()).await.unwrap();
    assert_eq!(settled(&team).await.status, WorkflowStatus::Finished);
    team.start(Inputs::new()).await.unwrap();
    assert_eq!(settled(&team).await.status, WorkflowStatus::Finished);
    assert_eq!(doing_order(&team.logs()), vec!["t1", "t2"]);

    team.clear_all().await.unwrap();
    let state = team.state();
    assert!(state.tasks.is_empty());
    assert!(state.agents.is_empty());
    team.shutdown().await;
}

#[tokio::test]
async fn test_reset_discards_in_flight_outcome() {
    let agent = ScriptedAgent::new();
    let t1_started = Arc::new(Notify::new());
    let t1_release = Arc::new(Notify::new());
    agent.script(
        "t1",
        Step::Gated {
            started: t1_started.clone(),
            release: t1_release.clone(),
            result: "stale".to_string(),
        },
    );
    let team = team_builder(&agent, vec![task("t1", "one")]).build().unwrap();

    team.start(Inputs::new()).await.unwrap();
    started(&t1_started).await;
    team.reset_workflow_state().await.unwrap();

    t1_release.notify_one();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let state = team.state();
    assert_eq!(state.workflow_status, WorkflowStatus::Initial);
    assert!(state.logs.is_empty());
    assert_eq!(state.task("t1").unwrap().status, TaskStatus::Todo);
}

#[tokio::test]
async fn test_restart_after_stop_with_agent_still_running() {
    let agent = ScriptedAgent::new();
    let t1_started = Arc::new(Notify::new());
    let t1_release = Arc::new(Notify::new());
    agent.script(
        "t1",
        Step::Gated {
            started: t1_started.clone(),
            release: t1_release.clone(),
            result: "from the stopped run".to_string(),
        },
    );
    let team = team_builder(&agent, vec![task("t1", "one"), task("t2", "two")])
        .build()
        .unwrap();

    team.start(Inputs::new()).await.unwrap();
    started(&t1_started).await;
    team.stop().await.unwrap();
    assert_eq!(settled(&team).await.status, WorkflowStatus::Stopped);

    // The stopped run still holds the lane when the new run starts
    team.start(Inputs::new()).await.unwrap();
    t1_release.notify_one();

    let outcome = settled(&team).await;
    assert_eq!(outcome.status, WorkflowStatus::Finished);
    let state = team.state();
    assert_eq!(state.task("t1").unwrap().result, Some(serde_json::json!("done: one")));
    assert_eq!(agent.calls_for("t1").len(), 2);
    assert_eq!(doing_order(&state.logs), vec!["t1", "t2"]);
}

#[tokio::test]
async fn test_restart_after_reset_with_agent_still_running() {
    let agent = ScriptedAgent::new();
    let t1_started = Arc::new(Notify::new());
    let t1_release = Arc::new(Notify::new());
    agent.script(
        "t1",
        Step::Gated {
            started: t1_started.clone(),
            release: t1_release.clone(),
            result: "from the old run".to_string(),
        },
    );
    let team = team_builder(&agent, vec![task("t1", "one")]).build().unwrap();

    team.start(Inputs::new()).await.unwrap();
    started(&t1_started).await;
    team.reset_workflow_state().await.unwrap();
    team.start(Inputs::new()).await.unwrap();
    t1_release.notify_one();

    assert_eq!(settled(&team).await.status, WorkflowStatus::Finished);
    let state = team.state();
    assert_eq!(state.task("t1").unwrap().result, Some(serde_json::json!("done: one")));
    assert_eq!(agent.calls_for("t1").len(), 2);
    let done = state
        .logs
        .iter()
        .filter(|e| e.is_task_status("t1", TaskStatus::Done))
        .count();
    assert_eq!(done, 1);
}

// =============================================================================
// Whole-run stats
// =============================================================================

fn finished_stats(logs: &[teamflow::LogEntry]) -> teamflow::WorkflowStats {
    logs.iter()
        .find_map(|e| match &e.kind {
            LogKind::WorkflowStatusUpdate {
                metadata: WorkflowLogMetadata::Finished { stats, .. },
                ..
            } => Some(stats.clone()),
            _ => None,
        })
        .unwrap()
}

#[tokio::test]
async fn test_run_stats_survive_pause_and_resume() {
    let agent = ScriptedAgent::new();
    let t2_started = Arc::new(Notify::new());
    let t2_release = Arc::new(Notify::new());
    agent.script("t1", Step::complete("ok", 100, 50));
    agent.script(
        "t2",
        Step::Gated {
            started: t2_started.clone(),
            release: t2_release.clone(),
            result: "ok".to_string(),
        },
    );
    let team = team_builder(&agent, vec![task("t1", "one"), task("t2", "two")])
        .build()
        .unwrap();

    team.start(Inputs::new()).await.unwrap();
    started(&t2_started).await;
    team.pause().await.unwrap();
    t2_release.notify_one();
    team.resume().await.unwrap();
    let outcome = settled(&team).await;
    assert_eq!(outcome.status, WorkflowStatus::Finished);

    // Gated steps report 10/5 tokens
    let expected = 110.0 / 1e6 * 0.15 + 55.0 / 1e6 * 0.6;
    for stats in [team.get_workflow_stats(), finished_stats(&team.logs()), outcome.stats] {
        assert_eq!(stats.llm_usage.calls_count, 2);
        assert_eq!(stats.llm_usage.input_tokens, 110);
        assert_eq!(stats.task_count, 2);
        assert!((stats.cost.total_cost - expected).abs() < 1e-12);
    }
}

#[tokio::test]
async fn test_run_stats_survive_validation_reopen() {
    let agent = ScriptedAgent::new();
    agent.script("t1", Step::complete("draft", 100, 50));
    agent.script("t2", Step::complete("final", 10, 5));
    let team = team_builder(
        &agent,
        vec![task("t1", "Draft").requiring_validation(), task("t2", "Publish")],
    )
    .build()
    .unwrap();

    team.start(Inputs::new()).await.unwrap();
    assert_eq!(settled(&team).await.status, WorkflowStatus::Blocked);
    team.validate_task("t1").unwrap();
    assert_eq!(settled(&team).await.status, WorkflowStatus::Finished);

    let first_start = team
        .logs()
        .iter()
        .find(|e| e.workflow_status() == Some(WorkflowStatus::Running))
        .unwrap()
        .timestamp;
    let stats = finished_stats(&team.logs());
    assert_eq!(stats.start_time, first_start);
    assert_eq!(stats.llm_usage.input_tokens, 110);
    assert_eq!(stats.llm_usage.output_tokens, 55);
    assert_eq!(stats.task_count, 2);
    assert_eq!(team.get_workflow_stats().llm_usage.calls_count, 2);
}

// =============================================================================
// Event log
// =============================================================================

#[tokio::test]
async fn test_live_subscription_sees_every_entry() {
    let agent = ScriptedAgent::new();
    let team = team_builder(&agent, vec![task("t1", "one")]).build().unwrap();
    let mut rx = team.subscribe_logs();

    team.start(Inputs::new()).await.unwrap();
    settled(&team).await;
    eventually(&team, |s| s.workflow_status == WorkflowStatus::Finished).await;

    let mut received = Vec::new();
    while let Ok(entry) = rx.try_recv() {
        received.push(entry);
    }
    assert_eq!(received, team.logs());
}

#[tokio::test]
async fn test_replayed_log_gives_same_answers() {
    let agent = ScriptedAgent::new();
    agent.script("t1", Step::complete("42", 100, 50));
    let team = team_builder(&agent, vec![task("t1", "one"), task("t2", "two")])
        .build()
        .unwrap();
    team.start(Inputs::new()).await.unwrap();
    settled(&team).await;

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("events.jsonl");
    let logs = team.logs();
    write_log_file(&path, &logs).unwrap();
    let replayed = read_log_file(&path).unwrap();
    assert_eq!(replayed, logs);

    let end = logs.last().unwrap().timestamp;
    assert_eq!(
        compute_task_stats("t1", &replayed, end),
        compute_task_stats("t1", &logs, end)
    );
    let plan = recorded_plan(&replayed).unwrap();
    assert_eq!(plan, vec!["t1".to_string(), "t2".to_string()]);
    assert_eq!(derive_context(&replayed, &plan, "t2"), "Task: one\nResult: 42\n");
}
