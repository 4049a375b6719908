//! Context deriver and description interpolation
//!
//! The context string is the only channel through which a later task sees
//! the results of earlier ones. It is rebuilt from the event log each time.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::domain::{Task, TaskStatus, result_text};
use crate::events::{LogEntry, LogKind, TaskLogDetail};

/// Run-level inputs substituted into task descriptions
pub type Inputs = BTreeMap<String, String>;

/// `{name}` or `{taskResult:<task-id>}`
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(taskResult:)?([A-Za-z0-9_.\-]+)\}").expect("placeholder pattern is valid"));

/// Build the summary of completed tasks that precede `current_task_id`
///
/// Only DONE entries of tasks earlier in `plan_order` are used. A task that
/// completed more than once (after feedback) contributes its latest result.
/// Blocks are emitted in plan order regardless of log order.
pub fn derive_context(logs: &[LogEntry], plan_order: &[String], current_task_id: &str) -> String {
    debug!(%current_task_id, entries = logs.len(), "derive_context: called");

    let Some(current_index) = plan_order.iter().position(|id| id == current_task_id) else {
        warn!(%current_task_id, "derive_context: task not in plan, returning empty context");
        return String::new();
    };

    let index_of: HashMap<&str, usize> = plan_order
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut done: BTreeMap<usize, (String, String)> = BTreeMap::new();
    for entry in logs {
        let LogKind::TaskStatusUpdate {
            task,
            task_status: TaskStatus::Done,
            metadata,
            ..
        } = &entry.kind
        else {
            continue;
        };
        let Some(&index) = index_of.get(task.id.as_str()) else {
            continue;
        };
        if index >= current_index {
            continue;
        }
        let result = match &metadata.detail {
            TaskLogDetail::Completed { result } => result_text(result),
            _ => task.result.as_ref().map(result_text).unwrap_or_default(),
        };
        done.insert(index, (task.description.clone(), result));
    }

    done.values()
        .map(|(description, result)| format!("Task: {}\nResult: {}\n", description, result))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Substitute `{input}` and `{taskResult:<id>}` placeholders
///
/// Unknown placeholders are left untouched.
pub fn interpolate(description: &str, inputs: &Inputs, tasks: &[Task]) -> String {
    PLACEHOLDER.replace_all(description, |caps: &Captures| {
        let whole = caps[0].to_string();
        let key = &caps[2];
        if caps.get(1).is_some() {
            tasks
                .iter()
                .find(|t| t.id == key)
                .and_then(|t| t.result.as_ref())
                .map(result_text)
                .unwrap_or(whole)
        } else {
            inputs.get(key).cloned().unwrap_or(whole)
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgentRecord;
    use crate::events::TaskLogMetadata;
    use proptest::prelude::*;
    use serde_json::Value;

    fn done_entry(id: &str, description: &str, result: &str, ts: i64) -> LogEntry {
        let mut task = Task::new("a1", description).with_id(id);
        task.status = TaskStatus::Done;
        task.result = Some(Value::from(result));
        let meta = TaskLogMetadata {
            stats: None,
            detail: TaskLogDetail::Completed {
                result: Value::from(result),
            },
        };
        LogEntry::task_update(ts, &task, Some(&AgentRecord::new("a1", "Ada")), TaskStatus::Done, meta, "done")
    }

    fn plan(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_predecessor() {
        let logs = vec![done_entry("t1", "Find the answer", "42", 1)];
        let ctx = derive_context(&logs, &plan(&["t1", "t2"]), "t2");
        assert_eq!(ctx, "Task: Find the answer\nResult: 42\n");
    }

    #[test]
    fn test_first_task_has_no_context() {
        let logs = vec![done_entry("t1", "a", "1", 1)];
        assert_eq!(derive_context(&logs, &plan(&["t1", "t2"]), "t1"), "");
    }

    #[test]
    fn test_unknown_task_is_empty() {
        let logs = vec![done_entry("t1", "a", "1", 1)];
        assert_eq!(derive_context(&logs, &plan(&["t1"]), "ghost"), "");
    }

    #[test]
    fn test_plan_order_not_log_order() {
        let logs = vec![
            done_entry("t2", "second", "B", 1),
            done_entry("t3", "third", "C", 2),
            done_entry("t1", "first", "A", 3),
        ];
        let ctx = derive_context(&logs, &plan(&["t1", "t2", "t3", "t4"]), "t3");
        assert_eq!(ctx, "Task: first\nResult: A\n\nTask: second\nResult: B\n");
    }

    #[test]
    fn test_latest_result_wins() {
        let logs = vec![done_entry("t1", "first", "old", 1), done_entry("t1", "first", "new", 2)];
        let ctx = derive_context(&logs, &plan(&["t1", "t2"]), "t2");
        assert_eq!(ctx, "Task: first\nResult: new\n");
    }

    #[test]
    fn test_interpolate_inputs_and_results() {
        let mut inputs = Inputs::new();
        inputs.insert("topic".into(), "rust".into());
        let mut t1 = Task::new("a1", "x").with_id("t1");
        t1.result = Some(Value::from("an outline"));
        let out = interpolate("Write about {topic} using {taskResult:t1} and {missing}", &inputs, &[t1]);
        assert_eq!(out, "Write about rust using an outline and {missing}");
    }

    #[test]
    fn test_interpolate_unfinished_task_left_alone() {
        let t1 = Task::new("a1", "x").with_id("t1");
        assert_eq!(interpolate("{taskResult:t1}", &Inputs::new(), &[t1]), "{taskResult:t1}");
    }

    #[test]
    fn test_placeholder_pattern() {
        assert!(PLACEHOLDER.is_match("{topic}"));
        assert!(PLACEHOLDER.is_match("{taskResult:abc-1.2_x}"));
        assert!(!PLACEHOLDER.is_match("{not a placeholder}"));
        assert_eq!(interpolate("{a}{b}", &Inputs::from([("a".into(), "1".into())]), &[]), "1{b}");
    }

    proptest! {
        #[test]
        fn prop_context_only_includes_earlier_tasks(order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle(), k in 0usize..6) {
            let ids: Vec<String> = (0..6).map(|i| format!("t{}", i)).collect();
            let logs: Vec<LogEntry> = order
                .iter()
                .enumerate()
                .map(|(ts, &i)| done_entry(&ids[i], &format!("d{}", i), &format!("r{}", i), ts as i64))
                .collect();
            let ctx = derive_context(&logs, &ids, &ids[k]);
            let expected: Vec<String> = (0..k).map(|i| format!("Task: d{}\nResult: r{}\n", i, i)).collect();
            prop_assert_eq!(ctx, expected.join("\n"));
        }
    }
}
