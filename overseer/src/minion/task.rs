//! Command tasks.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A command-with-arguments unit of work submitted to a minion.
///
/// Created by the operator, deserialized on arrival, mutated in place
/// by the task runner and persisted to the minion's log subtree after
/// execution. Field names on the wire are the store's established
/// PascalCase ones, so existing queue and log consumers keep parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinionTask {
    /// Identifier generated by the submitter.
    #[serde(rename = "TaskID")]
    pub task_id: Uuid,

    /// Command to execute.
    #[serde(rename = "Command")]
    pub command: String,

    /// Command arguments.
    #[serde(rename = "Args")]
    pub args: Vec<String>,

    /// Run on a dedicated worker instead of the serial runner.
    #[serde(rename = "IsConcurrent")]
    pub is_concurrent: bool,

    /// Epoch seconds at which the runner received the task.
    #[serde(rename = "TimeReceived")]
    pub time_received: i64,

    /// Epoch seconds at which execution finished.
    #[serde(rename = "TimeProcessed")]
    pub time_processed: i64,

    /// Captured command output, stdout followed by stderr.
    #[serde(rename = "Result")]
    pub result: String,

    /// Failure description; empty on success.
    #[serde(rename = "Error")]
    pub error: String,
}

impl MinionTask {
    /// Creates a new task with a fresh submitter-side id.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            command: command.into(),
            args,
            is_concurrent: false,
            time_received: 0,
            time_processed: 0,
            result: String::new(),
            error: String::new(),
        }
    }

    /// Marks the task for concurrent execution.
    pub fn concurrent(mut self) -> Self {
        self.is_concurrent = true;
        self
    }

    /// True when execution completed without error.
    pub fn succeeded(&self) -> bool {
        self.error.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_defaults() {
        let task = MinionTask::new("uptime", vec![]);
        assert!(!task.is_concurrent);
        assert_eq!(task.time_received, 0);
        assert!(task.succeeded());
    }

    #[test]
    fn test_concurrent_builder() {
        let task = MinionTask::new("uptime", vec![]).concurrent();
        assert!(task.is_concurrent);
    }

    #[test]
    fn test_json_round_trip_is_lossless() {
        let mut task = MinionTask::new("ls", vec!["-l".to_string(), "/tmp".to_string()]);
        task.is_concurrent = true;
        task.time_received = 1_400_000_000;
        task.time_processed = 1_400_000_007;
        task.result = "total 0\n".to_string();
        task.error = "exit status 2".to_string();

        let json = serde_json::to_string(&task).unwrap();
        let back: MinionTask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_wire_field_names() {
        let task = MinionTask::new("uptime", vec![]);
        let json = serde_json::to_string(&task).unwrap();
        for field in [
            "\"TaskID\"",
            "\"Command\"",
            "\"Args\"",
            "\"IsConcurrent\"",
            "\"TimeReceived\"",
            "\"TimeProcessed\"",
            "\"Result\"",
            "\"Error\"",
        ] {
            assert!(json.contains(field), "missing {} in {}", field, json);
        }
    }
}
