use serde::{Deserialize, Serialize};

use super::session::Id;

/// Status string reported by `GET /tasks/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Pending,
    Running,
    Done,
    Error,
    #[serde(alias = "cancelled")]
    Canceled,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// Whether polling must stop once this status is observed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Done | TaskStatus::Error | TaskStatus::Canceled
        )
    }
}

/// Response of `POST /tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCreated {
    pub task_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

/// Response of `GET /tasks/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub status: TaskStatus,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub history_id: Option<Id>,
}

impl TaskSnapshot {
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status,
            answer: None,
            error: None,
            history_id: None,
        }
    }

    pub fn done(answer: impl Into<String>) -> Self {
        Self {
            answer: Some(answer.into()),
            ..Self::with_status(TaskStatus::Done)
        }
    }

    pub fn failed(error: Option<&str>) -> Self {
        Self {
            error: error.map(str::to_string),
            ..Self::with_status(TaskStatus::Error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status_keeps_polling() {
        let snapshot: TaskSnapshot =
            serde_json::from_str(r#"{"task_id": "ab", "status": "thinking"}"#).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Unknown);
        assert!(!snapshot.status.is_terminal());
    }

    #[test]
    fn test_done_snapshot() {
        let snapshot: TaskSnapshot = serde_json::from_str(
            r#"{"task_id": "ab", "status": "done", "answer": "42", "history_id": 9}"#,
        )
        .unwrap();
        assert!(snapshot.status.is_terminal());
        assert_eq!(snapshot.answer.as_deref(), Some("42"));
        assert_eq!(snapshot.history_id, Some(Id::from("9")));
    }

    #[test]
    fn test_canceled_spellings() {
        let a: TaskStatus = serde_json::from_str("\"canceled\"").unwrap();
        let b: TaskStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(a, TaskStatus::Canceled);
        assert_eq!(b, TaskStatus::Canceled);
    }
}
