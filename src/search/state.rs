use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{HistoryItem, Id, Session};
use crate::utils::time::normalize_epoch_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Tab {
    #[default]
    New,
    Search,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            role: Role::Bot,
            text: text.into(),
        }
    }
}

/// A question with its answer, `None` while still pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaPair {
    pub title: String,
    pub answer: Option<String>,
}

/// The conversation shown in the Search view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub current_session_id: Option<Id>,
    pub title: String,
    pub messages: Vec<Message>,
    pub history_items: Vec<HistoryItem>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub cancel_notice_ts: Option<DateTime<Utc>>,
}

impl SearchState {
    /// State of a session reopened from its stored histories.
    pub fn from_histories(session_id: Id, histories: Vec<HistoryItem>) -> Self {
        let title = histories
            .last()
            .map(|h| h.user_input.clone())
            .unwrap_or_default();
        Self {
            current_session_id: Some(session_id),
            title,
            messages: messages_from_histories(&histories),
            history_items: histories,
            ..Self::default()
        }
    }

    /// Group messages into question/answer pairs for display.
    pub fn pairs(&self) -> Vec<QaPair> {
        let mut out = Vec::new();
        let mut pending: Option<&str> = None;

        for message in &self.messages {
            match message.role {
                Role::User => {
                    if let Some(title) = pending.replace(&message.text) {
                        out.push(QaPair {
                            title: title.to_string(),
                            answer: None,
                        });
                    }
                }
                Role::Bot => out.push(QaPair {
                    title: pending.take().unwrap_or_default().to_string(),
                    answer: Some(message.text.clone()),
                }),
            }
        }
        if let Some(title) = pending {
            out.push(QaPair {
                title: title.to_string(),
                answer: None,
            });
        }
        out
    }
}

pub fn messages_from_histories(histories: &[HistoryItem]) -> Vec<Message> {
    histories
        .iter()
        .flat_map(|h| [Message::user(&h.user_input), Message::bot(h.answer_text())])
        .collect()
}

/// Newest first; a missing `created_at` counts as `now_ms`.
pub fn sort_sessions(sessions: &mut [Session], now_ms: i64) {
    sessions.sort_by_key(|s| {
        std::cmp::Reverse(s.created_at.map(normalize_epoch_ms).unwrap_or(now_ms))
    });
}

/// Coarse view of the polling state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PhaseKind {
    #[default]
    Idle,
    Submitting,
    Polling,
    Done,
    Failed,
    Cancelled,
}

impl PhaseKind {
    pub fn is_busy(&self) -> bool {
        matches!(self, PhaseKind::Submitting | PhaseKind::Polling)
    }
}

/// What observers of the coordinator see after every transition.
#[derive(Debug, Clone, Default)]
pub struct ViewSnapshot {
    pub tab: Tab,
    pub search: SearchState,
    pub sessions: Vec<Session>,
    pub phase: PhaseKind,
    /// Bumped whenever a submission starts or an in-flight one is abandoned.
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(input: &str, answer: Option<&str>) -> HistoryItem {
        HistoryItem {
            id: None,
            timestamp: None,
            user_input: input.to_string(),
            answer: answer.map(str::to_string),
            session_id: None,
        }
    }

    #[test]
    fn test_pairs_handle_pending_and_orphans() {
        let state = SearchState {
            messages: vec![
                Message::bot("orphan"),
                Message::user("q1"),
                Message::bot("a1"),
                Message::user("q2"),
                Message::user("q3"),
            ],
            ..SearchState::default()
        };

        assert_eq!(
            state.pairs(),
            vec![
                QaPair { title: String::new(), answer: Some("orphan".into()) },
                QaPair { title: "q1".into(), answer: Some("a1".into()) },
                QaPair { title: "q2".into(), answer: None },
                QaPair { title: "q3".into(), answer: None },
            ]
        );
    }

    #[test]
    fn test_from_histories_rebuilds_conversation() {
        let state = SearchState::from_histories(
            Id::from(3),
            vec![history("first", Some("one")), history("second", None)],
        );
        assert_eq!(state.title, "second");
        assert_eq!(
            state.messages,
            vec![
                Message::user("first"),
                Message::bot("one"),
                Message::user("second"),
                Message::bot(""),
            ]
        );
        assert!(!state.is_loading);
    }

    #[test]
    fn test_sort_sessions_newest_first_missing_is_now() {
        let mk = |id: i64, created_at: Option<i64>| Session {
            id: Id::from(id),
            created_at,
            summary: None,
        };
        let mut sessions = vec![
            mk(1, Some(1_600_000_000)),
            mk(2, None),
            mk(3, Some(1_700_000_000_000)),
        ];
        sort_sessions(&mut sessions, 1_800_000_000_000);

        let ids: Vec<_> = sessions.iter().map(|s| s.id.to_string()).collect();
        assert_eq!(ids, vec!["2", "3", "1"]);
    }
}
