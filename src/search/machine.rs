//! Task submission and polling as pure transitions.
//!
//! `AppState::apply` mutates state in response to an `Event` and returns the
//! side effects (network calls, timers, cache writes) for the controller to
//! execute. Nothing here performs I/O.
//!
//! Every submission takes a new generation number. Results of network calls
//! carry the generation they were issued under and are dropped when it is no
//! longer current, so an abandoned submission can never write into the
//! conversation.

use chrono::{DateTime, Utc};

use super::state::{
    messages_from_histories, sort_sessions, Message, PhaseKind, SearchState, Tab, ViewSnapshot,
};
use crate::core::{HistoryItem, Id, Session, TaskSnapshot, TaskStatus};

/// Fallback message when the backend reports an error without details.
pub const TASK_FAILED: &str = "Task failed";

/// Result of one poll tick: the snapshot, or the transport failure text.
pub type PollOutcome = Result<TaskSnapshot, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// Create a fresh session, then ask.
    NewSession,
    /// Ask within the current session.
    FollowUp,
}

#[derive(Debug, Clone)]
pub enum Event {
    Submit { query: String, mode: SubmitMode },
    SessionCreated { generation: u64, session: Session },
    TaskCreated { generation: u64, task_id: Id },
    RequestFailed { generation: u64, message: String },
    PollResult { generation: u64, outcome: PollOutcome },
    Cancel { at: DateTime<Utc> },
    SwitchTab(Tab),
    SessionsLoaded { sessions: Vec<Session>, now_ms: i64 },
    SessionOpened { session_id: Id, histories: Vec<HistoryItem> },
    SessionDeleted { session_id: Id },
    HistoryDeleted { history_id: Id },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Fire-and-forget remote cancel; failures are swallowed.
    CancelRemoteTask(Id),
    /// Clear the live poll timer.
    StopPolling,
    CreateSession { generation: u64, query: String },
    CreateTask { generation: u64, query: String, session_id: Id },
    StartPolling { generation: u64, task_id: Id },
    PersistSession(Session),
    PersistHistory { session_id: Id, item: HistoryItem },
    ForgetSession(Id),
    ForgetHistory { session_id: Id, history_id: Id },
}

#[derive(Debug, Clone, Default)]
enum Phase {
    #[default]
    Idle,
    Submitting {
        generation: u64,
        query: String,
        session_id: Option<Id>,
    },
    Polling {
        generation: u64,
        task_id: Id,
        query: String,
        session_id: Id,
    },
    Done,
    Failed,
    Cancelled,
}

impl Phase {
    fn kind(&self) -> PhaseKind {
        match self {
            Phase::Idle => PhaseKind::Idle,
            Phase::Submitting { .. } => PhaseKind::Submitting,
            Phase::Polling { .. } => PhaseKind::Polling,
            Phase::Done => PhaseKind::Done,
            Phase::Failed => PhaseKind::Failed,
            Phase::Cancelled => PhaseKind::Cancelled,
        }
    }

    fn is_submitting(&self, generation: u64) -> bool {
        matches!(self, Phase::Submitting { generation: g, .. } if *g == generation)
    }
}

/// Everything the view coordinator owns.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub tab: Tab,
    pub search: SearchState,
    pub sessions: Vec<Session>,
    phase: Phase,
    generation: u64,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> PhaseKind {
        self.phase.kind()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Task currently being polled.
    pub fn active_task(&self) -> Option<&Id> {
        match &self.phase {
            Phase::Polling { task_id, .. } => Some(task_id),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            tab: self.tab,
            search: self.search.clone(),
            sessions: self.sessions.clone(),
            phase: self.phase(),
            generation: self.generation,
        }
    }

    pub fn apply(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Submit { query, mode } => self.submit(query, mode),
            Event::SessionCreated {
                generation,
                session,
            } => self.session_created(generation, session),
            Event::TaskCreated {
                generation,
                task_id,
            } => self.task_created(generation, task_id),
            Event::RequestFailed {
                generation,
                message,
            } => {
                if self.phase.is_submitting(generation) {
                    self.fail(message);
                }
                Vec::new()
            }
            Event::PollResult {
                generation,
                outcome,
            } => self.poll_result(generation, outcome),
            Event::Cancel { at } => {
                let effects = self.supersede();
                self.search.is_loading = false;
                self.search.cancel_notice_ts = Some(at);
                self.search.error = None;
                self.phase = Phase::Cancelled;
                effects
            }
            Event::SwitchTab(tab) => {
                self.tab = tab;
                Vec::new()
            }
            Event::SessionsLoaded {
                mut sessions,
                now_ms,
            } => {
                sort_sessions(&mut sessions, now_ms);
                self.sessions = sessions;
                Vec::new()
            }
            Event::SessionOpened {
                session_id,
                histories,
            } => {
                let effects = self.supersede();
                self.search = SearchState::from_histories(session_id, histories);
                self.tab = Tab::Search;
                effects
            }
            Event::SessionDeleted { session_id } => self.session_deleted(session_id),
            Event::HistoryDeleted { history_id } => self.history_deleted(history_id),
        }
    }

    /// Abandon whatever is in flight and start a new generation.
    fn supersede(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Phase::Polling { task_id, .. } = std::mem::take(&mut self.phase) {
            tracing::debug!("Superseding poll of task {}", task_id);
            effects.push(Effect::CancelRemoteTask(task_id));
            effects.push(Effect::StopPolling);
        }
        self.generation += 1;
        effects
    }

    fn submit(&mut self, query: String, mode: SubmitMode) -> Vec<Effect> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Vec::new();
        }

        match mode {
            SubmitMode::NewSession => {
                let mut effects = self.supersede();
                self.search = SearchState {
                    is_loading: true,
                    ..SearchState::default()
                };
                self.phase = Phase::Submitting {
                    generation: self.generation,
                    query: query.clone(),
                    session_id: None,
                };
                effects.push(Effect::CreateSession {
                    generation: self.generation,
                    query,
                });
                effects
            }
            SubmitMode::FollowUp => {
                let Some(session_id) = self.search.current_session_id.clone() else {
                    tracing::debug!("Ignoring follow-up without an open session");
                    return Vec::new();
                };
                let mut effects = self.supersede();
                self.search.title = query.clone();
                self.search.messages.push(Message::user(&query));
                self.search.is_loading = true;
                self.search.error = None;
                self.phase = Phase::Submitting {
                    generation: self.generation,
                    query: query.clone(),
                    session_id: Some(session_id.clone()),
                };
                effects.push(Effect::CreateTask {
                    generation: self.generation,
                    query,
                    session_id,
                });
                effects
            }
        }
    }

    fn session_created(&mut self, generation: u64, session: Session) -> Vec<Effect> {
        let query = match &self.phase {
            Phase::Submitting {
                generation: g,
                query,
                session_id: None,
            } if *g == generation => query.clone(),
            _ => {
                tracing::debug!("Dropping stale session {}", session.id);
                return Vec::new();
            }
        };

        self.search = SearchState {
            current_session_id: Some(session.id.clone()),
            title: query.clone(),
            messages: vec![Message::user(&query)],
            is_loading: true,
            ..SearchState::default()
        };
        self.tab = Tab::Search;
        self.phase = Phase::Submitting {
            generation,
            query: query.clone(),
            session_id: Some(session.id.clone()),
        };

        let session_id = session.id.clone();
        vec![
            Effect::PersistSession(session),
            Effect::CreateTask {
                generation,
                query,
                session_id,
            },
        ]
    }

    fn task_created(&mut self, generation: u64, task_id: Id) -> Vec<Effect> {
        let current = match &self.phase {
            Phase::Submitting {
                generation: g,
                query,
                session_id: Some(session_id),
            } if *g == generation => Some((query.clone(), session_id.clone())),
            _ => None,
        };

        let Some((query, session_id)) = current else {
            // Nobody is waiting for this task any more.
            tracing::debug!("Cancelling orphaned task {}", task_id);
            return vec![Effect::CancelRemoteTask(task_id)];
        };

        self.phase = Phase::Polling {
            generation,
            task_id: task_id.clone(),
            query,
            session_id,
        };
        vec![Effect::StartPolling {
            generation,
            task_id,
        }]
    }

    fn poll_result(&mut self, generation: u64, outcome: PollOutcome) -> Vec<Effect> {
        match &self.phase {
            Phase::Polling { generation: g, .. } if *g == generation => {}
            _ => return Vec::new(),
        }

        let snapshot = match outcome {
            Ok(snapshot) => snapshot,
            Err(message) => {
                self.fail(format!("Failed to get task status: {}", message));
                return vec![Effect::StopPolling];
            }
        };

        match snapshot.status {
            TaskStatus::Done => {
                let Phase::Polling {
                    query, session_id, ..
                } = std::mem::replace(&mut self.phase, Phase::Done)
                else {
                    return Vec::new();
                };
                let answer = snapshot.answer.unwrap_or_default();
                let item = HistoryItem {
                    id: snapshot.history_id,
                    timestamp: None,
                    user_input: query,
                    answer: Some(answer.clone()),
                    session_id: Some(session_id.clone()),
                };
                self.search.messages.push(Message::bot(answer));
                self.search.history_items.push(item.clone());
                self.search.is_loading = false;
                vec![
                    Effect::StopPolling,
                    Effect::PersistHistory { session_id, item },
                ]
            }
            TaskStatus::Error => {
                let message = snapshot
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| TASK_FAILED.to_string());
                self.fail(message);
                vec![Effect::StopPolling]
            }
            TaskStatus::Canceled => {
                self.search.is_loading = false;
                self.search.error = Some("Task was cancelled".to_string());
                self.phase = Phase::Cancelled;
                vec![Effect::StopPolling]
            }
            _ => Vec::new(),
        }
    }

    fn fail(&mut self, message: String) {
        self.search.is_loading = false;
        self.search.error = Some(message);
        self.phase = Phase::Failed;
    }

    fn session_deleted(&mut self, session_id: Id) -> Vec<Effect> {
        self.sessions.retain(|s| s.id != session_id);
        let mut effects = Vec::new();

        if self.search.current_session_id.as_ref() == Some(&session_id) {
            effects = self.supersede();
            self.search = SearchState::default();
            self.tab = Tab::New;
        }
        effects.push(Effect::ForgetSession(session_id));
        effects
    }

    fn history_deleted(&mut self, history_id: Id) -> Vec<Effect> {
        let before = self.search.history_items.len();
        self.search
            .history_items
            .retain(|h| h.id.as_ref() != Some(&history_id));
        let removed = self.search.history_items.len() != before;

        if removed && !self.search.is_loading {
            self.search.messages = messages_from_histories(&self.search.history_items);
        }

        match &self.search.current_session_id {
            Some(session_id) if removed => vec![Effect::ForgetHistory {
                session_id: session_id.clone(),
                history_id,
            }],
            _ => Vec::new(),
        }
    }
}
