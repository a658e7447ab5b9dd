use anyhow::{anyhow, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

use super::machine::{AppState, Effect, Event, SubmitMode};
use super::poll::{PollHandle, PollSlot};
use super::state::{Tab, ViewSnapshot};
use crate::cache::{CachedHistory, LocalMirror};
use crate::client::TaskBackend;
use crate::core::{Config, HistoryItem, Id, Session};
use crate::utils::{now_ms, Debouncer};

#[derive(Debug, Clone, Copy)]
pub struct ControllerOptions {
    pub poll_interval: Duration,
    pub debounce: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            debounce: Duration::from_millis(150),
        }
    }
}

impl ControllerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            debounce: config.debounce_delay(),
        }
    }
}

// Commands accepted by the controller actor
enum Command {
    Event(Event),
    Apply {
        event: Event,
        response_tx: oneshot::Sender<ViewSnapshot>,
    },
}

/// Handle to the view coordinator.
///
/// All state lives in an actor task; every mutation goes through
/// `AppState::apply` there, and the resulting view is published on a watch
/// channel after each transition. Cloning the handle is cheap.
#[derive(Clone)]
pub struct SearchHandle {
    command_tx: mpsc::UnboundedSender<Command>,
    view_rx: watch::Receiver<ViewSnapshot>,
    backend: Arc<dyn TaskBackend>,
    submitter: Arc<Debouncer<(String, SubmitMode)>>,
}

// Internal controller state (runs in its own task)
struct SearchActor {
    state: AppState,
    backend: Arc<dyn TaskBackend>,
    mirror: Option<LocalMirror>,
    poll_interval: Duration,
    slot: PollSlot,
    command_rx: mpsc::UnboundedReceiver<Command>,
    event_rx: mpsc::UnboundedReceiver<Event>,
    event_tx: mpsc::UnboundedSender<Event>,
    view_tx: watch::Sender<ViewSnapshot>,
}

impl SearchHandle {
    /// Start the controller. Must be called from within a Tokio runtime.
    pub fn spawn(
        backend: Arc<dyn TaskBackend>,
        mirror: Option<LocalMirror>,
        options: ControllerOptions,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let state = AppState::new();
        let (view_tx, view_rx) = watch::channel(state.snapshot());

        let actor = SearchActor {
            state,
            backend: Arc::clone(&backend),
            mirror,
            poll_interval: options.poll_interval,
            slot: PollSlot::new(),
            command_rx,
            event_rx,
            event_tx,
            view_tx,
        };
        tokio::spawn(actor.run());

        let submit_tx = command_tx.clone();
        let submitter = Debouncer::new(
            options.debounce,
            move |(query, mode): (String, SubmitMode)| {
                let _ = submit_tx.send(Command::Event(Event::Submit { query, mode }));
            },
        );

        Self {
            command_tx,
            view_rx,
            backend,
            submitter: Arc::new(submitter),
        }
    }

    /// Debounced submit: rapid calls collapse into the last one.
    pub fn submit(&self, query: impl Into<String>, mode: SubmitMode) {
        self.submitter.call((query.into(), mode));
    }

    /// Submit immediately, dropping any pending debounced submit.
    pub async fn submit_now(
        &self,
        query: impl Into<String>,
        mode: SubmitMode,
    ) -> Result<ViewSnapshot> {
        self.submitter.cancel();
        self.apply(Event::Submit {
            query: query.into(),
            mode,
        })
        .await
    }

    /// Cancel the in-flight task, and any submit still waiting in the debouncer.
    pub async fn cancel(&self) -> Result<ViewSnapshot> {
        self.submitter.cancel();
        self.apply(Event::Cancel { at: Utc::now() }).await
    }

    pub async fn switch_tab(&self, tab: Tab) -> Result<ViewSnapshot> {
        self.apply(Event::SwitchTab(tab)).await
    }

    /// Fetch the session list and store it newest first.
    pub async fn load_sessions(&self) -> Result<ViewSnapshot> {
        let sessions = self.backend.list_sessions().await?;
        tracing::debug!("Loaded {} sessions", sessions.len());
        self.apply(Event::SessionsLoaded {
            sessions,
            now_ms: now_ms(),
        })
        .await
    }

    /// Load a session's histories into the Search view.
    pub async fn open_session(&self, session_id: Id) -> Result<ViewSnapshot> {
        let histories = self.backend.list_histories(&session_id).await?;
        self.apply(Event::SessionOpened {
            session_id,
            histories,
        })
        .await
    }

    pub async fn delete_session(&self, session_id: Id) -> Result<ViewSnapshot> {
        self.backend.delete_session(&session_id).await?;
        tracing::info!("Deleted session {}", session_id);
        self.apply(Event::SessionDeleted { session_id }).await
    }

    pub async fn delete_history(&self, history_id: Id) -> Result<ViewSnapshot> {
        self.backend.delete_history(&history_id).await?;
        tracing::info!("Deleted history {}", history_id);
        self.apply(Event::HistoryDeleted { history_id }).await
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        self.view_rx.borrow().clone()
    }

    /// Wait until the published view satisfies `predicate`.
    pub async fn wait_until<F>(&self, mut predicate: F) -> Result<ViewSnapshot>
    where
        F: FnMut(&ViewSnapshot) -> bool,
    {
        let mut rx = self.view_rx.clone();
        let view = rx
            .wait_for(|view| predicate(view))
            .await
            .map_err(|_| anyhow!("Search controller is not running"))?;
        Ok(view.clone())
    }

    /// Wait until the submission of `generation` is no longer in flight,
    /// either because it finished or because it was superseded.
    pub async fn wait_for_settle(&self, generation: u64) -> Result<ViewSnapshot> {
        self.wait_until(|view| view.generation != generation || !view.phase.is_busy())
            .await
    }

    async fn apply(&self, event: Event) -> Result<ViewSnapshot> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(Command::Apply { event, response_tx })
            .map_err(|_| anyhow!("Search controller is not running"))?;

        response_rx
            .await
            .map_err(|_| anyhow!("Search controller did not respond"))
    }
}

impl SearchActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(Command::Event(event)) => self.handle_event(event),
                    Some(Command::Apply { event, response_tx }) => {
                        self.handle_event(event);
                        let _ = response_tx.send(self.state.snapshot());
                    }
                    None => break,
                },
                Some(event) = self.event_rx.recv() => {
                    self.handle_event(event);
                }
            }
        }

        if let Some(task_id) = self.slot.vacate() {
            tracing::debug!("Stopped polling task {} on shutdown", task_id);
        }
        tracing::debug!("Search controller shutting down");
    }

    fn handle_event(&mut self, event: Event) {
        let effects = self.state.apply(event);
        for effect in effects {
            self.execute(effect);
        }
        self.view_tx.send_replace(self.state.snapshot());
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::CancelRemoteTask(task_id) => {
                let backend = Arc::clone(&self.backend);
                tokio::spawn(async move {
                    match backend.cancel_task(&task_id).await {
                        Ok(_) => tracing::debug!("Cancelled task {}", task_id),
                        Err(e) => tracing::debug!("Ignoring cancel failure for {}: {}", task_id, e),
                    }
                });
            }
            Effect::StopPolling => {
                if let Some(task_id) = self.slot.vacate() {
                    tracing::info!("Stopped polling task {}", task_id);
                }
            }
            Effect::CreateSession { generation, query } => {
                tracing::debug!("Creating session for {:?}", query);
                let backend = Arc::clone(&self.backend);
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let event = match backend.create_session().await {
                        Ok(session) => Event::SessionCreated {
                            generation,
                            session,
                        },
                        Err(e) => Event::RequestFailed {
                            generation,
                            message: e.to_string(),
                        },
                    };
                    let _ = event_tx.send(event);
                });
            }
            Effect::CreateTask {
                generation,
                query,
                session_id,
            } => {
                let backend = Arc::clone(&self.backend);
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let event = match backend.create_task(&query, &session_id).await {
                        Ok(created) => Event::TaskCreated {
                            generation,
                            task_id: created.task_id,
                        },
                        Err(e) => Event::RequestFailed {
                            generation,
                            message: e.to_string(),
                        },
                    };
                    let _ = event_tx.send(event);
                });
            }
            Effect::StartPolling {
                generation,
                task_id,
            } => {
                if let Some(stale) = self.slot.vacate() {
                    tracing::warn!("Poller for task {} was still live", stale);
                }
                tracing::info!("Polling task {}", task_id);
                let handle = PollHandle::spawn(
                    Arc::clone(&self.backend),
                    task_id,
                    generation,
                    self.poll_interval,
                    self.event_tx.clone(),
                );
                if let Err(handle) = self.slot.occupy(handle) {
                    tracing::warn!("Dropping poller for task {}", handle.task_id());
                }
            }
            Effect::PersistSession(session) => self.persist_session(&session),
            Effect::PersistHistory { session_id, item } => self.persist_history(&session_id, item),
            Effect::ForgetSession(session_id) => {
                if let Some(mirror) = &self.mirror {
                    mirror.forget_session(&session_id);
                }
            }
            Effect::ForgetHistory {
                session_id,
                history_id,
            } => {
                if let Some(mirror) = &self.mirror {
                    mirror.forget_history(&session_id, &history_id);
                }
            }
        }
    }

    fn persist_session(&self, session: &Session) {
        if let Some(mirror) = &self.mirror {
            mirror.save_session(session, now_ms());
        }
    }

    fn persist_history(&self, session_id: &Id, item: HistoryItem) {
        let Some(mirror) = &self.mirror else {
            return;
        };
        let entry = CachedHistory {
            id: item
                .id
                .unwrap_or_else(|| Id::new(Uuid::new_v4().to_string())),
            timestamp: now_ms(),
            user_input: item.user_input,
            answer: item.answer.unwrap_or_default(),
        };
        mirror.save_history(session_id, entry);
    }
}
