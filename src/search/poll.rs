use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::machine::Event;
use crate::client::TaskBackend;
use crate::core::Id;

/// A running status poller for one task.
///
/// The first request goes out one interval after spawning. Requests never
/// overlap: the next tick waits for the previous response. The poller stops by
/// itself after reporting a terminal status or a transport error.
pub struct PollHandle {
    task_id: Id,
    timer: JoinHandle<()>,
}

impl PollHandle {
    pub fn spawn(
        backend: Arc<dyn TaskBackend>,
        task_id: Id,
        generation: u64,
        period: Duration,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let id = task_id.clone();
        let timer = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let (outcome, finished) = match backend.get_task(&id).await {
                    Ok(snapshot) => {
                        tracing::trace!("Task {} status {:?}", id, snapshot.status);
                        let finished = snapshot.status.is_terminal();
                        (Ok(snapshot), finished)
                    }
                    Err(e) => {
                        tracing::warn!("Polling task {} failed: {}", id, e);
                        (Err(e.to_string()), true)
                    }
                };

                if events
                    .send(Event::PollResult {
                        generation,
                        outcome,
                    })
                    .is_err()
                {
                    break;
                }
                if finished {
                    break;
                }
            }
            tracing::debug!("Poller for task {} stopped", id);
        });

        Self { task_id, timer }
    }

    pub fn task_id(&self) -> &Id {
        &self.task_id
    }

    pub fn is_running(&self) -> bool {
        !self.timer.is_finished()
    }

    /// Stop the timer and hand back the task id.
    pub fn cancel(self) -> Id {
        self.timer.abort();
        self.task_id.clone()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

/// Holder for the single live poller.
#[derive(Default)]
pub struct PollSlot {
    current: Option<PollHandle>,
}

impl PollSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a poller. Fails, returning the handle, when one is already live.
    pub fn occupy(&mut self, handle: PollHandle) -> Result<(), PollHandle> {
        if self.is_active() {
            return Err(handle);
        }
        self.current = Some(handle);
        Ok(())
    }

    /// Stop the current poller, if any.
    pub fn vacate(&mut self) -> Option<Id> {
        self.current.take().map(PollHandle::cancel)
    }

    pub fn is_active(&self) -> bool {
        self.current.as_ref().is_some_and(PollHandle::is_running)
    }

    pub fn task_id(&self) -> Option<&Id> {
        self.current.as_ref().map(PollHandle::task_id)
    }
}
