use async_trait::async_trait;

use super::error::ApiError;
use crate::core::{HistoryItem, Id, Session, TaskCreated, TaskSnapshot};

/// Acknowledgement body returned by cancel/delete calls.
pub type Ack = serde_json::Value;

/// The task/session store the client talks to.
///
/// `DeepSearchClient` is the HTTP implementation; tests substitute scripted
/// fakes. Implementations perform no retries.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    async fn create_session(&self) -> Result<Session, ApiError>;

    async fn create_task(&self, query: &str, session_id: &Id) -> Result<TaskCreated, ApiError>;

    async fn get_task(&self, task_id: &Id) -> Result<TaskSnapshot, ApiError>;

    async fn cancel_task(&self, task_id: &Id) -> Result<Ack, ApiError>;

    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError>;

    async fn list_histories(&self, session_id: &Id) -> Result<Vec<HistoryItem>, ApiError>;

    async fn delete_session(&self, session_id: &Id) -> Result<Ack, ApiError>;

    async fn delete_history(&self, history_id: &Id) -> Result<Ack, ApiError>;
}
