use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use super::backend::{Ack, TaskBackend};
use super::error::{ApiError, ApiOp};
use crate::core::{Config, HistoryItem, Id, Session, TaskCreated, TaskSnapshot};

/// HTTP client for the DeepSearch task API.
#[derive(Debug, Clone)]
pub struct DeepSearchClient {
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
pub struct CreateTaskRequest<'a> {
    pub query: &'a str,
    pub session_id: &'a Id,
}

impl DeepSearchClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| anyhow!("Invalid API base URL '{}': {}", base_url, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!(
                "Unsupported API URL scheme '{}' (expected http or https)",
                parsed.scheme()
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and decode the JSON body, mapping every failure onto `op`.
    async fn send<T: DeserializeOwned>(
        &self,
        op: ApiOp,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Transport { op, source })?;

        let status = response.status();
        tracing::debug!("{} response status: {}", op, status);

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::debug!("{} failed with status {}: {}", op, status, body);
            return Err(ApiError::Status { op, status, body });
        }

        let text = response
            .text()
            .await
            .map_err(|source| ApiError::Transport { op, source })?;
        serde_json::from_str(&text).map_err(|source| ApiError::Decode { op, source })
    }

    /// Like `send`, but an empty 2xx body is accepted as a null acknowledgement.
    async fn send_ack(&self, op: ApiOp, request: RequestBuilder) -> Result<Ack, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Transport { op, source })?;

        let status = response.status();
        tracing::debug!("{} response status: {}", op, status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { op, status, body });
        }

        let text = response
            .text()
            .await
            .map_err(|source| ApiError::Transport { op, source })?;
        if text.trim().is_empty() {
            return Ok(Ack::Null);
        }
        serde_json::from_str(&text).map_err(|source| ApiError::Decode { op, source })
    }
}

#[async_trait]
impl TaskBackend for DeepSearchClient {
    async fn create_session(&self) -> Result<Session, ApiError> {
        let url = self.url("/sessions");
        tracing::debug!("Making POST request to: {}", url);
        let session: Session = self.send(ApiOp::CreateSession, self.client.post(&url)).await?;
        tracing::debug!("Created session {}", session.id);
        Ok(session)
    }

    async fn create_task(&self, query: &str, session_id: &Id) -> Result<TaskCreated, ApiError> {
        let request = CreateTaskRequest { query, session_id };
        if let Ok(json) = serde_json::to_string(&request) {
            tracing::debug!("POST /tasks JSON body: {}", json);
        }

        let url = self.url("/tasks");
        let created: TaskCreated = self
            .send(ApiOp::CreateTask, self.client.post(&url).json(&request))
            .await?;
        tracing::debug!("Created task {} in session {}", created.task_id, session_id);
        Ok(created)
    }

    async fn get_task(&self, task_id: &Id) -> Result<TaskSnapshot, ApiError> {
        let url = self.url(&format!("/tasks/{}", task_id));
        self.send(ApiOp::GetTask, self.client.get(&url)).await
    }

    async fn cancel_task(&self, task_id: &Id) -> Result<Ack, ApiError> {
        let url = self.url(&format!("/tasks/{}", task_id));
        tracing::debug!("Making DELETE request to: {}", url);
        self.send_ack(ApiOp::CancelTask, self.client.delete(&url)).await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        let url = self.url("/sessions");
        self.send(ApiOp::ListSessions, self.client.get(&url)).await
    }

    async fn list_histories(&self, session_id: &Id) -> Result<Vec<HistoryItem>, ApiError> {
        let url = self.url(&format!("/sessions/{}/histories", session_id));
        self.send(ApiOp::ListHistories, self.client.get(&url)).await
    }

    async fn delete_session(&self, session_id: &Id) -> Result<Ack, ApiError> {
        let url = self.url(&format!("/sessions/{}", session_id));
        tracing::debug!("Making DELETE request to: {}", url);
        self.send_ack(ApiOp::DeleteSession, self.client.delete(&url)).await
    }

    async fn delete_history(&self, history_id: &Id) -> Result<Ack, ApiError> {
        let url = self.url(&format!("/histories/{}", history_id));
        tracing::debug!("Making DELETE request to: {}", url);
        self.send_ack(ApiOp::DeleteHistory, self.client.delete(&url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(DeepSearchClient::new("not a url", Duration::from_secs(1)).is_err());
        assert!(DeepSearchClient::new("ftp://host/api", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = DeepSearchClient::new("http://localhost:8000/api/", Duration::from_secs(1))
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/api");
        assert_eq!(client.url("/tasks/1"), "http://localhost:8000/api/tasks/1");
    }

    #[test]
    fn test_create_task_body_shape() {
        let id = Id::from(5);
        let body = serde_json::to_value(CreateTaskRequest {
            query: "rust",
            session_id: &id,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"query": "rust", "session_id": "5"}));
    }
}
