#[cfg(test)]
mod tests {
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use deepsearch::client::{Ack, ApiError, DeepSearchClient, TaskBackend};
    use deepsearch::core::{Id, TaskStatus};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Recorded {
        task_bodies: Arc<Mutex<Vec<Value>>>,
        deleted: Arc<Mutex<Vec<String>>>,
    }

    async fn create_session() -> Json<Value> {
        Json(json!({"id": 7, "created_at": 1_700_000_000, "abstract": ""}))
    }

    async fn list_sessions() -> Json<Value> {
        Json(json!([
            {"id": 7, "created_at": 1_700_000_000, "abstract": "what is rust"},
            {"id": 8, "created_at": 1_700_000_100, "abstract": ""}
        ]))
    }

    async fn delete_session(State(rec): State<Recorded>, Path(id): Path<String>) -> Response {
        if id == "404" {
            return (StatusCode::NOT_FOUND, Json(json!({"detail": "Session not found"})))
                .into_response();
        }
        rec.deleted.lock().unwrap().push(format!("session:{}", id));
        Json(json!({"message": format!("Session {} deleted", id)})).into_response()
    }

    async fn list_histories(Path(id): Path<String>) -> Json<Value> {
        Json(json!([{
            "id": 3,
            "timestamp": 1_700_000_050,
            "user_input": "what is rust",
            "answer": "A language [cite: https://rust-lang.org]",
            "session_id": id.parse::<i64>().unwrap_or(0)
        }]))
    }

    async fn delete_history(State(rec): State<Recorded>, Path(id): Path<String>) -> Json<Value> {
        rec.deleted.lock().unwrap().push(format!("history:{}", id));
        Json(json!({"message": "History deleted"}))
    }

    async fn create_task(State(rec): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
        rec.task_bodies.lock().unwrap().push(body);
        Json(json!({"task_id": "9f2c", "status": "queued"}))
    }

    async fn get_task(Path(id): Path<String>) -> Response {
        match id.as_str() {
            "garbled" => (StatusCode::OK, "not json").into_response(),
            "missing" => (StatusCode::NOT_FOUND, Json(json!({"detail": "Task not found"})))
                .into_response(),
            "broken" => Json(json!({
                "task_id": id,
                "status": "error",
                "error": "search backend unavailable"
            }))
            .into_response(),
            _ => Json(json!({
                "task_id": id,
                "status": "done",
                "answer": "42",
                "history_id": 3
            }))
            .into_response(),
        }
    }

    async fn cancel_task(State(rec): State<Recorded>, Path(id): Path<String>) -> StatusCode {
        rec.deleted.lock().unwrap().push(format!("task:{}", id));
        StatusCode::NO_CONTENT
    }

    async fn spawn_server() -> (DeepSearchClient, Recorded) {
        let recorded = Recorded::default();
        let app = Router::new()
            .route("/api/sessions", post(create_session).get(list_sessions))
            .route("/api/sessions/:id", delete(delete_session))
            .route("/api/sessions/:id/histories", get(list_histories))
            .route("/api/histories/:id", delete(delete_history))
            .route("/api/tasks", post(create_task))
            .route("/api/tasks/:id", get(get_task).delete(cancel_task))
            .with_state(recorded.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client =
            DeepSearchClient::new(&format!("http://{}/api/", addr), Duration::from_secs(5))
                .unwrap();
        (client, recorded)
    }

    #[tokio::test]
    async fn test_session_and_task_creation() {
        let (client, recorded) = spawn_server().await;

        let session = client.create_session().await.unwrap();
        assert_eq!(session.id, Id::from(7));
        assert_eq!(session.created_at, Some(1_700_000_000));

        let created = client.create_task("what is rust", &session.id).await.unwrap();
        assert_eq!(created.task_id, Id::from("9f2c"));
        assert_eq!(created.status, Some(TaskStatus::Queued));

        let bodies = recorded.task_bodies.lock().unwrap().clone();
        assert_eq!(
            bodies,
            vec![json!({"query": "what is rust", "session_id": "7"})]
        );
    }

    #[tokio::test]
    async fn test_get_task_decodes_snapshots() {
        let (client, _) = spawn_server().await;

        let done = client.get_task(&Id::from("9f2c")).await.unwrap();
        assert_eq!(done.status, TaskStatus::Done);
        assert_eq!(done.answer.as_deref(), Some("42"));
        assert_eq!(done.history_id, Some(Id::from(3)));

        let failed = client.get_task(&Id::from("broken")).await.unwrap();
        assert_eq!(failed.status, TaskStatus::Error);
        assert_eq!(failed.error.as_deref(), Some("search backend unavailable"));
    }

    #[tokio::test]
    async fn test_non_success_status_maps_to_op_code() {
        let (client, _) = spawn_server().await;

        let err = client.get_task(&Id::from("missing")).await.unwrap_err();
        assert_eq!(err.code(), "task_status_failed");
        assert_eq!(err.to_string(), "task_status_failed");
        assert!(err.is_not_found());

        let err = client.delete_session(&Id::from("404")).await.unwrap_err();
        assert_eq!(err.code(), "del_session_failed");
        match err {
            ApiError::Status { body, .. } => assert!(body.contains("Session not found")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let (client, _) = spawn_server().await;

        let err = client.get_task(&Id::from("garbled")).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
        assert!(err.to_string().starts_with("task_status_failed"));
    }

    #[tokio::test]
    async fn test_acks_accept_empty_and_json_bodies() {
        let (client, recorded) = spawn_server().await;

        let ack = client.cancel_task(&Id::from("9f2c")).await.unwrap();
        assert_eq!(ack, Ack::Null);

        let ack = client.delete_history(&Id::from(3)).await.unwrap();
        assert_eq!(ack["message"], "History deleted");

        client.delete_session(&Id::from(7)).await.unwrap();

        let deleted = recorded.deleted.lock().unwrap().clone();
        assert_eq!(deleted, vec!["task:9f2c", "history:3", "session:7"]);
    }

    #[tokio::test]
    async fn test_listing_sessions_and_histories() {
        let (client, _) = spawn_server().await;

        let sessions = client.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].summary.as_deref(), Some("what is rust"));

        let histories = client.list_histories(&Id::from(7)).await.unwrap();
        assert_eq!(histories.len(), 1);
        assert_eq!(histories[0].id, Some(Id::from(3)));
        assert_eq!(histories[0].session_id, Some(Id::from(7)));
        assert_eq!(histories[0].user_input, "what is rust");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            DeepSearchClient::new(&format!("http://{}/api", addr), Duration::from_secs(2))
                .unwrap();
        let err = client.list_sessions().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
        assert_eq!(err.code(), "list_failed");
        assert!(err.to_string().starts_with("list_failed: "));
    }
}
