//! Typed errors for the task API
//!
//! Every failure carries the operation that produced it; the operation maps to
//! a fixed string code which is what the user ultimately sees.

use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

/// The remote operations exposed by the task API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiOp {
    CreateSession,
    CreateTask,
    GetTask,
    CancelTask,
    ListSessions,
    ListHistories,
    DeleteSession,
    DeleteHistory,
}

impl ApiOp {
    pub fn code(&self) -> &'static str {
        match self {
            ApiOp::CreateSession => "sessions_failed",
            ApiOp::CreateTask => "task_create_failed",
            ApiOp::GetTask => "task_status_failed",
            ApiOp::CancelTask => "task_cancel_failed",
            ApiOp::ListSessions => "list_failed",
            ApiOp::ListHistories => "hist_failed",
            ApiOp::DeleteSession => "del_session_failed",
            ApiOp::DeleteHistory => "del_history_failed",
        }
    }
}

impl fmt::Display for ApiOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered with a non-2xx status.
    #[error("{op}")]
    Status {
        op: ApiOp,
        status: StatusCode,
        body: String,
    },

    /// The request never produced a response (connect, timeout, body read).
    #[error("{op}: {source}")]
    Transport {
        op: ApiOp,
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not the JSON we expected.
    #[error("{op}: malformed response: {source}")]
    Decode {
        op: ApiOp,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn op(&self) -> ApiOp {
        match self {
            ApiError::Status { op, .. }
            | ApiError::Transport { op, .. }
            | ApiError::Decode { op, .. } => *op,
        }
    }

    pub fn code(&self) -> &'static str {
        self.op().code()
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// A 404 from a cancel/delete means the thing is already gone.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}
