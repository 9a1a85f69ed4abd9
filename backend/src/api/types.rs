//! REST API types.
//!
//! Every error body has the shape `{ "status": "error", "error": "..." }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{LoadError, OpError, ServerError, SessionError};
use crate::session::{LoadOutcome, SessionSummary};

/// Response to `POST /api/sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreated {
    pub id: Uuid,
}

/// Response to an upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Always "ok"
    pub status: &'static str,
    pub outcome: LoadOutcome,
    pub size_bytes: usize,
    pub session: SessionSummary,
}

/// Response to an applied operation or a reset.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub status: &'static str,
    pub session: SessionSummary,
}

impl SessionResponse {
    pub fn ok(session: SessionSummary) -> Self {
        Self {
            status: "ok",
            session,
        }
    }
}

/// Query of `GET /preview`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PreviewQuery {
    #[serde(default = "default_head")]
    pub head: usize,
    #[serde(default)]
    pub tail: usize,
}

fn default_head() -> usize {
    10
}

/// Query of `GET /correlation`.
#[derive(Debug, Clone, Deserialize)]
pub struct CorrelationQuery {
    #[serde(default)]
    pub method: Option<String>,
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Session(SessionError::NoTable) => StatusCode::CONFLICT,
            ServerError::Session(SessionError::Op(OpError::ColumnNotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            ServerError::Session(SessionError::Op(_)) => StatusCode::BAD_REQUEST,
            ServerError::Session(SessionError::Load(LoadError::Io(_))) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServerError::Session(SessionError::Load(_)) => StatusCode::BAD_REQUEST,
            ServerError::Session(SessionError::Export(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnKind;

    #[test]
    fn test_error_response_shape() {
        let body = error_response("boom");
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "boom");
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ServerError::Session(SessionError::NoTable), StatusCode::CONFLICT),
            (
                ServerError::Session(OpError::ColumnNotFound("x".into()).into()),
                StatusCode::NOT_FOUND,
            ),
            (
                ServerError::Session(OpError::type_mismatch("x", "number", ColumnKind::Text).into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServerError::Session(LoadError::Parse("bad".into()).into()),
                StatusCode::BAD_REQUEST,
            ),
            (ServerError::NotFound("session".into()), StatusCode::NOT_FOUND),
            (ServerError::PayloadTooLarge(10), StatusCode::PAYLOAD_TOO_LARGE),
            (
                ServerError::Internal("task panicked".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{}", err);
        }
    }
}
