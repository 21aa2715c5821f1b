use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

/// Canonical JSON payload for error responses.
#[derive(Debug, Serialize, Clone)]
pub struct ApiMessage {
    pub message: String,
}

impl ApiMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error half of every JSON handler's return type.
pub type ApiFailure = (StatusCode, Json<ApiMessage>);

/// Response for writes that only need to report which row they touched.
#[derive(Debug, Serialize, Clone)]
pub struct RecordRef {
    pub id: Uuid,
}

impl RecordRef {
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }
}

/// Helper for controllers that need to return `(StatusCode, Json<ApiMessage>)`.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> ApiFailure {
    (status, Json(ApiMessage::new(message)))
}

pub fn not_found(message: impl Into<String>) -> ApiFailure {
    json_error(StatusCode::NOT_FOUND, message)
}

pub fn bad_request(message: impl Into<String>) -> ApiFailure {
    json_error(StatusCode::BAD_REQUEST, message)
}

/// Logs the underlying cause and hides it behind a generic 500.
pub fn internal_error(err: anyhow::Error) -> ApiFailure {
    error!(?err, "request failed");
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error, please try again later.",
    )
}
