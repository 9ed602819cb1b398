use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::metadata::MetadataError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("file exceeds the {limit} byte upload limit")]
    PayloadTooLarge { limit: usize },

    #[error("not found: {0}")]
    NotFound(String),

    /// Tag verification failed while opening a stored blob.
    #[error("authentication failed for file {0}")]
    Authentication(String),

    /// A stored blob is too short or misaligned to be an envelope.
    #[error("malformed envelope: {0}")]
    Format(String),

    #[error("not supported: {0}")]
    Unsupported(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("upstream timed out: {0}")]
    UpstreamTimeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status, machine-readable code and client-facing message.
    ///
    /// Upstream and internal details are logged here and replaced by a
    /// generic message in the response.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::PayloadTooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                self.to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "FILE_NOT_FOUND", msg.clone()),
            AppError::Authentication(_) | AppError::Format(_) => {
                tracing::error!("stored file unreadable: {self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "FILE_UNREADABLE",
                    "The stored file could not be decrypted.".into(),
                )
            }
            AppError::Unsupported(msg) => {
                (StatusCode::NOT_IMPLEMENTED, "NOT_SUPPORTED", msg.clone())
            }
            AppError::Upstream(msg) => {
                tracing::error!("upstream error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "The storage provider request failed.".into(),
                )
            }
            AppError::UpstreamTimeout(msg) => {
                tracing::error!("upstream timeout: {msg}");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "UPSTREAM_TIMEOUT",
                    "The storage provider did not respond in time.".into(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred.".into(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = json!({
            "success": false,
            "error": {
                "code": code,
                "message": message,
            }
        });

        (status, Json(body)).into_response()
    }
}

/// Renders an [`AppError`] as a plain-text body, for routes that serve file
/// bytes rather than JSON.
#[derive(Debug)]
pub struct PlainTextError(pub AppError);

impl From<AppError> for PlainTextError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for PlainTextError {
    fn into_response(self) -> Response {
        let (status, _, message) = self.0.parts();
        (status, message).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unsupported(what) => AppError::Unsupported(what),
            // A record pointing at a missing blob is an inconsistency on the
            // provider side, not an unknown identifier.
            StorageError::NotFound(msg) => AppError::Upstream(format!("blob missing: {msg}")),
            StorageError::Upstream(msg) => AppError::Upstream(msg),
        }
    }
}

impl From<MetadataError> for AppError {
    fn from(err: MetadataError) -> Self {
        AppError::Upstream(err.to_string())
    }
}
