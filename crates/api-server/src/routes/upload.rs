use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::{routing::post, Json, Router};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::AppError;
use crate::relay::{self, IncomingFile};

/// Room for multipart boundaries and part headers on top of the file itself.
pub const MULTIPART_SLACK: usize = 64 * 1024;

/// Form field names accepted for the file part.
const FILE_FIELDS: [&str; 2] = ["file", "files"];

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/api/upload", post(upload))
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(MULTIPART_SLACK),
        ))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_domain_url: Option<String>,
}

async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let limit = state.config.max_upload_bytes;

    let file = read_file_part(&mut multipart, limit)
        .await
        .inspect_err(|e| tracing::warn!("rejected upload: {e}"))?
        .ok_or_else(|| AppError::BadRequest("No file was uploaded.".into()))?;

    let receipt = relay::upload(&state, file).await?;
    Ok(Json(UploadResponse {
        success: true,
        id: receipt.id,
        url: receipt.url,
        custom_domain_url: receipt.custom_domain_url,
    }))
}

/// Pull the file part out of the form, enforcing the size ceiling while
/// reading so an oversized part is never fully buffered.
///
/// The file is the first part named `file`/`files`, or failing that the
/// first part that carries a filename. A part with an empty filename and no
/// content is what browsers send when nothing was selected, and counts as
/// no file.
async fn read_file_part(
    multipart: &mut Multipart,
    limit: usize,
) -> Result<Option<IncomingFile>, AppError> {
    let map_err = |err: MultipartError| {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge { limit }
        } else {
            AppError::BadRequest(err.body_text())
        }
    };

    while let Some(mut field) = multipart.next_field().await.map_err(map_err)? {
        let named = field.name().is_some_and(|n| FILE_FIELDS.contains(&n));
        if !named && field.file_name().is_none() {
            continue;
        }

        let name = field.file_name().unwrap_or_default().to_string();
        let mime_type = field.content_type().unwrap_or_default().to_string();

        let mut data = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(map_err)? {
            if data.len() + chunk.len() > limit {
                return Err(AppError::PayloadTooLarge { limit });
            }
            data.extend_from_slice(&chunk);
        }

        if name.is_empty() && data.is_empty() {
            continue;
        }

        return Ok(Some(IncomingFile {
            name,
            mime_type,
            data: data.freeze(),
        }));
    }

    Ok(None)
}
