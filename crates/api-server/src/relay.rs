//! Upload and download flows, independent of the HTTP layer.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use driveseal_crypto::password::generate_password;
use driveseal_crypto::{CryptoError, EnvelopeFormat};
use uuid::Uuid;

use crate::error::AppError;
use crate::metadata::{FileInfo, FileRecord};
use crate::routes::AppState;
use crate::storage::Quota;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A file received from a client, before sealing.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub id: String,
    pub url: String,
    pub custom_domain_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RetrievedFile {
    pub info: FileInfo,
    pub data: Bytes,
}

/// Run an upstream call under the configured timeout.
async fn upstream<T, E, F>(limit: Duration, what: &str, call: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, E>>,
    AppError: From<E>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => Err(AppError::UpstreamTimeout(format!(
            "{what} exceeded {}s",
            limit.as_secs_f32()
        ))),
    }
}

/// Seal or open on the blocking pool; key stretching is CPU-bound.
async fn run_crypto<F>(task: F) -> Result<Result<Vec<u8>, CryptoError>, AppError>
where
    F: FnOnce() -> Result<Vec<u8>, CryptoError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| AppError::Internal(format!("crypto task failed: {e}")))
}

/// Seal a file, store the blob under a random name, then record its metadata.
///
/// A failure after the blob write leaves an orphaned blob behind; nothing
/// is rolled back.
pub async fn upload(state: &AppState, file: IncomingFile) -> Result<UploadReceipt, AppError> {
    let config = &state.config;
    let limit = config.max_upload_bytes;
    if file.data.len() > limit {
        return Err(AppError::PayloadTooLarge { limit });
    }

    let format = config.envelope;
    let password = generate_password();
    let sealed = {
        let data = file.data.clone();
        let password = password.clone();
        run_crypto(move || format.seal(&data, &password))
            .await?
            .map_err(|e| AppError::Internal(format!("sealing failed: {e}")))?
    };

    let blob_name = format!("{}.dat", Uuid::new_v4());
    let blob = upstream(
        config.upstream_timeout,
        "blob upload",
        state.blobs.put(&blob_name, Bytes::from(sealed)),
    )
    .await?;

    let record = FileRecord {
        id: Uuid::new_v4().to_string(),
        blob,
        password,
        file_info: FileInfo {
            name: if file.name.is_empty() {
                blob_name.clone()
            } else {
                file.name
            },
            mime_type: if file.mime_type.is_empty() {
                DEFAULT_MIME_TYPE.to_string()
            } else {
                file.mime_type
            },
            size: file.data.len() as u64,
        },
        uploaded_at: Utc::now(),
        envelope: format,
    };

    upstream(
        config.upstream_timeout,
        "metadata insert",
        state.metadata.insert(&record),
    )
    .await
    .inspect_err(|_| {
        tracing::warn!(blob = %record.blob, "metadata insert failed, blob left orphaned");
    })?;

    tracing::info!(
        id = %record.id,
        size = record.file_info.size,
        envelope = %format,
        backend = state.blobs.kind(),
        "stored upload"
    );

    Ok(UploadReceipt {
        url: config.file_url(&record.id),
        custom_domain_url: config.custom_domain_url(&record.id),
        id: record.id,
    })
}

/// Look up a record, fetch its blob and open it with the stored password.
pub async fn download(state: &AppState, id: &str) -> Result<RetrievedFile, AppError> {
    let timeout = state.config.upstream_timeout;

    let record = upstream(timeout, "metadata lookup", state.metadata.find(id))
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    let blob = upstream(timeout, "blob download", state.blobs.get(&record.blob)).await?;

    let format: EnvelopeFormat = record.envelope;
    let password = record.password;
    let plaintext = run_crypto(move || format.open(&blob, &password))
        .await?
        .map_err(|e| match e {
            CryptoError::Authentication => AppError::Authentication(id.to_string()),
            CryptoError::Format(msg) => AppError::Format(format!("file {id}: {msg}")),
            other => AppError::Internal(format!("opening file {id}: {other}")),
        })?;

    tracing::info!(id, size = plaintext.len(), "served download");
    Ok(RetrievedFile {
        info: record.file_info,
        data: Bytes::from(plaintext),
    })
}

/// Storage figures from the blob-store provider.
pub async fn quota(state: &AppState) -> Result<Quota, AppError> {
    upstream(
        state.config.upstream_timeout,
        "quota lookup",
        state.blobs.quota(),
    )
    .await
}
