//! Blob-store backends holding sealed envelopes.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::BlobConfig;

pub mod drive;
pub mod github;
pub mod memory;
pub mod s3;

pub use drive::DriveBlobStore;
pub use github::GitHubBlobStore;
pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    Upstream(String),
}

/// Opaque handle into a blob store (Drive file id, repository path, object key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(pub String);

impl BlobRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage figures reported by the provider, in bytes.
///
/// `total` and `free` are absent for accounts without a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub used: u64,
    pub total: Option<u64>,
    pub free: Option<u64>,
}

impl Quota {
    pub fn new(used: u64, total: Option<u64>) -> Self {
        Self {
            used,
            total,
            free: total.map(|t| t.saturating_sub(used)),
        }
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend name, used in logs.
    fn kind(&self) -> &'static str;

    /// Store `data` under `name` and return the handle to fetch it again.
    async fn put(&self, name: &str, data: Bytes) -> Result<BlobRef, StorageError>;

    async fn get(&self, blob: &BlobRef) -> Result<Bytes, StorageError>;

    async fn quota(&self) -> Result<Quota, StorageError> {
        Err(StorageError::Unsupported(format!(
            "the {} backend does not report storage quota",
            self.kind()
        )))
    }
}

/// Build the blob store selected by the configuration.
pub async fn connect(config: &BlobConfig, http: reqwest::Client) -> Arc<dyn BlobStore> {
    match config {
        BlobConfig::Drive(drive) => Arc::new(DriveBlobStore::new(drive.clone(), http)),
        BlobConfig::GitHub(github) => Arc::new(GitHubBlobStore::new(github.clone(), http)),
        BlobConfig::S3(s3) => Arc::new(S3BlobStore::connect(s3).await),
        BlobConfig::Memory => Arc::new(MemoryBlobStore::new()),
    }
}

/// Map a non-success provider response to a [`StorageError`].
pub(crate) async fn check_response(
    what: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, StorageError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(StorageError::NotFound(format!("{what}: {body}")));
    }
    Err(StorageError::Upstream(format!(
        "{what} failed (HTTP {status}): {body}"
    )))
}

pub(crate) fn transport_error(what: &str, err: reqwest::Error) -> StorageError {
    StorageError::Upstream(format!("{what}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_free_is_derived() {
        let quota = Quota::new(250, Some(1000));
        assert_eq!(quota.free, Some(750));

        let unlimited = Quota::new(250, None);
        assert_eq!(unlimited.free, None);

        let over = Quota::new(1200, Some(1000));
        assert_eq!(over.free, Some(0));
    }

    #[tokio::test]
    async fn quota_defaults_to_unsupported() {
        struct Bare;

        #[async_trait]
        impl BlobStore for Bare {
            fn kind(&self) -> &'static str {
                "bare"
            }
            async fn put(&self, name: &str, _data: Bytes) -> Result<BlobRef, StorageError> {
                Ok(BlobRef(name.to_string()))
            }
            async fn get(&self, blob: &BlobRef) -> Result<Bytes, StorageError> {
                Err(StorageError::NotFound(blob.to_string()))
            }
        }

        assert!(matches!(
            Bare.quota().await,
            Err(StorageError::Unsupported(msg)) if msg.contains("bare")
        ));
    }
}
