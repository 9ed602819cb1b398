//! Metadata records: which blob holds a file, and the password that opens it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use driveseal_crypto::EnvelopeFormat;
use serde::{Deserialize, Serialize};

use crate::config::MetadataConfig;
use crate::storage::BlobRef;

pub mod memory;
pub mod mongo;

pub use memory::MemoryMetadataStore;
pub use mongo::MongoMetadataStore;

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata store connection failed: {0}")]
    Connection(String),

    #[error("metadata query failed: {0}")]
    Query(String),

    #[error("duplicate file id: {0}")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

/// One uploaded file.
///
/// The password is the only key material for the blob and sits here in
/// clear, so the metadata store must be trusted as much as the blob store.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "drive_id")]
    pub blob: BlobRef,
    pub password: String,
    pub file_info: FileInfo,
    /// A BSON Date, the type existing records in the collection carry.
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub uploaded_at: DateTime<Utc>,
    /// Absent on records written before the obfuscated envelope existed.
    #[serde(default)]
    pub envelope: EnvelopeFormat,
}

impl std::fmt::Debug for FileRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRecord")
            .field("id", &self.id)
            .field("blob", &self.blob)
            .field("password", &"<redacted>")
            .field("file_info", &self.file_info)
            .field("uploaded_at", &self.uploaded_at)
            .field("envelope", &self.envelope)
            .finish()
    }
}

/// Records are written once after a successful blob write and never updated.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn insert(&self, record: &FileRecord) -> Result<(), MetadataError>;

    async fn find(&self, id: &str) -> Result<Option<FileRecord>, MetadataError>;
}

pub fn connect(config: &MetadataConfig) -> Arc<dyn MetadataStore> {
    match config {
        MetadataConfig::Mongo { uri, database } => {
            Arc::new(MongoMetadataStore::new(uri.clone(), database.clone()))
        }
        MetadataConfig::Memory => Arc::new(MemoryMetadataStore::new()),
    }
}

#[cfg(test)]
pub(crate) fn sample_record(id: &str) -> FileRecord {
    FileRecord {
        id: id.to_string(),
        blob: BlobRef(format!("{id}.dat")),
        password: "s3cr3t-password".into(),
        file_info: FileInfo {
            name: "a.txt".into(),
            mime_type: "text/plain".into(),
            size: 10,
        },
        // BSON dates keep millisecond precision.
        uploaded_at: DateTime::from_timestamp_millis(1_735_689_600_123).unwrap(),
        envelope: EnvelopeFormat::Plain,
    }
}
