//! MongoDB-backed metadata store.

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::{Client, Collection};
use tokio::sync::OnceCell;

use super::{FileRecord, MetadataError, MetadataStore};

pub const COLLECTION: &str = "files";

const DUPLICATE_KEY: i32 = 11000;

/// The collection handle is created on first use and shared by every
/// request afterwards. Concurrent first requests wait on one initialization.
pub struct MongoMetadataStore {
    uri: String,
    database: String,
    collection: OnceCell<Collection<FileRecord>>,
}

impl MongoMetadataStore {
    pub fn new(uri: String, database: String) -> Self {
        Self {
            uri,
            database,
            collection: OnceCell::new(),
        }
    }

    async fn collection(&self) -> Result<&Collection<FileRecord>, MetadataError> {
        self.collection
            .get_or_try_init(|| async {
                tracing::info!(database = %self.database, "connecting to mongodb");
                let client = Client::with_uri_str(&self.uri)
                    .await
                    .map_err(|e| MetadataError::Connection(e.to_string()))?;
                Ok(client.database(&self.database).collection(COLLECTION))
            })
            .await
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl MetadataStore for MongoMetadataStore {
    async fn insert(&self, record: &FileRecord) -> Result<(), MetadataError> {
        self.collection()
            .await?
            .insert_one(record)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    MetadataError::Duplicate(record.id.clone())
                } else {
                    MetadataError::Query(e.to_string())
                }
            })?;
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<FileRecord>, MetadataError> {
        self.collection()
            .await?
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| MetadataError::Query(e.to_string()))
    }
}
