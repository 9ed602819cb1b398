use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::{BlobRef, BlobStore, Quota, StorageError};

/// Process-local blob store for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Bytes>>,
    capacity: Option<u64>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that reports `capacity` bytes as its quota total.
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            blobs: Mutex::default(),
            capacity: Some(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }

    /// Overwrite a stored blob in place.
    pub fn replace(&self, blob: &BlobRef, data: Bytes) -> bool {
        match self.blobs.lock().get_mut(blob.as_str()) {
            Some(slot) => {
                *slot = data;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, blob: &BlobRef) -> Option<Bytes> {
        self.blobs.lock().remove(blob.as_str())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, name: &str, data: Bytes) -> Result<BlobRef, StorageError> {
        self.blobs.lock().insert(name.to_string(), data);
        Ok(BlobRef(name.to_string()))
    }

    async fn get(&self, blob: &BlobRef) -> Result<Bytes, StorageError> {
        self.blobs
            .lock()
            .get(blob.as_str())
            .cloned()
            .ok_or_else(|| StorageError::NotFound(blob.to_string()))
    }

    async fn quota(&self) -> Result<Quota, StorageError> {
        let used = self.blobs.lock().values().map(|b| b.len() as u64).sum();
        Ok(Quota::new(used, self.capacity))
    }
}
