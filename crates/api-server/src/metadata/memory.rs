use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{FileRecord, MetadataError, MetadataStore};

#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    records: RwLock<HashMap<String, FileRecord>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert(&self, record: &FileRecord) -> Result<(), MetadataError> {
        let mut records = self.records.write();
        if records.contains_key(&record.id) {
            return Err(MetadataError::Duplicate(record.id.clone()));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<FileRecord>, MetadataError> {
        Ok(self.records.read().get(id).cloned())
    }
}
