//! In-process blob store.

use super::{BlobStore, is_direct_child};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Blob store backed by a sorted in-memory map.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// `true` when nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| PipelineError::Storage(format!("no such key: {key}")))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.objects.write().await.insert(key.to_owned(), body);
        Ok(())
    }

    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> Result<Vec<String>> {
        Ok(self
            .objects
            .read()
            .await
            .range(prefix.to_owned()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(prefix))
            .filter(|k| is_direct_child(k, prefix, delimiter))
            .cloned()
            .collect())
    }
}
