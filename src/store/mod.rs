//! Blob storage collaborators.
//!
//! The pipeline only needs three operations from object storage: read a
//! key, write a key, and list keys under a prefix one level deep. Query
//! packs are read by the dispatcher; result blobs are written by the worker.

pub mod fs;
pub mod memory;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

use crate::error::Result;
use async_trait::async_trait;

/// Key/value object storage with list-by-prefix.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the object at `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Create or overwrite the object at `key`.
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;

    /// List object keys starting with `prefix`, sorted.
    ///
    /// With a `delimiter`, keys containing the delimiter after the prefix
    /// are rolled up into common prefixes and not returned.
    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> Result<Vec<String>>;
}

/// `true` when `key` is a direct child of `prefix` under `delimiter`.
pub(crate) fn is_direct_child(key: &str, prefix: &str, delimiter: Option<&str>) -> bool {
    let Some(rest) = key.strip_prefix(prefix) else {
        return false;
    };
    match delimiter {
        Some(d) if !d.is_empty() => !rest.contains(d),
        _ => true,
    }
}
