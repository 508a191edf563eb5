//! Directory-backed blob store for local runs.
//!
//! Each bucket is a directory under the data dir; object keys map to
//! relative file paths, with `/` as the separator. Writes go to a temporary
//! sibling first and are renamed into place so readers never see a partial
//! object.

use super::{BlobStore, is_direct_child};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Blob store rooted at `<data_dir>/<bucket>`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store for `bucket` under `data_dir`.
    pub fn new(data_dir: &Path, bucket: &str) -> Self {
        Self {
            root: data_dir.join(bucket),
        }
    }

    /// Directory holding this bucket's objects.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(PipelineError::Storage(format!("invalid object key: {key:?}")));
        }
        Ok(self.root.join(relative))
    }

    /// Directory holding every key that starts with `prefix`.
    fn dir_for_prefix(&self, prefix: &str) -> Result<PathBuf> {
        match prefix.rfind('/') {
            Some(end) if end > 0 => self.path_for(&prefix[..end]),
            _ => Ok(self.root.clone()),
        }
    }

    /// Object keys under `start`, descending into subdirectories only when
    /// `recursive` is set.
    async fn walk(&self, start: PathBuf, recursive: bool) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    if recursive {
                        pending.push(path);
                    }
                    continue;
                }
                if let Some(key) = self.key_for(&path) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect();
        let key = parts?.join("/");
        // In-flight writes from `put`.
        (!key.ends_with(".partial")).then_some(key)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| PipelineError::Storage(format!("read {key}: {e}")))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp = path.clone().into_os_string();
        tmp.push(".partial");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| PipelineError::Storage(format!("write {key}: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| PipelineError::Storage(format!("rename {key}: {e}")))?;
        Ok(())
    }

    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> Result<Vec<String>> {
        // With `/` as delimiter only the prefix directory itself can hold matches.
        let recursive = delimiter != Some("/");
        let start = self.dir_for_prefix(prefix)?;
        Ok(self
            .walk(start, recursive)
            .await?
            .into_iter()
            .filter(|k| is_direct_child(k, prefix, delimiter))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_creates_nested_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path(), "bucket");
        store
            .put("results/q1_123", b"[]".to_vec())
            .await
            .expect("put");
        assert!(store.root().join("results").join("q1_123").exists());
        assert_eq!(store.get("results/q1_123").await.expect("get"), b"[]");
    }

    #[tokio::test]
    async fn list_one_level_under_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path(), "bucket");
        for key in ["packs/a.json", "packs/b.json", "packs/old/c.json", "results/x"] {
            store.put(key, b"{}".to_vec()).await.expect("put");
        }
        let keys = store.list("packs/", Some("/")).await.expect("list");
        assert_eq!(keys, vec!["packs/a.json", "packs/b.json"]);
    }

    #[tokio::test]
    async fn list_missing_bucket_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path(), "absent");
        assert!(store.list("packs/", Some("/")).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn traversal_keys_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path(), "bucket");
        assert!(store.put("../escape", Vec::new()).await.is_err());
        assert!(store.put("/abs", Vec::new()).await.is_err());
        assert!(store.get("").await.is_err());
    }

    #[tokio::test]
    async fn missing_object_is_storage_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path(), "bucket");
        let err = store.get("packs/none.json").await.unwrap_err();
        assert!(matches!(err, PipelineError::Storage(_)));
    }

    #[tokio::test]
    async fn one_level_listing_reads_only_the_prefix_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path(), "bucket");
        for key in ["packs/a.json", "packs/old/c.json", "results/q1_1", "results/q2_1"] {
            store.put(key, b"{}".to_vec()).await.expect("put");
        }

        let start = store.dir_for_prefix("packs/").expect("prefix dir");
        assert_eq!(start, store.root().join("packs"));
        assert_eq!(store.walk(start, false).await.expect("walk"), vec!["packs/a.json"]);
    }

    #[tokio::test]
    async fn recursive_listing_without_delimiter() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path(), "bucket");
        for key in ["packs/a.json", "packs/old/c.json", "results/x"] {
            store.put(key, b"{}".to_vec()).await.expect("put");
        }
        let keys = store.list("packs/", None).await.expect("list");
        assert_eq!(keys, vec!["packs/a.json", "packs/old/c.json"]);
        let all = store.list("", None).await.expect("list");
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn partial_prefix_lists_from_parent_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path(), "bucket");
        for key in ["results/q1_1", "results/q2_1", "results/q10_1"] {
            store.put(key, b"[]".to_vec()).await.expect("put");
        }
        let keys = store.list("results/q1", Some("/")).await.expect("list");
        assert_eq!(keys, vec!["results/q10_1", "results/q1_1"]);
    }
}
