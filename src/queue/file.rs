//! File-backed queue for running the dispatcher and worker as separate
//! processes on one machine.
//!
//! The queue state is persisted to `<data_dir>/<queue name>.json` after
//! every operation. Each load, change and save runs under an exclusive
//! `flock` on the sidecar `<queue name>.json.lock`, so handles in different
//! processes see each other's sends and never share a delivery.

use super::memory::{QueueState, now_epoch_millis};
use super::{MessageQueue, ReceivedMessage};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Persisted queue file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct QueueFile {
    /// Schema version.
    #[serde(default = "default_file_version")]
    version: u8,
    #[serde(default)]
    state: QueueState,
}

fn default_file_version() -> u8 {
    1
}

/// Queue whose contents survive process restarts.
#[derive(Debug)]
pub struct FileQueue {
    path: PathBuf,
    // Keeps this handle's blocking tasks from queueing up on the file lock.
    local: Mutex<()>,
}

impl FileQueue {
    /// Open (or lazily create) the queue named `name` under `data_dir`.
    pub fn new(data_dir: &Path, name: &str) -> Self {
        Self {
            path: data_dir.join(format!("{name}.json")),
            local: Mutex::new(()),
        }
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `(stored, in_flight)` message counts.
    pub async fn depth(&self) -> Result<(usize, usize)> {
        self.locked(|path| {
            let file = load(path)?;
            Ok((file.state.len(), file.state.in_flight(now_epoch_millis())))
        })
        .await
    }

    /// Load, apply `op`, and persist, holding the file lock throughout.
    async fn update<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut QueueState) -> Result<T> + Send + 'static,
    {
        self.locked(move |path| {
            let mut file = load(path)?;
            let out = op(&mut file.state)?;
            save(path, &file)?;
            Ok(out)
        })
        .await
    }

    /// Run `f` on a blocking thread while holding the exclusive file lock.
    async fn locked<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T> + Send + 'static,
    {
        let _guard = self.local.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || with_file_lock(&path, f))
            .await
            .map_err(|e| PipelineError::Queue(format!("queue task failed: {e}")))?
    }
}

fn lock_path(path: &Path) -> PathBuf {
    path.with_extension("json.lock")
}

fn with_file_lock<T>(path: &Path, f: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path(path))?;
    let mut lock = fd_lock::RwLock::new(lock_file);
    let _held = lock.write().map_err(|e| {
        PipelineError::Queue(format!("cannot lock queue state {}: {e}", path.display()))
    })?;
    f(path)
}

fn load(path: &Path) -> Result<QueueFile> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(QueueFile::default()),
        Err(e) => Err(PipelineError::Queue(format!(
            "cannot read queue state {}: {e}",
            path.display()
        ))),
    }
}

fn save(path: &Path, file: &QueueFile) -> Result<()> {
    let content = serde_json::to_vec_pretty(file)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    debug!("saved queue state to {}", path.display());
    Ok(())
}

#[async_trait]
impl MessageQueue for FileQueue {
    async fn send(&self, body: String, group_id: &str) -> Result<String> {
        let group_id = group_id.to_owned();
        self.update(move |state| Ok(state.send(body, &group_id))).await
    }

    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
        wait_time: Duration,
    ) -> Result<Vec<ReceivedMessage>> {
        let deadline = tokio::time::Instant::now() + wait_time;
        loop {
            let delivered = self
                .update(move |state| {
                    Ok(state.receive_at(now_epoch_millis(), max_messages, visibility_timeout))
                })
                .await?;
            if !delivered.is_empty() || tokio::time::Instant::now() >= deadline {
                return Ok(delivered);
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        let receipt_handle = receipt_handle.to_owned();
        self.update(move |state| state.delete(&receipt_handle)).await
    }
}
