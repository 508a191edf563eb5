//! Configuration types for the dispatch/worker pipeline.

use crate::bucket::BucketPolicy;
use crate::error::{PipelineError, Result};
use pw3_search::SearchConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the blob-store bucket. Required.
pub const BUCKET_NAME_ENV: &str = "BUCKET_NAME";

/// Environment variable holding the optional provider API key.
pub const API_KEY_ENV: &str = "PW3API_KEY";

/// Top-level configuration for the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bucket holding query packs and result blobs.
    pub bucket_name: String,
    /// Prefix swept for query packs on scheduled runs.
    pub packs_prefix: String,
    /// Prefix result blobs are written under.
    pub results_prefix: String,
    /// Root directory for the local file-backed store and queue.
    pub data_dir: PathBuf,
    /// Queue settings.
    pub queue: QueueConfig,
    /// Result-key bucketing.
    pub bucket: BucketPolicy,
    /// Search provider settings.
    pub provider: SearchConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bucket_name: String::new(),
            packs_prefix: "packs/".to_owned(),
            results_prefix: "results/".to_owned(),
            data_dir: PathBuf::from("pw3query-data"),
            queue: QueueConfig::default(),
            bucket: BucketPolicy::default(),
            provider: SearchConfig::default(),
        }
    }
}

/// When the worker deletes a received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Delete before processing. A failed run loses the message.
    #[default]
    OnReceipt,
    /// Delete once the message reached a final outcome. Provider and
    /// storage failures leave it to reappear after the visibility timeout.
    AfterStore,
}

/// Queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue name.
    pub name: String,
    /// Message group every query is sent to.
    pub group_id: String,
    /// How long a received message stays hidden from other workers.
    pub visibility_timeout_secs: u64,
    /// How long a receive waits for a message. Zero polls once.
    pub wait_time_secs: u64,
    /// When received messages are deleted.
    pub delete_policy: DeletePolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "PW3Query-Queue.fifo".to_owned(),
            group_id: "PW3QueryGroup".to_owned(),
            visibility_timeout_secs: 180,
            wait_time_secs: 0,
            delete_policy: DeletePolicy::OnReceipt,
        }
    }
}

impl QueueConfig {
    /// Visibility timeout as a [`Duration`].
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    /// Receive wait time as a [`Duration`].
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time_secs)
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Overlay `BUCKET_NAME` and `PW3API_KEY` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Overlay settings from an environment lookup.
    ///
    /// Unset variables leave the current value alone.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bucket) = lookup(BUCKET_NAME_ENV) {
            self.bucket_name = bucket;
        }
        if let Some(key) = lookup(API_KEY_ENV) {
            self.provider.api_key = Some(key).filter(|k| !k.is_empty());
        }
    }

    /// Check that the pipeline can run with this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.bucket_name.trim().is_empty() {
            return Err(PipelineError::Config(format!(
                "'{BUCKET_NAME_ENV}' not found in environment variables"
            )));
        }
        if self.packs_prefix.is_empty() {
            return Err(PipelineError::Config("packs_prefix must not be empty".into()));
        }
        if self.queue.group_id.is_empty() {
            return Err(PipelineError::Config("queue.group_id must not be empty".into()));
        }
        if self.queue.name.is_empty() {
            return Err(PipelineError::Config("queue.name must not be empty".into()));
        }
        if self.bucket.width_secs <= 0 {
            return Err(PipelineError::Config(
                "bucket.width_secs must be greater than 0".into(),
            ));
        }
        self.provider
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Returns the default config file path: `~/.config/pw3query/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("pw3query").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("pw3query")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/pw3query-config/config.toml")
        }
    }
}
