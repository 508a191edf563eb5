//! Worker: processes exactly one queued query per invocation.
//!
//! ```text
//! Idle → Dequeued → Deleted → Validated → Queried → Formatted → Stored | Skipped
//! ```
//!
//! A malformed message ends the run as [`WorkerOutcome::Rejected`]. A
//! provider failure ends it with [`PipelineError::Provider`]. A failed write
//! is logged and reported as [`WorkerOutcome::StoreFailed`]. Nothing is
//! retried, and with [`DeletePolicy::OnReceipt`] the message is already gone
//! by the time any of these happen.

use crate::bucket::BucketPolicy;
use crate::config::{DeletePolicy, PipelineConfig, QueueConfig};
use crate::error::{PipelineError, Result};
use crate::pack::{ValidatedQuery, ValidationError, validate_message};
use crate::queue::{MessageQueue, ReceivedMessage};
use crate::store::BlobStore;
use chrono::{DateTime, Utc};
use pw3_search::{SearchProvider, parse_export};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Source of the current time, used for result keys.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// One normalised result row, as written to the result blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Matching website domain.
    pub domain: String,
    /// Provider rank, verbatim.
    pub rank: String,
    /// Source excerpt; empty when not requested or not returned.
    pub snippet: String,
    /// Query identifier from the pack.
    #[serde(rename = "queryId")]
    pub query_id: String,
    /// Search string.
    pub query: String,
    /// Classification label.
    pub category: String,
    /// Free text from the pack.
    pub notes: String,
}

/// Turn provider export text into result records for `query`.
///
/// Lines with fewer than two fields are dropped; order is preserved.
pub fn format_results(query: &ValidatedQuery, export: &str) -> Vec<ResultRecord> {
    let definition = &query.definition;
    parse_export(export)
        .into_iter()
        .map(|line| ResultRecord {
            domain: line.domain,
            rank: line.rank,
            snippet: line.snippet,
            query_id: query.query_id.clone(),
            query: definition.query.clone(),
            category: definition.category.clone(),
            notes: definition.notes.clone(),
        })
        .collect()
}

/// How a single invocation ended, short of a provider failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The queue had nothing to deliver.
    Idle,
    /// The message failed validation and was discarded.
    Rejected {
        /// Queue id of the discarded message.
        message_id: String,
        /// What was wrong with it.
        error: ValidationError,
    },
    /// The provider returned an empty body; nothing was written.
    NoResults {
        /// Query identifier.
        query_id: String,
    },
    /// Results were written.
    Stored {
        /// Query identifier.
        query_id: String,
        /// Result blob key.
        key: String,
        /// Number of records in the blob.
        records: usize,
    },
    /// The result write failed and was not retried.
    StoreFailed {
        /// Query identifier.
        query_id: String,
        /// Result blob key that was attempted.
        key: String,
        /// Error text.
        reason: String,
    },
}

impl WorkerOutcome {
    /// `true` if a message was taken off the queue.
    pub fn consumed_message(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Pulls one message, queries the provider, and stores the results.
pub struct Worker<P> {
    queue: Arc<dyn MessageQueue>,
    store: Arc<dyn BlobStore>,
    provider: P,
    queue_config: QueueConfig,
    results_prefix: String,
    bucket: BucketPolicy,
    clock: Clock,
}

impl<P: SearchProvider> Worker<P> {
    /// Create a worker over injected collaborators.
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        store: Arc<dyn BlobStore>,
        provider: P,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            queue,
            store,
            provider,
            queue_config: config.queue.clone(),
            results_prefix: config.results_prefix.clone(),
            bucket: config.bucket,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock used for result keys.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Run one invocation.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Queue`] if receiving or deleting fails, and
    /// [`PipelineError::Provider`] if the provider call fails.
    pub async fn run_once(&self) -> Result<WorkerOutcome> {
        let Some(message) = self.dequeue().await? else {
            debug!("no queued queries");
            return Ok(WorkerOutcome::Idle);
        };
        debug!(message_id = %message.message_id, body = %message.body, "dequeued");

        let policy = self.queue_config.delete_policy;
        if policy == DeletePolicy::OnReceipt {
            self.delete(&message).await?;
        }

        let query = match validate_message(&message.body) {
            Ok(query) => query,
            Err(error) => {
                warn!(message_id = %message.message_id, "discarding invalid message: {error}");
                if policy == DeletePolicy::AfterStore {
                    self.delete(&message).await?;
                }
                return Ok(WorkerOutcome::Rejected {
                    message_id: message.message_id,
                    error,
                });
            }
        };
        debug!(query_id = %query.query_id, "validated");

        let format = query.definition.export_format();
        let export = match self
            .provider
            .fetch_export(&query.definition.query, format)
            .await
        {
            Ok(export) => export,
            Err(e) => {
                error!(
                    query_id = %query.query_id,
                    provider = self.provider.name(),
                    "error in {} request: {e}",
                    self.provider.name()
                );
                return Err(PipelineError::Provider(e));
            }
        };

        if export.is_empty() {
            info!(query_id = %query.query_id, "no {} results", self.provider.name());
            if policy == DeletePolicy::AfterStore {
                self.delete(&message).await?;
            }
            return Ok(WorkerOutcome::NoResults {
                query_id: query.query_id,
            });
        }

        let records = format_results(&query, &export);
        debug!(query_id = %query.query_id, records = records.len(), "formatted");

        let key = self
            .bucket
            .result_key(&self.results_prefix, &query.query_id, (self.clock)());
        let outcome = match self.store_records(&key, &records).await {
            Ok(()) => {
                info!(query_id = %query.query_id, %key, records = records.len(), "results stored");
                WorkerOutcome::Stored {
                    query_id: query.query_id,
                    key,
                    records: records.len(),
                }
            }
            Err(e) => {
                warn!(query_id = %query.query_id, %key, "error writing results: {e}");
                return Ok(WorkerOutcome::StoreFailed {
                    query_id: query.query_id,
                    key,
                    reason: e.to_string(),
                });
            }
        };

        if policy == DeletePolicy::AfterStore {
            self.delete(&message).await?;
        }
        Ok(outcome)
    }

    /// Run invocations until the queue reports nothing to deliver.
    ///
    /// Provider failures are logged. With [`DeletePolicy::OnReceipt`] the
    /// drain moves on to the next message; with [`DeletePolicy::AfterStore`]
    /// it stops there, because the failed message stays hidden until its
    /// visibility timeout lapses. Returns every outcome collected before the
    /// queue went idle or the drain stopped.
    ///
    /// # Errors
    ///
    /// Stops at the first queue error.
    pub async fn drain(&self) -> Result<Vec<WorkerOutcome>> {
        let mut outcomes = Vec::new();
        loop {
            match self.run_once().await {
                Ok(WorkerOutcome::Idle) => return Ok(outcomes),
                Ok(outcome) => outcomes.push(outcome),
                Err(PipelineError::Provider(e)) => {
                    warn!("query abandoned after provider failure: {e}");
                    if self.queue_config.delete_policy == DeletePolicy::AfterStore {
                        // The failed message is hidden, not gone; stop rather than spin.
                        return Ok(outcomes);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn dequeue(&self) -> Result<Option<ReceivedMessage>> {
        let mut messages = self
            .queue
            .receive(
                1,
                self.queue_config.visibility_timeout(),
                self.queue_config.wait_time(),
            )
            .await?;
        Ok(messages.pop())
    }

    async fn delete(&self, message: &ReceivedMessage) -> Result<()> {
        self.queue
            .delete(&message.receipt_handle)
            .await
            .inspect_err(|e| {
                error!(message_id = %message.message_id, "cannot delete message: {e}");
            })?;
        debug!(message_id = %message.message_id, "deleted");
        Ok(())
    }

    async fn store_records(&self, key: &str, records: &[ResultRecord]) -> Result<()> {
        let body = serde_json::to_vec(records)?;
        self.store.put(key, body).await
    }
}
