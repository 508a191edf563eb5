//! Time-bucketed idempotency keys for result blobs.
//!
//! A worker run writes its results under `<prefix><query id>_<bucket>`.
//! Runs for the same query inside one bucket overwrite each other; a run in
//! a later bucket creates a new object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One hour.
pub const DEFAULT_BUCKET_WIDTH_SECS: i64 = 3600;

/// Results are attributed to the window ending two hours before the run.
pub const DEFAULT_BUCKET_OFFSET_SECS: i64 = 2 * 3600;

/// How wall-clock time is mapped onto bucket indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketPolicy {
    /// Width of one bucket in seconds. Must be positive.
    pub width_secs: i64,
    /// Offset subtracted from the current time before bucketing.
    pub offset_secs: i64,
}

impl Default for BucketPolicy {
    fn default() -> Self {
        Self {
            width_secs: DEFAULT_BUCKET_WIDTH_SECS,
            offset_secs: DEFAULT_BUCKET_OFFSET_SECS,
        }
    }
}

impl BucketPolicy {
    /// `floor((epoch_secs(now) - offset) / width)`.
    ///
    /// Uses Euclidean division so instants before the epoch still floor.
    pub fn bucket_index(&self, now: DateTime<Utc>) -> i64 {
        let shifted = now.timestamp().saturating_sub(self.offset_secs);
        shifted.div_euclid(self.width_secs.max(1))
    }

    /// Storage key for `query_id` at `now`.
    pub fn result_key(&self, prefix: &str, query_id: &str, now: DateTime<Utc>) -> String {
        format!("{prefix}{query_id}_{}", self.bucket_index(now))
    }
}
