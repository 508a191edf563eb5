//! Trait definition for pluggable search provider backends.
//!
//! The pipeline only needs the raw export text for one query; parsing is
//! done by [`crate::export::parse_export`] so providers stay thin and test
//! doubles can return canned text.

use crate::error::SearchError;
use crate::types::ExportFormat;

/// A search provider that exports matches for a single query.
///
/// All implementations must be `Send + Sync` so a worker can hold one for
/// the lifetime of the process.
pub trait SearchProvider: Send + Sync {
    /// Run `query` and return the provider's export body verbatim.
    ///
    /// # Arguments
    ///
    /// * `query` — The raw search string; the implementation handles encoding.
    /// * `format` — Which export format to request.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the request fails, times out, or the
    /// provider answers with a non-success status. Implementations must not
    /// retry.
    fn fetch_export(
        &self,
        query: &str,
        format: ExportFormat,
    ) -> impl std::future::Future<Output = Result<String, SearchError>> + Send;

    /// Human-readable provider name for logs.
    fn name(&self) -> &'static str;
}
