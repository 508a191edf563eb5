//! Error types for the pw3-search crate.
//!
//! All errors use stable string messages suitable for logs. API keys never
//! appear in error messages; URLs are redacted before being formatted.

/// Errors that can occur while querying the search provider.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The request did not complete within the configured timeout.
    #[error("search timed out: {0}")]
    Timeout(String),

    /// The HTTP request could not be sent or the body could not be read.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The provider answered with a non-success status code.
    #[error("provider returned status {status}: {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Request URL with the API key redacted.
        url: String,
    },

    /// Invalid search configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias for pw3-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
