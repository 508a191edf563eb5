//! Provider configuration with sensible defaults.
//!
//! [`SearchConfig`] controls where queries are sent, the optional API key,
//! and the request timeout. The defaults match the public PublicWWW API,
//! which can take several minutes to export large result sets.

use crate::error::SearchError;
use serde::{Deserialize, Serialize};

/// Default provider host.
pub const DEFAULT_BASE_URL: &str = "https://publicwww.com";

/// Default request timeout. Exports of popular queries are slow.
pub const DEFAULT_TIMEOUT_SECS: u64 = 500;

/// Configuration for the search provider client.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Scheme and host of the provider, without the `/websites/` path.
    pub base_url: String,
    /// API key appended as the `key` query parameter. Empty strings are
    /// treated the same as `None`.
    pub api_key: Option<String>,
    /// HTTP request timeout in seconds.
    pub timeout_seconds: u64,
    /// Custom User-Agent string. If `None`, the crate name and version are sent.
    pub user_agent: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

impl SearchConfig {
    /// Returns the API key if one is configured and non-empty.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }

    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `timeout_seconds` must be greater than 0
    /// - `base_url` must be an absolute `http` or `https` URL
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        let parsed = url::Url::parse(&self.base_url)
            .map_err(|e| SearchError::Config(format!("invalid base_url: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SearchError::Config(format!(
                "base_url must use http or https, got {}",
                parsed.scheme()
            )));
        }
        Ok(())
    }
}
