//! Shared HTTP client for provider requests.
//!
//! Provides a configured [`reqwest::Client`] plus helpers for keeping API
//! keys out of logs.

use crate::config::SearchConfig;
use crate::error::SearchError;
use std::time::Duration;

/// User-Agent sent when the config does not override it.
const DEFAULT_USER_AGENT: &str = concat!("pw3query/", env!("CARGO_PKG_VERSION"));

/// Build a [`reqwest::Client`] configured for provider requests.
///
/// The client has:
/// - Timeout from config
/// - The configured User-Agent, or the crate default
/// - Brotli and gzip decompression
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client(config: &SearchConfig) -> Result<reqwest::Client, SearchError> {
    let ua = config
        .user_agent
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned());

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}

/// Replace the value of the `key` query parameter with `***`.
pub fn redact_key(url: &str) -> String {
    let Some((head, query)) = url.split_once('?') else {
        return url.to_owned();
    };
    let redacted: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some(("key", _)) => "key=***".to_owned(),
            _ => pair.to_owned(),
        })
        .collect();
    format!("{head}?{}", redacted.join("&"))
}

/// Map a [`reqwest::Error`] onto the crate error, separating timeouts.
pub(crate) fn map_request_error(err: reqwest::Error, url: &str) -> SearchError {
    // reqwest embeds the full URL in its message; strip it so keys stay private.
    let err = err.without_url();
    if err.is_timeout() {
        SearchError::Timeout(format!("{} ({err})", redact_key(url)))
    } else {
        SearchError::Http(format!("request to {} failed: {err}", redact_key(url)))
    }
}
