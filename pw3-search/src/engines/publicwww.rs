//! PublicWWW source-code search engine.
//!
//! PublicWWW indexes page source rather than page text, which makes it the
//! provider of choice for finding sites that embed a given script, tracker
//! id or markup fragment. Results are exported as `;`-delimited text.

use crate::config::SearchConfig;
use crate::engine::SearchProvider;
use crate::error::SearchError;
use crate::http;
use crate::types::ExportFormat;

/// PublicWWW export client.
///
/// Holds one [`reqwest::Client`] for the process; each call issues exactly
/// one GET and never retries.
#[derive(Debug, Clone)]
pub struct PublicWwwEngine {
    client: reqwest::Client,
    config: SearchConfig,
}

impl PublicWwwEngine {
    /// Create an engine from a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for invalid configuration, or
    /// [`SearchError::Http`] if the HTTP client cannot be built.
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let client = http::build_client(&config)?;
        Ok(Self { client, config })
    }

    /// Build the export URL for `query`.
    ///
    /// The query is percent-encoded as a single path segment (every byte
    /// except ASCII alphanumerics and `-_.~`).
    pub fn build_url(&self, query: &str, format: ExportFormat) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let mut url = format!(
            "{base}/websites/{}/?export={}",
            urlencoding::encode(query),
            format.token()
        );
        if let Some(key) = self.config.api_key() {
            url.push_str("&key=");
            url.push_str(&urlencoding::encode(key));
        }
        url
    }
}

impl SearchProvider for PublicWwwEngine {
    async fn fetch_export(&self, query: &str, format: ExportFormat) -> Result<String, SearchError> {
        let url = self.build_url(query, format);
        let redacted = http::redact_key(&url);
        tracing::info!(url = %redacted, "PublicWWW request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| http::map_request_error(e, &url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                url: redacted,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| http::map_request_error(e, &url))?;

        tracing::debug!(bytes = body.len(), "PublicWWW response received");
        Ok(body)
    }

    fn name(&self) -> &'static str {
        "PublicWWW"
    }
}
