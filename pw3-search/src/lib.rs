//! # pw3-search
//!
//! Client for the PublicWWW source-code search export API, used by the
//! PW3Query pipeline worker.
//!
//! ## Design
//!
//! - One GET per query, no retries, long timeout for slow exports
//! - Raw export text is returned by [`SearchProvider::fetch_export`] and
//!   parsed separately by [`export::parse_export`]
//! - Providers sit behind a trait so tests can substitute canned responses
//!
//! ## Security
//!
//! - The API key is only ever logged in redacted form
//! - No network listeners — this is a library, not a server

pub mod config;
pub mod engine;
pub mod engines;
pub mod error;
pub mod export;
pub mod http;
pub mod types;

pub use config::SearchConfig;
pub use engine::SearchProvider;
pub use engines::PublicWwwEngine;
pub use error::{Result, SearchError};
pub use export::parse_export;
pub use types::{ExportFormat, ResultLine};

/// Run one query against PublicWWW and parse the export.
///
/// Convenience wrapper that builds a [`PublicWwwEngine`] for a single call.
///
/// # Errors
///
/// Returns [`SearchError::Config`] for an invalid `config`, or any error
/// from [`SearchProvider::fetch_export`].
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> pw3_search::Result<()> {
/// let config = pw3_search::SearchConfig::default();
/// let lines = pw3_search::search("\"UA-12345\"", pw3_search::ExportFormat::Csv, &config).await?;
/// for line in &lines {
///     println!("{} ({})", line.domain, line.rank);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn search(
    query: &str,
    format: ExportFormat,
    config: &SearchConfig,
) -> Result<Vec<ResultLine>> {
    let engine = PublicWwwEngine::new(config.clone())?;
    let body = engine.fetch_export(query, format).await?;
    Ok(parse_export(&body))
}
