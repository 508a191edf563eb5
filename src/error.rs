//! Error types for the pw3query pipeline.

use pw3_search::SearchError;

/// Top-level error type for the dispatch/worker pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Missing or invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Blob store read, write, or listing error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Queue send, receive, or delete error.
    #[error("queue error: {0}")]
    Queue(String),

    /// Search provider call failed.
    #[error("provider error: {0}")]
    Provider(#[from] SearchError),

    /// JSON encoding or decoding error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PipelineError>;
