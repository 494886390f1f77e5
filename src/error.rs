// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Structured search backend unavailable: {0}")]
    SearchBackendUnavailable(String),

    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    #[error("Answer synthesis unavailable: {0}")]
    SynthesisUnavailable(String),

    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SearchError {
    /// Stable machine-readable name used in error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::Validation(_) => "validation_error",
            SearchError::Config(_) => "config_error",
            SearchError::SearchBackendUnavailable(_) => "search_backend_unavailable",
            SearchError::EmbeddingUnavailable(_) => "embedding_unavailable",
            SearchError::IndexUnavailable(_) => "index_unavailable",
            SearchError::SearchUnavailable(_) => "search_unavailable",
            SearchError::SynthesisUnavailable(_) => "synthesis_unavailable",
            SearchError::Timeout { .. } => "timeout",
            SearchError::Database(_) => "database_error",
            SearchError::Serialization(_) => "serialization_error",
            SearchError::Io(_) => "io_error",
        }
    }

    /// HTTP-equivalent status: 4xx for caller mistakes, 5xx otherwise.
    pub fn status_code(&self) -> u16 {
        match self {
            SearchError::Validation(_) => 400,
            SearchError::SearchBackendUnavailable(_)
            | SearchError::EmbeddingUnavailable(_)
            | SearchError::IndexUnavailable(_)
            | SearchError::SearchUnavailable(_)
            | SearchError::SynthesisUnavailable(_) => 503,
            SearchError::Timeout { .. } => 504,
            _ => 500,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::SearchBackendUnavailable(_)
                | SearchError::EmbeddingUnavailable(_)
                | SearchError::IndexUnavailable(_)
                | SearchError::Timeout { .. }
        )
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(err: rusqlite::Error) -> Self {
        SearchError::Database(err.to_string())
    }
}
