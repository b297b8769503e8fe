//! Error types for the RAG core

use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage that an upstream failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Fetching raw bytes from object storage
    Fetch,
    /// Extracting normalized text from raw bytes
    Normalize,
    /// Splitting normalized text into chunks
    Chunking,
    /// Generating embeddings
    Embedding,
    /// Generating the final answer
    Generation,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fetch => "object fetch",
            Stage::Normalize => "text normalization",
            Stage::Chunking => "chunking",
            Stage::Embedding => "embedding",
            Stage::Generation => "generation",
        };
        f.write_str(name)
    }
}

/// RAG core errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (fatal, not retried)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed input (job payload, query request)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced document or tenant does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// An external service failed; the failing stage is named
    #[error("Upstream failure during {stage}: {message}")]
    Upstream { stage: Stage, message: String },

    /// Datastore error
    #[error("Database error: {0}")]
    Database(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create an upstream error attributed to a stage
    pub fn upstream(stage: Stage, message: impl Into<String>) -> Self {
        Self::Upstream {
            stage,
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// True for failures the caller may reasonably retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Upstream { .. } | Error::Http(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err.to_string())
    }
}
