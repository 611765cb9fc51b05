//! Error taxonomy shared by every stage of the context engine.
//!
//! Each variant maps to a containment rule: loader and provider errors
//! degrade one file or one batch, store errors degrade one retrieval, and
//! [`RagError::ProcessingFailed`] moves a data source to `error`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// No extractor exists for this file extension.
    #[error("unsupported format: '{0}'")]
    UnsupportedFormat(String),

    /// An extractor recognised the file type but could not read its content.
    #[error("failed to extract text from {path}: {message}")]
    Extraction { path: String, message: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The embedding provider failed (after retries, for batch calls).
    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// The provider refused the request outright (bad credentials, invalid
    /// input, disabled provider). Retrying cannot help.
    #[error("embedding request rejected: {0}")]
    EmbeddingRejected(String),

    /// A vector's length differs from the collection's fixed dimensionality.
    #[error("vector dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("vector store not ready: {0}")]
    StoreNotReady(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A lifecycle pipeline stage failed; the source is recoverable via retry.
    #[error("processing failed: {0}")]
    ProcessingFailed(String),

    /// Backend failure (database, lock poisoning, serialization).
    #[error("store error: {0}")]
    Store(String),
}

impl RagError {
    pub fn store<E: std::fmt::Display>(err: E) -> Self {
        RagError::Store(err.to_string())
    }

    pub fn provider<E: std::fmt::Display>(err: E) -> Self {
        RagError::EmbeddingProvider(err.to_string())
    }

    /// Whether a failed embedding call is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RagError::EmbeddingRejected(_))
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Store(format!("serialization: {}", err))
    }
}

pub type RagResult<T> = Result<T, RagError>;
