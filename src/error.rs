//! Error types for the ingestion pipeline and retrieval engine.

use thiserror::Error;

use crate::models::DocumentStatus;
use crate::utils::retry::Retryable;

/// Errors raised while extracting text from uploaded bytes.
///
/// Extraction failures are terminal for the owning document and are never
/// retried.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("corrupt or unreadable document: {0}")]
    Corrupt(String),

    #[error("unsupported document format: {0}")]
    Unsupported(String),

    #[error("document is encrypted and no password was supplied")]
    Encrypted,

    #[error("extraction timed out after {0} seconds")]
    Timeout(u64),
}

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Timeout, rate limit, or transport failure; safe to retry with backoff.
    #[error("transient embedding failure: {0}")]
    Transient(String),

    /// Malformed input or an unrecoverable provider response.
    #[error("embedding request failed: {0}")]
    Fatal(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        matches!(self, EmbeddingError::Transient(_))
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to vector store: {0}")]
    ConnectionError(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("upsert error: {0}")]
    UpsertError(String),

    #[error("search error: {0}")]
    SearchError(String),

    #[error("delete error: {0}")]
    DeleteError(String),
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            VectorStoreError::ConnectionError(_) => true,
            VectorStoreError::CollectionError(msg)
            | VectorStoreError::UpsertError(msg)
            | VectorStoreError::SearchError(msg)
            | VectorStoreError::DeleteError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("unavailable")
                    || msg_lower.contains("too many")
            }
        }
    }
}

/// Errors raised by the document state store.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document already exists: {0}")]
    AlreadyExists(String),

    /// Transition attempted from an unexpected current status; state is
    /// left unchanged.
    #[error("illegal transition for document {id}: {from} -> {to}")]
    Conflict {
        id: String,
        from: DocumentStatus,
        to: DocumentStatus,
    },
}

/// Errors surfaced by the ingestion pipeline to its callers.
///
/// Failures inside a running pipeline are not surfaced here; they land the
/// document in `failed` with a diagnosable `error_message`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A pipeline run for this document is already queued or executing.
    #[error("ingestion already in progress for document {0}")]
    AlreadyInProgress(String),

    #[error("state store error: {0}")]
    State(#[from] StateError),

    /// The worker pool has shut down and no longer accepts jobs.
    #[error("ingestion queue is closed")]
    QueueClosed,
}

/// Errors related to similarity search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_embedding_errors_are_retryable() {
        assert!(EmbeddingError::Transient("rate limited".into()).is_retryable());
        assert!(!EmbeddingError::Fatal("bad input".into()).is_retryable());
        assert!(
            !EmbeddingError::DimensionMismatch {
                expected: 1024,
                actual: 768
            }
            .is_retryable()
        );
    }

    #[test]
    fn vector_store_retryability_follows_cause() {
        assert!(VectorStoreError::ConnectionError("refused".into()).is_retryable());
        assert!(VectorStoreError::UpsertError("request timeout".into()).is_retryable());
        assert!(!VectorStoreError::UpsertError("payload too large".into()).is_retryable());
    }

    #[test]
    fn conflict_error_names_both_states() {
        let error = StateError::Conflict {
            id: "doc-1".into(),
            from: DocumentStatus::Completed,
            to: DocumentStatus::Processing,
        };
        let message = error.to_string();
        assert!(message.contains("completed"));
        assert!(message.contains("processing"));
    }
}
