use serde::{Deserialize, Serialize};

use crate::utils::content_hash;

/// Lifecycle state of a document moving through the ingestion pipeline.
///
/// Legal transitions are `pending -> processing -> {completed, failed}`.
/// Terminal states are only left through an explicit reprocess, which resets
/// the document to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    /// Whether no further pipeline activity can occur without a reprocess.
    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (DocumentStatus::Pending, DocumentStatus::Processing)
                | (DocumentStatus::Processing, DocumentStatus::Completed)
                | (DocumentStatus::Processing, DocumentStatus::Failed)
        )
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStatus::Pending => write!(f, "pending"),
            DocumentStatus::Processing => write!(f, "processing"),
            DocumentStatus::Completed => write!(f, "completed"),
            DocumentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Authoritative record of one uploaded document.
///
/// Invariants maintained by the state store: `error_message` is set iff
/// `status == Failed`; `chunk_count` is set iff `status == Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub uploaded_at: String,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub page_count: Option<u32>,
    pub chunk_count: Option<u32>,
}

impl Document {
    /// Create a fresh record in `pending` state.
    pub fn new(id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            uploaded_at: chrono::Utc::now().to_rfc3339(),
            status: DocumentStatus::Pending,
            error_message: None,
            page_count: None,
            chunk_count: None,
        }
    }
}

/// One page of extracted text. Page numbers start at 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    pub text: String,
}

impl Page {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }
}

/// A contiguous fragment of a document's text, independently embedded
/// and searched.
///
/// Chunk ids are a deterministic function of `(document_id, chunk_index)`,
/// so re-running the pipeline over unchanged input re-derives identical ids
/// and upserts overwrite instead of duplicating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    pub page_number: u32,
    /// Sequential across the whole document, starting at 0; not reset per page.
    pub chunk_index: u32,
    pub text: String,
    /// SHA-256 of the normalized text; embedding-cache key.
    pub content_hash: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
}

impl DocumentChunk {
    /// Derive the stable chunk id for `(document_id, chunk_index)`.
    pub fn generate_id(document_id: &str, chunk_index: u32) -> String {
        use uuid::Uuid;
        let name = format!("{}:{}", document_id, chunk_index);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    /// Build a chunk with its derived id and content hash; the embedding is
    /// filled in later by the pipeline.
    pub fn new(document_id: &str, page_number: u32, chunk_index: u32, text: String) -> Self {
        Self {
            id: Self::generate_id(document_id, chunk_index),
            document_id: document_id.to_string(),
            page_number,
            chunk_index,
            content_hash: content_hash(&text),
            text,
            embedding: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_starts_pending() {
        let doc = Document::new("doc-1", "report.pdf");
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert!(doc.error_message.is_none());
        assert!(doc.chunk_count.is_none());
        assert!(!doc.uploaded_at.is_empty());
    }

    #[test]
    fn status_transitions_only_move_forward() {
        use DocumentStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Pending));
    }

    #[test]
    fn terminal_states() {
        assert!(DocumentStatus::Completed.is_terminal());
        assert!(DocumentStatus::Failed.is_terminal());
        assert!(!DocumentStatus::Pending.is_terminal());
        assert!(!DocumentStatus::Processing.is_terminal());
    }

    #[test]
    fn chunk_id_is_deterministic() {
        let id = DocumentChunk::generate_id("doc-1", 5);
        assert_eq!(id.len(), 36);
        assert_eq!(id, DocumentChunk::generate_id("doc-1", 5));
        assert_ne!(id, DocumentChunk::generate_id("doc-1", 6));
        assert_ne!(id, DocumentChunk::generate_id("doc-2", 5));
    }

    #[test]
    fn chunk_carries_content_hash() {
        let chunk = DocumentChunk::new("doc-1", 1, 0, "Some Text".to_string());
        assert_eq!(chunk.id, DocumentChunk::generate_id("doc-1", 0));
        assert_eq!(chunk.content_hash, content_hash("some  text"));
        assert!(chunk.embedding.is_empty());
    }
}
