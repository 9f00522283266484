//! Document state store: the authoritative record of processing lifecycle.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StateError;
use crate::models::{Document, DocumentStatus};

/// Durable storage for [`Document`] records with atomic compare-and-set
/// status transitions.
///
/// The ingestion pipeline is the only writer; status polling, retrieval
/// filtering, and statistics all read through this trait.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Register a new document in `pending` state.
    async fn create(&self, id: &str, filename: &str) -> Result<Document, StateError>;

    /// Fetch one document record.
    async fn get(&self, id: &str) -> Result<Document, StateError>;

    /// Snapshot of all document records.
    async fn list(&self) -> Result<Vec<Document>, StateError>;

    /// Atomically move a document to `next`, checked against the state
    /// machine. An illegal transition fails with [`StateError::Conflict`]
    /// and leaves the record unchanged. `error_message` is recorded only
    /// when `next` is `Failed` and cleared otherwise.
    async fn transition(
        &self,
        id: &str,
        next: DocumentStatus,
        error_message: Option<String>,
    ) -> Result<Document, StateError>;

    /// Atomically move `processing -> completed`, recording the final page
    /// and chunk counts.
    async fn complete(
        &self,
        id: &str,
        page_count: u32,
        chunk_count: u32,
    ) -> Result<Document, StateError>;

    /// Reset a terminal document to `pending`, clearing `error_message`,
    /// `page_count`, and `chunk_count`. Non-terminal documents conflict.
    async fn reprocess(&self, id: &str) -> Result<Document, StateError>;

    /// Remove a document record.
    async fn delete(&self, id: &str) -> Result<(), StateError>;
}

/// In-memory document store.
///
/// A single `RwLock` write guard serializes concurrent transitions on the
/// same id, giving the compare-and-set semantics the pipeline relies on.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    docs: RwLock<HashMap<String, Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Document>> {
        self.docs.write().expect("document store lock poisoned")
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Document>> {
        self.docs.read().expect("document store lock poisoned")
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create(&self, id: &str, filename: &str) -> Result<Document, StateError> {
        let mut docs = self.write_guard();
        if docs.contains_key(id) {
            return Err(StateError::AlreadyExists(id.to_string()));
        }
        let doc = Document::new(id, filename);
        docs.insert(id.to_string(), doc.clone());
        Ok(doc)
    }

    async fn get(&self, id: &str) -> Result<Document, StateError> {
        self.read_guard()
            .get(id)
            .cloned()
            .ok_or_else(|| StateError::NotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<Document>, StateError> {
        Ok(self.read_guard().values().cloned().collect())
    }

    async fn transition(
        &self,
        id: &str,
        next: DocumentStatus,
        error_message: Option<String>,
    ) -> Result<Document, StateError> {
        let mut docs = self.write_guard();
        let doc = docs
            .get_mut(id)
            .ok_or_else(|| StateError::NotFound(id.to_string()))?;

        if !doc.status.can_transition_to(next) {
            return Err(StateError::Conflict {
                id: id.to_string(),
                from: doc.status,
                to: next,
            });
        }

        doc.status = next;
        doc.error_message = if next == DocumentStatus::Failed {
            Some(error_message.unwrap_or_else(|| "processing failed".to_string()))
        } else {
            None
        };
        tracing::debug!(document_id = id, status = %next, "Document transitioned");
        Ok(doc.clone())
    }

    async fn complete(
        &self,
        id: &str,
        page_count: u32,
        chunk_count: u32,
    ) -> Result<Document, StateError> {
        let mut docs = self.write_guard();
        let doc = docs
            .get_mut(id)
            .ok_or_else(|| StateError::NotFound(id.to_string()))?;

        if !doc.status.can_transition_to(DocumentStatus::Completed) {
            return Err(StateError::Conflict {
                id: id.to_string(),
                from: doc.status,
                to: DocumentStatus::Completed,
            });
        }

        doc.status = DocumentStatus::Completed;
        doc.error_message = None;
        doc.page_count = Some(page_count);
        doc.chunk_count = Some(chunk_count);
        tracing::debug!(
            document_id = id,
            page_count,
            chunk_count,
            "Document completed"
        );
        Ok(doc.clone())
    }

    async fn reprocess(&self, id: &str) -> Result<Document, StateError> {
        let mut docs = self.write_guard();
        let doc = docs
            .get_mut(id)
            .ok_or_else(|| StateError::NotFound(id.to_string()))?;

        if !doc.status.is_terminal() {
            return Err(StateError::Conflict {
                id: id.to_string(),
                from: doc.status,
                to: DocumentStatus::Pending,
            });
        }

        doc.status = DocumentStatus::Pending;
        doc.error_message = None;
        doc.page_count = None;
        doc.chunk_count = None;
        tracing::debug!(document_id = id, "Document reset for reprocessing");
        Ok(doc.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), StateError> {
        self.write_guard()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StateError::NotFound(id.to_string()))
    }
}
