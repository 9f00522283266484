//! Vector store abstraction layer.
//!
//! A trait-based abstraction over vector database backends. Production
//! deployments use [`QdrantBackend`]; [`InMemoryVectorStore`] serves tests
//! and embedded use with brute-force cosine similarity.

mod memory;
mod qdrant;

pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantBackend;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::models::DocumentChunk;

/// Collection information.
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub points_count: u64,
}

/// A chunk returned from a similarity query, ranked by score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub document_id: String,
    /// Cosine similarity against the query vector.
    pub score: f32,
    pub text: String,
    pub page_number: u32,
    pub chunk_index: u32,
}

/// Abstract interface over vector database backends.
///
/// Upserts are keyed by chunk id: re-running ingestion over unchanged input
/// overwrites existing points instead of duplicating them.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check if the vector store is healthy and accessible.
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Get information about the collection; `None` if it doesn't exist.
    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError>;

    /// Create the collection if it doesn't exist.
    async fn create_collection(&self) -> Result<(), VectorStoreError>;

    /// Insert or overwrite chunks with their embeddings.
    async fn upsert_points(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError>;

    /// Return up to `limit` chunks nearest to the query vector, best first.
    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError>;

    /// Delete all points belonging to the given documents.
    async fn delete_by_document_ids(&self, document_ids: &[String])
    -> Result<(), VectorStoreError>;

    /// Get the collection name.
    fn collection(&self) -> &str;
}
