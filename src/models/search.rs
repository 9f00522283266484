//! Search-related models for queries, results, and collection statistics.

use serde::{Deserialize, Serialize};

/// A similarity search request against the chunk collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Natural language query text.
    pub query: String,

    /// Maximum results to return; falls back to the configured default.
    pub top_k: Option<u32>,

    /// Minimum similarity score in [0,1]; falls back to the configured
    /// default. A threshold of 0 returns everything the vector store found.
    pub threshold: Option<f32>,

    /// Include chunks whose owning document has not reached `completed`.
    pub include_processing: bool,
}

impl SearchQuery {
    /// Create a new search query with the given text.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: None,
            threshold: None,
            include_processing: false,
        }
    }

    /// Set the result limit.
    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Set the minimum similarity threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Opt into results from documents that are still processing.
    pub fn with_processing(mut self, include: bool) -> Self {
        self.include_processing = include;
        self
    }
}

/// A single search result. Transient; produced per query, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub document_id: String,
    pub chunk_id: String,
    /// Cosine-based similarity in [0,1].
    pub score: f32,
    /// The matching chunk text.
    pub text: String,
    pub page_number: u32,
    pub chunk_index: u32,
}

/// Per-status document counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Summary statistics over the document collection, computed as a fresh
/// scan at call time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total_documents: u64,
    pub total_pages: u64,
    pub total_chunks: u64,
    pub average_pages: f64,
    pub average_chunks_per_document: f64,
    pub documents_by_status: StatusCounts,
}
