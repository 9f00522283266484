//! Semantic retrieval over the chunk collection.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EmbeddingError, SearchError};
use crate::models::{DocumentStatus, SearchConfig, SearchQuery, SearchResult};
use crate::services::cache::EmbeddingCache;
use crate::services::embedding::EmbeddingProvider;
use crate::services::state::DocumentStore;
use crate::services::vector_store::VectorStore;
use crate::utils::text::content_hash;

/// Threshold- and status-filtered similarity search.
///
/// Query embeddings go through the same content-addressed cache the
/// ingestion pipeline fills, so a repeated query (or a query matching
/// ingested chunk text) skips the provider entirely.
pub struct RetrievalEngine {
    state: Arc<dyn DocumentStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    cache: Arc<EmbeddingCache>,
    defaults: SearchConfig,
}

impl RetrievalEngine {
    pub fn new(
        state: Arc<dyn DocumentStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        cache: Arc<EmbeddingCache>,
        defaults: SearchConfig,
    ) -> Self {
        Self {
            state,
            vectors,
            embedder,
            cache,
            defaults,
        }
    }

    /// Run a similarity search.
    ///
    /// Results are restricted to chunks whose owning document is
    /// `completed`, unless the query opts into in-flight documents. Chunks
    /// whose document record no longer exists are dropped. Ordering is by
    /// score descending, with ties broken by chunk index ascending.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SearchError> {
        let text = query.query.trim();
        if text.is_empty() {
            return Err(SearchError::InvalidQuery(
                "query text must not be empty".to_string(),
            ));
        }

        let top_k = query.top_k.unwrap_or(self.defaults.default_top_k);
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let threshold = query
            .threshold
            .unwrap_or(self.defaults.default_threshold)
            .clamp(0.0, 1.0);

        let query_vector = self.embed_query(text).await?;
        let hits = self.vectors.search(query_vector, u64::from(top_k)).await?;

        let statuses: HashMap<String, DocumentStatus> = self
            .state
            .list()
            .await?
            .into_iter()
            .map(|doc| (doc.id, doc.status))
            .collect();

        let mut results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|hit| hit.score >= threshold)
            .filter(|hit| match statuses.get(&hit.document_id) {
                Some(DocumentStatus::Completed) => true,
                Some(_) => query.include_processing,
                // The chunk outlived its document record.
                None => false,
            })
            .map(|hit| SearchResult {
                document_id: hit.document_id,
                chunk_id: hit.chunk_id,
                score: hit.score,
                text: hit.text,
                page_number: hit.page_number,
                chunk_index: hit.chunk_index,
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });

        tracing::debug!(
            query_len = text.len(),
            top_k,
            threshold,
            results = results.len(),
            "Search complete"
        );
        Ok(results)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let key = content_hash(text);
        if let Some(vector) = self.cache.get(&key) {
            tracing::debug!("Query embedding served from cache");
            return Ok(vector);
        }

        let mut vectors = self.embedder.embed_batch(vec![text.to_string()]).await?;
        let vector = vectors.pop().ok_or_else(|| {
            SearchError::Embedding(EmbeddingError::Fatal(
                "provider returned no vector for the query".to_string(),
            ))
        })?;
        self.cache.put(&key, vector.clone());
        Ok(vector)
    }
}
