//! In-memory vector store with brute-force cosine similarity.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{CollectionInfo, ScoredChunk, VectorStore};
use crate::error::VectorStoreError;
use crate::models::DocumentChunk;

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

/// Vector store holding all points in process memory.
///
/// Points are keyed by chunk id, so re-upserting a chunk overwrites the
/// previous point exactly like the Qdrant backend does.
pub struct InMemoryVectorStore {
    collection: String,
    points: RwLock<HashMap<String, DocumentChunk>>,
}

impl InMemoryVectorStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            points: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new("documents")
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Ok(true)
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        let points = self.points.read().expect("vector store lock poisoned");
        Ok(Some(CollectionInfo {
            points_count: points.len() as u64,
        }))
    }

    async fn create_collection(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn upsert_points(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError> {
        let mut points = self.points.write().expect("vector store lock poisoned");
        for chunk in chunks {
            points.insert(chunk.id.clone(), chunk);
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let points = self.points.read().expect("vector store lock poisoned");

        let mut scored: Vec<ScoredChunk> = points
            .values()
            .map(|chunk| ScoredChunk {
                chunk_id: chunk.id.clone(),
                document_id: chunk.document_id.clone(),
                score: cosine_similarity(&query_vector, &chunk.embedding),
                text: chunk.text.clone(),
                page_number: chunk.page_number,
                chunk_index: chunk.chunk_index,
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        scored.truncate(limit as usize);

        Ok(scored)
    }

    async fn delete_by_document_ids(
        &self,
        document_ids: &[String],
    ) -> Result<(), VectorStoreError> {
        let mut points = self.points.write().expect("vector store lock poisoned");
        points.retain(|_, chunk| !document_ids.contains(&chunk.document_id));
        Ok(())
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_with_vector(document_id: &str, index: u32, vector: Vec<f32>) -> DocumentChunk {
        let mut chunk = DocumentChunk::new(
            document_id,
            1,
            index,
            format!("chunk {} of {}", index, document_id),
        );
        chunk.embedding = vector;
        chunk
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5, 0.5, 0.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&v, &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn search_ranks_by_similarity() {
        let store = InMemoryVectorStore::default();
        store
            .upsert_points(vec![
                chunk_with_vector("doc-1", 0, vec![1.0, 0.0]),
                chunk_with_vector("doc-1", 1, vec![0.0, 1.0]),
                chunk_with_vector("doc-2", 0, vec![0.7, 0.7]),
            ])
            .await
            .unwrap();

        let hits = store.search(vec![1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].document_id, "doc-1");
        assert_eq!(hits[0].chunk_index, 0);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn upsert_overwrites_by_chunk_id() {
        let store = InMemoryVectorStore::default();
        store
            .upsert_points(vec![chunk_with_vector("doc-1", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert_points(vec![chunk_with_vector("doc-1", 0, vec![0.0, 1.0])])
            .await
            .unwrap();

        let info = store.collection_info().await.unwrap().unwrap();
        assert_eq!(info.points_count, 1);
    }

    #[tokio::test]
    async fn empty_collection_returns_empty_results() {
        let store = InMemoryVectorStore::default();
        let hits = store.search(vec![1.0, 0.0], 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_by_document_ids_removes_only_those() {
        let store = InMemoryVectorStore::default();
        store
            .upsert_points(vec![
                chunk_with_vector("doc-1", 0, vec![1.0, 0.0]),
                chunk_with_vector("doc-2", 0, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        store
            .delete_by_document_ids(&["doc-1".to_string()])
            .await
            .unwrap();

        let info = store.collection_info().await.unwrap().unwrap();
        assert_eq!(info.points_count, 1);
        let hits = store.search(vec![0.0, 1.0], 10).await.unwrap();
        assert_eq!(hits[0].document_id, "doc-2");
    }
}
