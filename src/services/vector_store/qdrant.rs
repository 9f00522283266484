use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};

use super::{CollectionInfo, ScoredChunk, VectorStore};
use crate::error::VectorStoreError;
use crate::models::{DocumentChunk, VectorStoreConfig};

/// Qdrant-backed vector store.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    dimension: u64,
}

impl QdrantBackend {
    pub fn new(config: &VectorStoreConfig, dimension: u64) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            dimension,
        })
    }
}

fn payload_str(payload: &HashMap<String, qdrant_client::qdrant::Value>, key: &str) -> String {
    payload
        .get(key)
        .and_then(|v| match &v.kind {
            Some(qdrant_client::qdrant::value::Kind::StringValue(s)) => Some(s.as_str()),
            _ => None,
        })
        .unwrap_or("")
        .to_string()
}

fn payload_u32(payload: &HashMap<String, qdrant_client::qdrant::Value>, key: &str) -> u32 {
    payload
        .get(key)
        .and_then(|v| match &v.kind {
            Some(qdrant_client::qdrant::value::Kind::IntegerValue(n)) => Some(*n as u32),
            _ => None,
        })
        .unwrap_or(0)
}

#[async_trait]
impl VectorStore for QdrantBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        match self.client.collection_info(&self.collection).await {
            Ok(info) => Ok(Some(CollectionInfo {
                points_count: info
                    .result
                    .map(|r| r.points_count.unwrap_or(0))
                    .unwrap_or(0),
            })),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("not found") || msg.contains("doesn't exist") {
                    Ok(None)
                } else {
                    Err(VectorStoreError::CollectionError(msg))
                }
            }
        }
    }

    async fn create_collection(&self) -> Result<(), VectorStoreError> {
        if self.collection_info().await?.is_some() {
            return Ok(());
        }

        let create_collection = CreateCollectionBuilder::new(&self.collection)
            .vectors_config(VectorParamsBuilder::new(self.dimension, Distance::Cosine));

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        Ok(())
    }

    async fn upsert_points(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = chunks
            .into_iter()
            .map(|chunk| {
                let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                payload.insert("document_id".to_string(), chunk.document_id.into());
                payload.insert("page_number".to_string(), (chunk.page_number as i64).into());
                payload.insert("chunk_index".to_string(), (chunk.chunk_index as i64).into());
                payload.insert("content_hash".to_string(), chunk.content_hash.into());
                payload.insert("text".to_string(), chunk.text.into());

                PointStruct::new(chunk.id, chunk.embedding, payload)
            })
            .collect();

        let upsert = UpsertPointsBuilder::new(&self.collection, points);

        self.client
            .upsert_points(upsert)
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;

        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let search_builder =
            SearchPointsBuilder::new(&self.collection, query_vector, limit).with_payload(true);

        let results = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        let scored: Vec<ScoredChunk> = results
            .result
            .into_iter()
            .map(|point| {
                let chunk_id = match &point.id {
                    Some(id) => match &id.point_id_options {
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(uuid)) => {
                            uuid.clone()
                        }
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(num)) => {
                            num.to_string()
                        }
                        None => String::new(),
                    },
                    None => String::new(),
                };

                let payload = point.payload;
                ScoredChunk {
                    chunk_id,
                    document_id: payload_str(&payload, "document_id"),
                    score: point.score,
                    text: payload_str(&payload, "text"),
                    page_number: payload_u32(&payload, "page_number"),
                    chunk_index: payload_u32(&payload, "chunk_index"),
                }
            })
            .collect();

        Ok(scored)
    }

    async fn delete_by_document_ids(
        &self,
        document_ids: &[String],
    ) -> Result<(), VectorStoreError> {
        if document_ids.is_empty() {
            return Ok(());
        }

        let conditions: Vec<Condition> = document_ids
            .iter()
            .map(|id| Condition::matches("document_id", id.clone()))
            .collect();

        let filter = Filter::should(conditions);
        let delete = DeletePointsBuilder::new(&self.collection).points(filter);

        self.client
            .delete_points(delete)
            .await
            .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;

        Ok(())
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}
