//! Service layer: ingestion stages, lifecycle state, retrieval, and stats.

pub mod cache;
pub mod chunker;
pub mod embedding;
pub mod extract;
pub mod pipeline;
pub mod search;
pub mod state;
pub mod stats;
pub mod vector_store;

pub use cache::EmbeddingCache;
pub use chunker::TextChunker;
pub use embedding::{EmbeddingProvider, HttpEmbeddingProvider};
pub use extract::{DocumentExtractor, ExtractedMetadata, Extraction, PlainTextExtractor};
pub use pipeline::IngestionPipeline;
pub use search::RetrievalEngine;
pub use state::{DocumentStore, InMemoryDocumentStore};
pub use stats::StatsAggregator;
pub use vector_store::{
    CollectionInfo, InMemoryVectorStore, QdrantBackend, ScoredChunk, VectorStore,
};
