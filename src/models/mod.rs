mod config;
mod document;
mod search;

pub use config::{
    Config, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_URL,
    DEFAULT_QDRANT_URL, EmbeddingConfig, IndexingConfig, SearchConfig, VectorStoreConfig,
};
pub use document::{Document, DocumentChunk, DocumentStatus, Page};
pub use search::{CollectionStats, SearchQuery, SearchResult, StatusCounts};
