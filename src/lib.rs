//! Document ingestion and semantic retrieval.
//!
//! Uploaded documents move through a `pending -> processing ->
//! completed | failed` lifecycle. An asynchronous pipeline extracts text,
//! splits it into overlapping chunks with deterministic ids, embeds the
//! chunks through a content-addressed LRU cache, and stores the vectors in
//! a pluggable vector store. A retrieval engine answers similarity queries
//! filtered by score threshold and document status, and a stats aggregator
//! summarizes the collection.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use docpipe::models::{Config, SearchQuery};
//! use docpipe::services::{
//!     DocumentStore, HttpEmbeddingProvider, InMemoryDocumentStore, IngestionPipeline,
//!     PlainTextExtractor, QdrantBackend, RetrievalEngine, VectorStore,
//! };
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load(Path::new("config.toml"))?;
//!
//! let state = Arc::new(InMemoryDocumentStore::new());
//! let vectors = Arc::new(QdrantBackend::new(
//!     &config.vector_store,
//!     u64::from(config.embedding.dimension),
//! )?);
//! vectors.create_collection().await?;
//! let embedder = Arc::new(HttpEmbeddingProvider::new(&config.embedding)?);
//!
//! let pipeline = IngestionPipeline::new(
//!     &config,
//!     state.clone(),
//!     vectors.clone(),
//!     embedder.clone(),
//!     Arc::new(PlainTextExtractor::new()),
//! )?;
//!
//! state.create("doc-1", "report.txt").await?;
//! pipeline.ingest("doc-1", std::fs::read("report.txt")?)?;
//!
//! let engine = RetrievalEngine::new(
//!     state,
//!     vectors,
//!     embedder,
//!     pipeline.cache(),
//!     config.search.clone(),
//! );
//! let results = engine.search(&SearchQuery::new("quarterly totals")).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{
    ConfigError, EmbeddingError, ExtractionError, PipelineError, SearchError, StateError,
    VectorStoreError,
};
pub use models::{
    CollectionStats, Config, Document, DocumentChunk, DocumentStatus, SearchQuery, SearchResult,
};
pub use services::{IngestionPipeline, RetrievalEngine, StatsAggregator};
