//! Ingestion pipeline orchestrating extract -> chunk -> embed -> store.
//!
//! Each document runs its stages strictly in sequence on one worker; many
//! documents run in parallel across a bounded worker pool fed by a FIFO
//! queue. At most one run per document id is in flight at any time, enforced
//! by an active-id registry that is scoped to live runs only.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::error::{
    ConfigError, EmbeddingError, ExtractionError, PipelineError, VectorStoreError,
};
use crate::models::{Config, DocumentChunk, DocumentStatus};
use crate::services::cache::EmbeddingCache;
use crate::services::chunker::TextChunker;
use crate::services::embedding::EmbeddingProvider;
use crate::services::extract::DocumentExtractor;
use crate::services::state::DocumentStore;
use crate::services::vector_store::VectorStore;
use crate::utils::retry::{RetryConfig, RetryResult, Retryable, with_retry};

/// One queued unit of work.
struct IngestJob {
    document_id: String,
    bytes: Vec<u8>,
}

/// Dependencies and policy shared by all worker tasks.
struct PipelineContext {
    state: Arc<dyn DocumentStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn DocumentExtractor>,
    cache: Arc<EmbeddingCache>,
    chunker: TextChunker,
    batch_size: usize,
    dimension: usize,
    embedding_timeout: Duration,
    extraction_timeout: Duration,
    retry: RetryConfig,
    /// Ids with a queued or executing run. An entry is removed when its run
    /// finishes, just ahead of the terminal status write, so an observer of
    /// a terminal status never finds a stale entry and the registry never
    /// grows with document history.
    active: Mutex<HashSet<String>>,
}

impl PipelineContext {
    fn reserve(&self, id: &str) -> bool {
        self.active
            .lock()
            .expect("active registry lock poisoned")
            .insert(id.to_string())
    }

    fn release(&self, id: &str) {
        self.active
            .lock()
            .expect("active registry lock poisoned")
            .remove(id);
    }
}

/// Asynchronous document ingestion pipeline.
///
/// `ingest` enqueues work and returns immediately; progress is observed by
/// polling the [`DocumentStore`].
pub struct IngestionPipeline {
    ctx: Arc<PipelineContext>,
    queue: mpsc::UnboundedSender<IngestJob>,
    workers: Vec<JoinHandle<()>>,
}

impl IngestionPipeline {
    /// Build the pipeline and spawn its worker pool.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(
        config: &Config,
        state: Arc<dyn DocumentStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn DocumentExtractor>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let chunker = TextChunker::new(&config.indexing)?;
        let cache = Arc::new(EmbeddingCache::new(config.embedding.cache_capacity));
        let retry = RetryConfig::new(config.embedding.max_attempts)
            .with_initial_backoff(Duration::from_millis(config.embedding.initial_backoff_ms))
            .with_max_backoff(Duration::from_millis(config.embedding.max_backoff_ms))
            .with_multiplier(config.embedding.backoff_multiplier);

        let ctx = Arc::new(PipelineContext {
            state,
            vectors,
            embedder,
            extractor,
            cache,
            chunker,
            batch_size: config.embedding.batch_size as usize,
            dimension: config.embedding.dimension as usize,
            embedding_timeout: Duration::from_secs(config.embedding.timeout_secs),
            extraction_timeout: Duration::from_secs(config.indexing.extraction_timeout_secs),
            retry,
            active: Mutex::new(HashSet::new()),
        });

        let (queue, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let workers = (0..config.indexing.workers)
            .map(|worker_id| {
                let ctx = Arc::clone(&ctx);
                let receiver = Arc::clone(&receiver);
                tokio::spawn(async move { run_worker(worker_id, ctx, receiver).await })
            })
            .collect();

        Ok(Self {
            ctx,
            queue,
            workers,
        })
    }

    /// Embedding cache shared with the retrieval engine.
    pub fn cache(&self) -> Arc<EmbeddingCache> {
        Arc::clone(&self.ctx.cache)
    }

    /// Enqueue an ingestion run for a document.
    ///
    /// Returns immediately. A second call for an id whose run has not yet
    /// reached a terminal state is rejected, not queued.
    pub fn ingest(&self, document_id: &str, bytes: Vec<u8>) -> Result<(), PipelineError> {
        if !self.ctx.reserve(document_id) {
            return Err(PipelineError::AlreadyInProgress(document_id.to_string()));
        }

        tracing::debug!(document_id, "Ingestion job queued");
        let job = IngestJob {
            document_id: document_id.to_string(),
            bytes,
        };
        if self.queue.send(job).is_err() {
            self.ctx.release(document_id);
            return Err(PipelineError::QueueClosed);
        }
        Ok(())
    }

    /// Reset a terminal document to `pending` and queue a fresh run.
    ///
    /// An active run blocks reprocessing; a non-terminal document surfaces
    /// the state store's conflict.
    pub async fn reprocess(&self, document_id: &str, bytes: Vec<u8>) -> Result<(), PipelineError> {
        if !self.ctx.reserve(document_id) {
            return Err(PipelineError::AlreadyInProgress(document_id.to_string()));
        }

        if let Err(error) = self.ctx.state.reprocess(document_id).await {
            self.ctx.release(document_id);
            return Err(PipelineError::State(error));
        }

        tracing::info!(document_id, "Document queued for reprocessing");
        let job = IngestJob {
            document_id: document_id.to_string(),
            bytes,
        };
        if self.queue.send(job).is_err() {
            self.ctx.release(document_id);
            return Err(PipelineError::QueueClosed);
        }
        Ok(())
    }

    /// Stop accepting work and wait for in-flight runs to finish.
    pub async fn shutdown(self) {
        drop(self.queue);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn run_worker(
    worker_id: u32,
    ctx: Arc<PipelineContext>,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<IngestJob>>>,
) {
    loop {
        // Hold the receiver lock only while waiting for the next job, so
        // other workers can pick up jobs while this one processes.
        let job = {
            let mut guard = receiver.lock().await;
            guard.recv().await
        };
        let Some(job) = job else { break };

        tracing::debug!(
            worker = worker_id,
            document_id = %job.document_id,
            "Worker picked up ingestion job"
        );
        process_document(&ctx, job).await;
    }
    tracing::debug!(worker = worker_id, "Worker shut down");
}

/// A terminal failure of one pipeline stage.
struct StageFailure {
    stage: &'static str,
    message: String,
}

impl StageFailure {
    fn new(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    fn into_message(self) -> String {
        format!("{} stage failed: {}", self.stage, self.message)
    }
}

async fn process_document(ctx: &PipelineContext, job: IngestJob) {
    let id = job.document_id;

    // A conflict here means the document is not pending (e.g. deleted or
    // already terminal); the run is abandoned without touching it.
    if let Err(error) = ctx
        .state
        .transition(&id, DocumentStatus::Processing, None)
        .await
    {
        tracing::warn!(document_id = %id, error = %error, "Abandoning ingestion run");
        ctx.release(&id);
        return;
    }

    let outcome = run_stages(ctx, &id, &job.bytes).await;

    // All pipeline work for this run is finished. Free the id before the
    // terminal write: anyone who observes the terminal status can then
    // queue a new run without hitting a stale registry entry.
    ctx.release(&id);

    match outcome {
        Ok((page_count, chunk_count)) => {
            match ctx.state.complete(&id, page_count, chunk_count).await {
                Ok(_) => {
                    tracing::info!(
                        document_id = %id,
                        page_count,
                        chunk_count,
                        "Document ingested"
                    );
                }
                Err(error) => {
                    tracing::error!(document_id = %id, error = %error, "Failed to record completion");
                }
            }
        }
        Err(failure) => {
            tracing::warn!(
                document_id = %id,
                stage = failure.stage,
                error = %failure.message,
                "Ingestion failed"
            );
            if let Err(error) = ctx
                .state
                .transition(&id, DocumentStatus::Failed, Some(failure.into_message()))
                .await
            {
                tracing::error!(document_id = %id, error = %error, "Failed to record ingestion failure");
            }
        }
    }
}

/// Run extract -> chunk -> embed -> store for one document.
///
/// Returns `(page_count, chunk_count)` on success. Partial writes are left
/// in place on failure; chunk ids are deterministic, so a later reprocess
/// overwrites them.
async fn run_stages(
    ctx: &PipelineContext,
    id: &str,
    bytes: &[u8],
) -> Result<(u32, u32), StageFailure> {
    // Extraction failures, including timeouts, are never retried.
    let extraction = match timeout(ctx.extraction_timeout, ctx.extractor.extract(bytes)).await {
        Err(_) => {
            let error = ExtractionError::Timeout(ctx.extraction_timeout.as_secs());
            return Err(StageFailure::new("extraction", error.to_string()));
        }
        Ok(Err(error)) => return Err(StageFailure::new("extraction", error.to_string())),
        Ok(Ok(extraction)) => extraction,
    };

    // Chunk indices are assigned sequentially across the whole document.
    let mut chunks: Vec<DocumentChunk> = Vec::new();
    for page in &extraction.pages {
        for text in ctx.chunker.chunk(&page.text) {
            let index = chunks.len() as u32;
            chunks.push(DocumentChunk::new(id, page.page_number, index, text));
        }
    }
    let page_count = extraction.pages.len() as u32;
    let chunk_count = chunks.len() as u32;

    embed_chunks(ctx, &mut chunks)
        .await
        .map_err(|message| StageFailure::new("embedding", message))?;

    upsert_with_retry(ctx, chunks)
        .await
        .map_err(|error| StageFailure::new("storage", error.to_string()))?;

    Ok((page_count, chunk_count))
}

/// Fill in embeddings for every chunk, consulting the cache first and
/// batching misses through the provider.
async fn embed_chunks(ctx: &PipelineContext, chunks: &mut [DocumentChunk]) -> Result<(), String> {
    let mut misses = Vec::new();
    for (i, chunk) in chunks.iter_mut().enumerate() {
        match ctx.cache.get(&chunk.content_hash) {
            Some(vector) => chunk.embedding = vector,
            None => misses.push(i),
        }
    }

    if misses.is_empty() {
        return Ok(());
    }
    tracing::debug!(
        total = chunks.len(),
        misses = misses.len(),
        "Embedding cache pass complete"
    );

    for batch in misses.chunks(ctx.batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|&i| chunks[i].text.clone()).collect();
        let vectors = embed_with_retry(ctx, texts).await?;
        for (&i, vector) in batch.iter().zip(vectors.into_iter()) {
            ctx.cache.put(&chunks[i].content_hash, vector.clone());
            chunks[i].embedding = vector;
        }
    }

    Ok(())
}

/// One embedding call under timeout and the configured backoff policy.
async fn embed_with_retry(
    ctx: &PipelineContext,
    texts: Vec<String>,
) -> Result<Vec<Vec<f32>>, String> {
    let expected = texts.len();

    let result = with_retry(&ctx.retry, || {
        let texts = texts.clone();
        async move {
            match timeout(ctx.embedding_timeout, ctx.embedder.embed_batch(texts)).await {
                Err(_) => Err(EmbeddingError::Transient(format!(
                    "embedding call timed out after {}s",
                    ctx.embedding_timeout.as_secs()
                ))),
                Ok(result) => result,
            }
        }
    })
    .await;

    let vectors = match result {
        RetryResult::Success(vectors) => vectors,
        RetryResult::Failed {
            last_error,
            attempts,
        } => {
            return Err(if last_error.is_retryable() {
                format!(
                    "transient embedding failure persisted after {} attempts: {}",
                    attempts, last_error
                )
            } else {
                last_error.to_string()
            });
        }
    };

    if vectors.len() != expected {
        return Err(format!(
            "embedding provider returned {} vectors for {} inputs",
            vectors.len(),
            expected
        ));
    }
    for vector in &vectors {
        if vector.len() != ctx.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: ctx.dimension,
                actual: vector.len(),
            }
            .to_string());
        }
    }

    Ok(vectors)
}

/// Storage failures get exactly one retry before the document fails.
async fn upsert_with_retry(
    ctx: &PipelineContext,
    chunks: Vec<DocumentChunk>,
) -> Result<(), VectorStoreError> {
    match ctx.vectors.upsert_points(chunks.clone()).await {
        Ok(()) => Ok(()),
        Err(first) => {
            tracing::warn!(error = %first, "Chunk upsert failed, retrying once");
            ctx.vectors.upsert_points(chunks).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StateError;
    use crate::models::Document;
    use crate::services::extract::{DocumentExtractor, PlainTextExtractor};
    use crate::services::state::InMemoryDocumentStore;
    use crate::services::vector_store::InMemoryVectorStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    const DIM: usize = 8;

    /// Route worker logs through the test harness; `RUST_LOG` controls
    /// verbosity.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];
        for (idx, byte) in text.bytes().enumerate() {
            embedding[idx % dimension] += f32::from(byte) / 255.0;
        }
        let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }
        embedding
    }

    /// Deterministic embedder that can fail transiently or fatally.
    struct StubEmbedder {
        dimension: usize,
        calls: AtomicU32,
        transient_failures: u32,
        fatal: bool,
    }

    impl StubEmbedder {
        fn healthy() -> Self {
            Self::with_transient_failures(0)
        }

        fn with_transient_failures(transient_failures: u32) -> Self {
            Self {
                dimension: DIM,
                calls: AtomicU32::new(0),
                transient_failures,
                fatal: false,
            }
        }

        fn fatal() -> Self {
            Self {
                dimension: DIM,
                calls: AtomicU32::new(0),
                transient_failures: 0,
                fatal: true,
            }
        }

        fn wrong_dimension() -> Self {
            Self {
                dimension: DIM + 1,
                calls: AtomicU32::new(0),
                transient_failures: 0,
                fatal: false,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fatal {
                return Err(EmbeddingError::Fatal("malformed input".to_string()));
            }
            if call < self.transient_failures {
                return Err(EmbeddingError::Transient("rate limited".to_string()));
            }
            Ok(texts.iter().map(|t| encode(t, self.dimension)).collect())
        }
    }

    struct FailingExtractor;

    #[async_trait]
    impl DocumentExtractor for FailingExtractor {
        async fn extract(
            &self,
            _bytes: &[u8],
        ) -> Result<crate::services::extract::Extraction, crate::error::ExtractionError> {
            Err(crate::error::ExtractionError::Corrupt(
                "bad xref table".to_string(),
            ))
        }
    }

    struct SlowExtractor;

    #[async_trait]
    impl DocumentExtractor for SlowExtractor {
        async fn extract(
            &self,
            bytes: &[u8],
        ) -> Result<crate::services::extract::Extraction, crate::error::ExtractionError> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            PlainTextExtractor::new().extract(bytes).await
        }
    }

    /// Vector store that fails the first N upserts, then delegates.
    struct FlakyVectorStore {
        inner: InMemoryVectorStore,
        failures_left: AtomicU32,
    }

    impl FlakyVectorStore {
        fn new(failures: u32) -> Self {
            Self {
                inner: InMemoryVectorStore::default(),
                failures_left: AtomicU32::new(failures),
            }
        }
    }

    #[async_trait]
    impl VectorStore for FlakyVectorStore {
        async fn health_check(&self) -> Result<bool, VectorStoreError> {
            self.inner.health_check().await
        }

        async fn collection_info(
            &self,
        ) -> Result<Option<crate::services::vector_store::CollectionInfo>, VectorStoreError>
        {
            self.inner.collection_info().await
        }

        async fn create_collection(&self) -> Result<(), VectorStoreError> {
            self.inner.create_collection().await
        }

        async fn upsert_points(&self, chunks: Vec<DocumentChunk>) -> Result<(), VectorStoreError> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(VectorStoreError::UpsertError(
                    "connection reset".to_string(),
                ));
            }
            self.inner.upsert_points(chunks).await
        }

        async fn search(
            &self,
            query_vector: Vec<f32>,
            limit: u64,
        ) -> Result<Vec<crate::services::vector_store::ScoredChunk>, VectorStoreError> {
            self.inner.search(query_vector, limit).await
        }

        async fn delete_by_document_ids(
            &self,
            document_ids: &[String],
        ) -> Result<(), VectorStoreError> {
            self.inner.delete_by_document_ids(document_ids).await
        }

        fn collection(&self) -> &str {
            self.inner.collection()
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.embedding.dimension = DIM as u32;
        config.embedding.initial_backoff_ms = 5;
        config.embedding.max_backoff_ms = 20;
        config.indexing.chunk_size = 100;
        config.indexing.chunk_overlap = 20;
        config.indexing.workers = 2;
        config
    }

    struct Harness {
        pipeline: IngestionPipeline,
        state: Arc<InMemoryDocumentStore>,
        vectors: Arc<InMemoryVectorStore>,
    }

    fn harness_with(
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn DocumentExtractor>,
    ) -> Harness {
        init_tracing();
        let state = Arc::new(InMemoryDocumentStore::new());
        let vectors = Arc::new(InMemoryVectorStore::default());
        let pipeline = IngestionPipeline::new(
            &test_config(),
            state.clone(),
            vectors.clone(),
            embedder,
            extractor,
        )
        .unwrap();
        Harness {
            pipeline,
            state,
            vectors,
        }
    }

    fn harness() -> Harness {
        harness_with(
            Arc::new(StubEmbedder::healthy()),
            Arc::new(PlainTextExtractor::new()),
        )
    }

    async fn wait_for_terminal(state: &InMemoryDocumentStore, id: &str) -> Document {
        for _ in 0..1000 {
            if let Ok(doc) = state.get(id).await {
                if doc.status.is_terminal() {
                    return doc;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("document {} never reached a terminal state", id);
    }

    async fn stored_chunk_ids(vectors: &InMemoryVectorStore) -> Vec<String> {
        let mut ids: Vec<String> = vectors
            .search(encode("probe", DIM), 1000)
            .await
            .unwrap()
            .into_iter()
            .map(|hit| hit.chunk_id)
            .collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn two_short_pages_complete_with_two_chunks() {
        let h = harness();
        h.state.create("doc-1", "report.txt").await.unwrap();
        h.pipeline
            .ingest("doc-1", b"first page of text\x0csecond page of text".to_vec())
            .unwrap();

        let doc = wait_for_terminal(&h.state, "doc-1").await;
        assert_eq!(doc.status, DocumentStatus::Completed);
        assert_eq!(doc.page_count, Some(2));
        assert_eq!(doc.chunk_count, Some(2));
        assert!(doc.error_message.is_none());

        let info = h.vectors.collection_info().await.unwrap().unwrap();
        assert_eq!(info.points_count, 2);
    }

    #[tokio::test]
    async fn extraction_failure_is_terminal_with_no_chunks() {
        let h = harness_with(
            Arc::new(StubEmbedder::healthy()),
            Arc::new(FailingExtractor),
        );
        h.state.create("doc-1", "broken.pdf").await.unwrap();
        h.pipeline.ingest("doc-1", vec![0xde, 0xad]).unwrap();

        let doc = wait_for_terminal(&h.state, "doc-1").await;
        assert_eq!(doc.status, DocumentStatus::Failed);
        let message = doc.error_message.unwrap();
        assert!(message.contains("extraction"));
        assert!(message.contains("bad xref table"));
        assert!(doc.chunk_count.is_none());

        let info = h.vectors.collection_info().await.unwrap().unwrap();
        assert_eq!(info.points_count, 0);
    }

    #[tokio::test]
    async fn transient_embedding_failures_are_absorbed_by_retry() {
        let h = harness_with(
            Arc::new(StubEmbedder::with_transient_failures(2)),
            Arc::new(PlainTextExtractor::new()),
        );
        h.state.create("doc-1", "a.txt").await.unwrap();
        h.pipeline.ingest("doc-1", b"some page text".to_vec()).unwrap();

        let doc = wait_for_terminal(&h.state, "doc-1").await;
        assert_eq!(doc.status, DocumentStatus::Completed);
        assert_eq!(doc.chunk_count, Some(1));
    }

    #[tokio::test]
    async fn exhausted_transient_retries_fail_the_document() {
        let h = harness_with(
            Arc::new(StubEmbedder::with_transient_failures(u32::MAX)),
            Arc::new(PlainTextExtractor::new()),
        );
        h.state.create("doc-1", "a.txt").await.unwrap();
        h.pipeline.ingest("doc-1", b"some page text".to_vec()).unwrap();

        let doc = wait_for_terminal(&h.state, "doc-1").await;
        assert_eq!(doc.status, DocumentStatus::Failed);
        let message = doc.error_message.unwrap();
        assert!(message.contains("embedding"));
        assert!(message.contains("transient"));
        assert!(message.contains("3 attempts"));
    }

    #[tokio::test]
    async fn fatal_embedding_failure_is_not_retried() {
        let embedder = Arc::new(StubEmbedder::fatal());
        let h = harness_with(embedder.clone(), Arc::new(PlainTextExtractor::new()));
        h.state.create("doc-1", "a.txt").await.unwrap();
        h.pipeline.ingest("doc-1", b"some page text".to_vec()).unwrap();

        let doc = wait_for_terminal(&h.state, "doc-1").await;
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert!(doc.error_message.unwrap().contains("malformed input"));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dimension_mismatch_fails_the_document() {
        let h = harness_with(
            Arc::new(StubEmbedder::wrong_dimension()),
            Arc::new(PlainTextExtractor::new()),
        );
        h.state.create("doc-1", "a.txt").await.unwrap();
        h.pipeline.ingest("doc-1", b"some page text".to_vec()).unwrap();

        let doc = wait_for_terminal(&h.state, "doc-1").await;
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert!(doc.error_message.unwrap().contains("dimension mismatch"));
    }

    #[tokio::test]
    async fn storage_failure_is_retried_once() {
        let state = Arc::new(InMemoryDocumentStore::new());
        let vectors = Arc::new(FlakyVectorStore::new(1));
        let pipeline = IngestionPipeline::new(
            &test_config(),
            state.clone(),
            vectors.clone(),
            Arc::new(StubEmbedder::healthy()),
            Arc::new(PlainTextExtractor::new()),
        )
        .unwrap();

        state.create("doc-1", "a.txt").await.unwrap();
        pipeline.ingest("doc-1", b"some page text".to_vec()).unwrap();

        let doc = wait_for_terminal(&state, "doc-1").await;
        assert_eq!(doc.status, DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn persistent_storage_failure_fails_the_document() {
        let state = Arc::new(InMemoryDocumentStore::new());
        let vectors = Arc::new(FlakyVectorStore::new(u32::MAX));
        let pipeline = IngestionPipeline::new(
            &test_config(),
            state.clone(),
            vectors,
            Arc::new(StubEmbedder::healthy()),
            Arc::new(PlainTextExtractor::new()),
        )
        .unwrap();

        state.create("doc-1", "a.txt").await.unwrap();
        pipeline.ingest("doc-1", b"some page text".to_vec()).unwrap();

        let doc = wait_for_terminal(&state, "doc-1").await;
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert!(doc.error_message.unwrap().contains("storage"));
    }

    #[tokio::test]
    async fn second_ingest_for_active_document_is_rejected() {
        let h = harness_with(Arc::new(StubEmbedder::healthy()), Arc::new(SlowExtractor));
        h.state.create("doc-1", "a.txt").await.unwrap();
        h.pipeline.ingest("doc-1", b"page".to_vec()).unwrap();

        let second = h.pipeline.ingest("doc-1", b"page".to_vec());
        assert!(matches!(second, Err(PipelineError::AlreadyInProgress(_))));

        let doc = wait_for_terminal(&h.state, "doc-1").await;
        assert_eq!(doc.status, DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn distinct_documents_process_in_parallel() {
        let h = harness();
        for i in 0..5 {
            let id = format!("doc-{}", i);
            h.state.create(&id, "a.txt").await.unwrap();
            h.pipeline
                .ingest(&id, format!("text for document {}\x0cand page two", i).into_bytes())
                .unwrap();
        }

        for i in 0..5 {
            let doc = wait_for_terminal(&h.state, &format!("doc-{}", i)).await;
            assert_eq!(doc.status, DocumentStatus::Completed);
            assert_eq!(doc.page_count, Some(2));
        }
    }

    #[tokio::test]
    async fn reprocess_yields_identical_chunk_ids() {
        let h = harness();
        let bytes = b"a deterministic page of text\x0cand a second deterministic page".to_vec();
        h.state.create("doc-1", "a.txt").await.unwrap();
        h.pipeline.ingest("doc-1", bytes.clone()).unwrap();
        wait_for_terminal(&h.state, "doc-1").await;

        let first_ids = stored_chunk_ids(&h.vectors).await;
        assert!(!first_ids.is_empty());

        h.pipeline.reprocess("doc-1", bytes).await.unwrap();
        let doc = wait_for_terminal(&h.state, "doc-1").await;
        assert_eq!(doc.status, DocumentStatus::Completed);

        let second_ids = stored_chunk_ids(&h.vectors).await;
        assert_eq!(first_ids, second_ids);
    }

    #[tokio::test]
    async fn reprocess_right_after_observing_terminal_state_is_accepted() {
        let h = harness();
        let bytes = b"a page of text".to_vec();
        h.state.create("doc-1", "a.txt").await.unwrap();
        h.pipeline.ingest("doc-1", bytes.clone()).unwrap();

        // Once a poller sees a terminal status, the id must already be free:
        // an immediate reprocess may never bounce off the registry.
        for _ in 0..10 {
            wait_for_terminal(&h.state, "doc-1").await;
            h.pipeline.reprocess("doc-1", bytes.clone()).await.unwrap();
        }

        let doc = wait_for_terminal(&h.state, "doc-1").await;
        assert_eq!(doc.status, DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn reprocess_requires_a_terminal_document() {
        let h = harness();
        h.state.create("doc-1", "a.txt").await.unwrap();

        // Still pending: the state store refuses the reset.
        let result = h.pipeline.reprocess("doc-1", b"page".to_vec()).await;
        assert!(matches!(
            result,
            Err(PipelineError::State(StateError::Conflict { .. }))
        ));
    }

    #[tokio::test]
    async fn cache_avoids_re_embedding_identical_content() {
        let embedder = Arc::new(StubEmbedder::healthy());
        let h = harness_with(embedder.clone(), Arc::new(PlainTextExtractor::new()));

        h.state.create("doc-1", "a.txt").await.unwrap();
        h.pipeline.ingest("doc-1", b"identical page".to_vec()).unwrap();
        wait_for_terminal(&h.state, "doc-1").await;
        let calls_after_first = embedder.calls.load(Ordering::SeqCst);

        // Same content under a different document id: cache hit, no new call.
        h.state.create("doc-2", "b.txt").await.unwrap();
        h.pipeline.ingest("doc-2", b"identical page".to_vec()).unwrap();
        let doc = wait_for_terminal(&h.state, "doc-2").await;

        assert_eq!(doc.status, DocumentStatus::Completed);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), calls_after_first);
    }

    #[tokio::test]
    async fn empty_document_completes_with_zero_chunks() {
        let h = harness();
        h.state.create("doc-1", "empty.txt").await.unwrap();
        h.pipeline.ingest("doc-1", Vec::new()).unwrap();

        let doc = wait_for_terminal(&h.state, "doc-1").await;
        assert_eq!(doc.status, DocumentStatus::Completed);
        assert_eq!(doc.page_count, Some(0));
        assert_eq!(doc.chunk_count, Some(0));
    }

    #[tokio::test]
    async fn shutdown_drains_queued_work() {
        let h = harness();
        h.state.create("doc-1", "a.txt").await.unwrap();
        h.pipeline.ingest("doc-1", b"page text".to_vec()).unwrap();

        h.pipeline.shutdown().await;

        let doc = h.state.get("doc-1").await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Completed);
    }
}
