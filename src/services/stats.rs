//! Collection statistics computed from the document state store.

use std::sync::Arc;

use crate::error::StateError;
use crate::models::{CollectionStats, DocumentStatus, StatusCounts};
use crate::services::state::DocumentStore;

/// Aggregates document records into collection-level statistics.
///
/// Every call is a fresh scan over the state store; nothing is cached, so
/// the numbers always reflect the current lifecycle state. Page and chunk
/// totals count only documents that finished processing, since counts are
/// recorded at completion.
pub struct StatsAggregator {
    state: Arc<dyn DocumentStore>,
}

impl StatsAggregator {
    pub fn new(state: Arc<dyn DocumentStore>) -> Self {
        Self { state }
    }

    pub async fn collection_stats(&self) -> Result<CollectionStats, StateError> {
        let docs = self.state.list().await?;

        let mut by_status = StatusCounts::default();
        let mut total_pages = 0u64;
        let mut total_chunks = 0u64;

        for doc in &docs {
            match doc.status {
                DocumentStatus::Pending => by_status.pending += 1,
                DocumentStatus::Processing => by_status.processing += 1,
                DocumentStatus::Completed => by_status.completed += 1,
                DocumentStatus::Failed => by_status.failed += 1,
            }
            total_pages += u64::from(doc.page_count.unwrap_or(0));
            total_chunks += u64::from(doc.chunk_count.unwrap_or(0));
        }

        let total_documents = docs.len() as u64;
        let (average_pages, average_chunks_per_document) = if total_documents == 0 {
            (0.0, 0.0)
        } else {
            (
                total_pages as f64 / total_documents as f64,
                total_chunks as f64 / total_documents as f64,
            )
        };

        Ok(CollectionStats {
            total_documents,
            total_pages,
            total_chunks,
            average_pages,
            average_chunks_per_document,
            documents_by_status: by_status,
        })
    }
}
