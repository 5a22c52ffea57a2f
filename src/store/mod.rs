//! Vector store capability.
//!
//! Abstract interface over the vector database. The retrieval layer and the
//! sources API depend only on this trait; the production implementation is
//! `QdrantStore` in the `qdrant` module.

mod qdrant;

pub use qdrant::QdrantStore;

use async_trait::async_trait;

use crate::core::errors::ApiError;
use crate::models::{RetrievalResult, SourceInfo};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Similarity search within one collection.
    ///
    /// When `source_ids` is non-empty the search is restricted to chunks whose
    /// `metadata.source_id` matches any one of them (should-match-any).
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        score_threshold: f32,
        source_ids: &[String],
    ) -> Result<Vec<RetrievalResult>, ApiError>;

    /// List all ingested sources across collections.
    async fn list_sources(&self) -> Result<Vec<SourceInfo>, ApiError>;

    /// Look up one source by id.
    async fn get_source(&self, source_id: &str) -> Result<Option<SourceInfo>, ApiError>;

    /// Delete every chunk belonging to a source, across collections.
    async fn delete_source(&self, source_id: &str) -> Result<(), ApiError>;
}
