//! Fusion retrieval across the per-content-type collections.
//!
//! A `FusionRetriever` is bound at construction to a fixed set of source ids
//! (empty set = search everything). `search_all` embeds the query once, fans
//! out one similarity search per collection concurrently, and merges the
//! results into a single list ranked by score.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::core::errors::ApiError;
use crate::embedding::Embedder;
use crate::models::RetrievalResult;
use crate::store::VectorStore;

const CONTEXT_SNIPPET_LEN: usize = 500;

pub struct FusionRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collections: Vec<String>,
    /// Bound source-id filter; empty means unfiltered.
    source_ids: Vec<String>,
    score_threshold: f32,
    top_k: usize,
}

impl FusionRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collections: Vec<String>,
        source_ids: Vec<String>,
        score_threshold: f32,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            collections,
            source_ids,
            score_threshold,
            top_k,
        }
    }

    /// Search every collection and return the overall `top_k` results, ranked
    /// by score descending. A failure in one collection is absorbed as zero
    /// results from it; only an embedding failure aborts the call.
    pub async fn search_all(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>, ApiError> {
        let vector = self.embedder.embed(query).await?;

        let searches = self.collections.iter().map(|collection| {
            let vector = &vector;
            async move {
                let outcome = self
                    .store
                    .search(
                        collection,
                        vector,
                        top_k,
                        self.score_threshold,
                        &self.source_ids,
                    )
                    .await;
                match outcome {
                    Ok(results) => {
                        tracing::debug!("Found {} results in {}", results.len(), collection);
                        results
                    }
                    Err(err) => {
                        tracing::warn!("Search failed in {}: {}", collection, err);
                        Vec::new()
                    }
                }
            }
        });

        // join_all preserves collection order, and the sort below is stable,
        // so ties keep collection order then per-collection rank.
        let mut merged: Vec<RetrievalResult> =
            join_all(searches).await.into_iter().flatten().collect();
        merged.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        merged.truncate(top_k);
        Ok(merged)
    }

    /// Retrieve and render results as a context block for the reasoning
    /// prompt: source name, location marker, video URL when present, and a
    /// truncated content snippet.
    pub async fn retrieve_context(&self, query: &str) -> Result<String, ApiError> {
        let results = self.search_all(query, self.top_k).await?;

        if results.is_empty() {
            return Ok("No relevant documents found in the knowledge base.".to_string());
        }

        let mut formatted = String::from("\n\nRetrieved documents:\n");
        for (i, result) in results.iter().enumerate() {
            let mut source_info = format!("Source: {}", result.source_name());
            if let Some(page) = result.metadata.get("page_number") {
                source_info.push_str(&format!(", Page: {}", page));
            }
            if let Some(ts) = result.metadata.get("timestamp").and_then(|v| v.as_str()) {
                source_info.push_str(&format!(", Time: {}", ts));
            }

            formatted.push_str(&format!("\n===== Document {} =====\n", i));
            formatted.push_str(&source_info);
            formatted.push('\n');

            if let Some(url) = result.metadata.get("video_url").and_then(|v| v.as_str()) {
                formatted.push_str(&format!("Video URL: {}\n", url));
            }

            let snippet: String = result.content.chars().take(CONTEXT_SNIPPET_LEN).collect();
            formatted.push_str(&format!("Content: {}...\n", snippet));
        }

        tracing::info!(
            "Retrieved {} documents for query: {:.50}...",
            results.len(),
            query
        );
        Ok(formatted)
    }
}
