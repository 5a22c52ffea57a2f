//! Qdrant REST implementation of the `VectorStore` trait.
//!
//! Talks to the Qdrant HTTP API directly: points search with a
//! should-match-any filter on `metadata.source_id`, filtered scroll for the
//! source catalog, and delete-by-filter for source removal.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::models::{RetrievalResult, SourceInfo, SourceType};
use crate::store::VectorStore;

const SCROLL_PAGE_SIZE: usize = 256;

#[derive(Clone)]
pub struct QdrantStore {
    base_url: String,
    api_key: Option<String>,
    collections: Vec<String>,
    dimension: usize,
    timeout: Duration,
    client: Client,
}

impl QdrantStore {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        collections: Vec<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            collections,
            dimension,
            timeout,
            client: Client::new(),
        }
    }

    /// Create any missing collections. Called once at startup.
    pub async fn ensure_collections(&self) -> Result<(), ApiError> {
        for collection in &self.collections {
            let url = format!("{}/collections/{}", self.base_url, collection);
            let res = self.get(&url).send().await.map_err(ApiError::upstream)?;
            if res.status().is_success() {
                continue;
            }

            let body = json!({
                "vectors": { "size": self.dimension, "distance": "Cosine" }
            });
            let res = self
                .put(&url)
                .json(&body)
                .send()
                .await
                .map_err(ApiError::upstream)?;
            if !res.status().is_success() {
                let status = res.status();
                let text = res.text().await.unwrap_or_default();
                return Err(ApiError::Upstream(format!(
                    "Failed to create collection {} ({}): {}",
                    collection, status, text
                )));
            }
            tracing::info!("Created collection: {}", collection);
        }
        Ok(())
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.with_auth(self.client.get(url))
    }

    fn put(&self, url: &str) -> reqwest::RequestBuilder {
        self.with_auth(self.client.put(url))
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.with_auth(self.client.post(url))
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.timeout(self.timeout);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    fn source_filter(source_ids: &[String]) -> Value {
        let conditions: Vec<Value> = source_ids
            .iter()
            .map(|id| json!({ "key": "metadata.source_id", "match": { "value": id } }))
            .collect();
        json!({ "should": conditions })
    }

    async fn post_json(&self, url: &str, body: Value) -> Result<Value, ApiError> {
        let res = self
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Qdrant request failed ({}): {}",
                status, text
            )));
        }
        res.json().await.map_err(ApiError::upstream)
    }

    /// Scroll every chunk's payload metadata in one collection.
    async fn scroll_metadata(&self, collection: &str) -> Result<Vec<Value>, ApiError> {
        let url = format!("{}/collections/{}/points/scroll", self.base_url, collection);
        let mut metadatas = Vec::new();
        let mut offset: Option<Value> = None;

        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE_SIZE,
                "with_payload": true,
                "with_vector": false,
            });
            if let Some(offset) = &offset {
                body["offset"] = offset.clone();
            }

            let payload = self.post_json(&url, body).await?;
            let points = payload["result"]["points"]
                .as_array()
                .cloned()
                .unwrap_or_default();
            for point in &points {
                if let Some(metadata) = point["payload"].get("metadata") {
                    metadatas.push(metadata.clone());
                }
            }

            match payload["result"].get("next_page_offset") {
                Some(next) if !next.is_null() => offset = Some(next.clone()),
                _ => break,
            }
        }
        Ok(metadatas)
    }

    fn collect_sources(metadatas: Vec<Value>) -> Vec<SourceInfo> {
        let mut by_id: HashMap<String, SourceInfo> = HashMap::new();

        for metadata in metadatas {
            let Some(source_id) = metadata.get("source_id").and_then(Value::as_str) else {
                continue;
            };
            let entry = by_id
                .entry(source_id.to_string())
                .or_insert_with(|| SourceInfo {
                    source_id: source_id.to_string(),
                    source_type: parse_source_type(&metadata),
                    source_name: metadata
                        .get("source_name")
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown")
                        .to_string(),
                    uploaded_at: metadata
                        .get("uploaded_at")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    chunk_count: 0,
                    metadata: metadata
                        .as_object()
                        .map(|map| map.clone().into_iter().collect())
                        .unwrap_or_default(),
                });
            entry.chunk_count += 1;
        }

        let mut sources: Vec<SourceInfo> = by_id.into_values().collect();
        sources.sort_by(|a, b| a.source_name.cmp(&b.source_name));
        sources
    }
}

fn parse_source_type(metadata: &Value) -> SourceType {
    match metadata.get("source_type").and_then(Value::as_str) {
        Some("web_page") => SourceType::WebPage,
        Some("video") => SourceType::Video,
        _ => SourceType::Document,
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        score_threshold: f32,
        source_ids: &[String],
    ) -> Result<Vec<RetrievalResult>, ApiError> {
        let url = format!("{}/collections/{}/points/search", self.base_url, collection);
        let mut body = json!({
            "vector": vector,
            "limit": top_k,
            "score_threshold": score_threshold,
            "with_payload": true,
        });
        if !source_ids.is_empty() {
            body["filter"] = Self::source_filter(source_ids);
        }

        let payload = self.post_json(&url, body).await?;
        let hits = payload["result"].as_array().cloned().unwrap_or_default();

        let results = hits
            .into_iter()
            .map(|hit| RetrievalResult {
                content: hit["payload"]["content"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
                score: hit["score"].as_f64().unwrap_or(0.0) as f32,
                metadata: hit["payload"]["metadata"]
                    .as_object()
                    .map(|map| map.clone().into_iter().collect())
                    .unwrap_or_default(),
            })
            .collect();
        Ok(results)
    }

    async fn list_sources(&self) -> Result<Vec<SourceInfo>, ApiError> {
        let mut metadatas = Vec::new();
        for collection in &self.collections {
            metadatas.extend(self.scroll_metadata(collection).await?);
        }
        Ok(Self::collect_sources(metadatas))
    }

    async fn get_source(&self, source_id: &str) -> Result<Option<SourceInfo>, ApiError> {
        let sources = self.list_sources().await?;
        Ok(sources.into_iter().find(|s| s.source_id == source_id))
    }

    async fn delete_source(&self, source_id: &str) -> Result<(), ApiError> {
        for collection in &self.collections {
            let url = format!("{}/collections/{}/points/delete", self.base_url, collection);
            let body = json!({
                "filter": {
                    "must": [
                        { "key": "metadata.source_id", "match": { "value": source_id } }
                    ]
                }
            });
            self.post_json(&url, body).await?;
        }
        tracing::info!("Deleted source: {}", source_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_filter_matches_any_of_the_ids() {
        let filter = QdrantStore::source_filter(&["a".to_string(), "b".to_string()]);
        let should = filter["should"].as_array().expect("should clause");
        assert_eq!(should.len(), 2);
        assert_eq!(should[0]["key"], "metadata.source_id");
        assert_eq!(should[0]["match"]["value"], "a");
        assert_eq!(should[1]["match"]["value"], "b");
    }

    #[test]
    fn collect_sources_groups_chunks_by_source() {
        let metadatas = vec![
            json!({"source_id": "s1", "source_name": "Math.pdf", "source_type": "document"}),
            json!({"source_id": "s1", "source_name": "Math.pdf", "source_type": "document"}),
            json!({"source_id": "s2", "source_name": "Clip.mp4", "source_type": "video"}),
        ];
        let sources = QdrantStore::collect_sources(metadatas);
        assert_eq!(sources.len(), 2);

        let math = sources.iter().find(|s| s.source_id == "s1").unwrap();
        assert_eq!(math.chunk_count, 2);
        assert_eq!(math.source_type, SourceType::Document);

        let clip = sources.iter().find(|s| s.source_id == "s2").unwrap();
        assert_eq!(clip.chunk_count, 1);
        assert_eq!(clip.source_type, SourceType::Video);
    }
}
