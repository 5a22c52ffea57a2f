//! Domain types shared across retrieval, sessions, and the HTTP surface.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content type of an ingested source. Each type lives in its own vector
/// collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Document,
    WebPage,
    Video,
}

/// An ingested unit of content (document, web page, or video). Ingestion
/// happens elsewhere; this service only reads and filters by `source_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub source_id: String,
    pub source_type: SourceType,
    pub source_name: String,
    pub uploaded_at: String,
    pub chunk_count: usize,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// One chunk returned by a single-collection similarity search, with its
/// score. Scores across collections share one embedding space and distance
/// metric, so they are directly comparable when fusing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub content: String,
    pub score: f32,
    /// Carries at least `source_id`, `source_name`, and `source_type`, plus a
    /// location hint (`page_number` for documents, `timestamp` for videos).
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl RetrievalResult {
    pub fn source_id(&self) -> Option<&str> {
        self.metadata.get("source_id").and_then(Value::as_str)
    }

    pub fn source_name(&self) -> &str {
        self.metadata
            .get("source_name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn in a session transcript. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
}

/// A structured reference extracted from an assistant answer.
///
/// Only `citation_id`, `source_name`, and `location` can be recovered from the
/// answer text; `source_id`, `source_type`, and `preview_text` are emitted as
/// placeholders and must be treated as advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub citation_id: usize,
    pub source_id: String,
    pub source_name: String,
    pub source_type: SourceType,
    pub location: String,
    pub preview_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f32>,
}
