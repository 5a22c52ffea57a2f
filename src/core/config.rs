//! Application settings.
//!
//! Settings load from an optional TOML file (path in `MASA_CONFIG`), with
//! environment variable overrides for the values that differ per deployment
//! (endpoints, API keys, bind port). Everything has a sensible default so the
//! server starts with no config file at all.

use std::env;
use std::path::Path;

use serde::Deserialize;

use crate::core::errors::ApiError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Bind address for the HTTP server.
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Directory for rolling log files.
    pub log_dir: String,

    /// Qdrant REST endpoint.
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub collection_documents: String,
    pub collection_web: String,
    pub collection_videos: String,
    pub embedding_dimension: usize,

    /// OpenAI-compatible embedding endpoint.
    pub embedding_base_url: String,
    pub embedding_model: String,

    /// OpenAI-compatible chat completion endpoint.
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub llm_temperature: f32,

    /// Results per collection and overall cap for fused retrieval.
    pub retrieval_top_k: usize,
    pub score_threshold: f32,
    /// Attempt budget for the retry-guarded reasoning call.
    pub max_retry_attempts: usize,
    /// Upper bound on each outbound HTTP call (embedding, search, reasoning).
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost".to_string(),
                "http://localhost:8501".to_string(),
            ],
            log_dir: "logs".to_string(),
            qdrant_url: "http://localhost:6333".to_string(),
            qdrant_api_key: None,
            collection_documents: "documents".to_string(),
            collection_web: "web_pages".to_string(),
            collection_videos: "videos".to_string(),
            embedding_dimension: 768,
            embedding_base_url: "http://localhost:8080".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            llm_base_url: "http://localhost:8080".to_string(),
            llm_model: "gemini-2.0-flash".to_string(),
            llm_api_key: None,
            llm_temperature: 0.2,
            retrieval_top_k: 10,
            score_threshold: 0.0,
            max_retry_attempts: 3,
            request_timeout_secs: 60,
        }
    }
}

impl Settings {
    /// Load settings from `MASA_CONFIG` (if set) and apply env overrides.
    pub fn load() -> Result<Self, ApiError> {
        let mut settings = match env::var("MASA_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Settings::default(),
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ApiError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ApiError::internal(format!("Failed to read config {:?}: {}", path, e)))?;
        toml::from_str(&raw)
            .map_err(|e| ApiError::internal(format!("Invalid config {:?}: {}", path, e)))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Ok(url) = env::var("QDRANT_URL") {
            self.qdrant_url = url;
        }
        if let Ok(key) = env::var("QDRANT_API_KEY") {
            if !key.is_empty() {
                self.qdrant_api_key = Some(key);
            }
        }
        if let Ok(url) = env::var("EMBEDDING_BASE_URL") {
            self.embedding_base_url = url;
        }
        if let Ok(url) = env::var("LLM_BASE_URL") {
            self.llm_base_url = url;
        }
        if let Ok(key) = env::var("LLM_API_KEY") {
            if !key.is_empty() {
                self.llm_api_key = Some(key);
            }
        }
    }

    pub fn collections(&self) -> [&str; 3] {
        [
            self.collection_documents.as_str(),
            self.collection_web.as_str(),
            self.collection_videos.as_str(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let settings = Settings::default();
        assert_eq!(settings.retrieval_top_k, 10);
        assert_eq!(settings.max_retry_attempts, 3);
        assert_eq!(
            settings.collections(),
            ["documents", "web_pages", "videos"]
        );
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings: Settings =
            toml::from_str("port = 9000\nretrieval_top_k = 5").expect("parse");
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.retrieval_top_k, 5);
        assert_eq!(settings.collection_videos, "videos");
    }
}
