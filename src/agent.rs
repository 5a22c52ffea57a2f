//! Reasoning agent capability and the default grounded agent.
//!
//! `ReasoningAgent` is the single seam the chat flow drives: `run(query)` →
//! answer text. The default implementation retrieves context through the
//! session's `FusionRetriever`, then asks an OpenAI-compatible chat endpoint
//! to answer with bracketed `[Source: ..., Page/Time: ...]` citations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::retrieval::FusionRetriever;

/// System prompt for the study assistant. The bracketed citation format is
/// load-bearing: the citation extractor parses exactly this shape out of the
/// answer text.
const SYSTEM_PROMPT: &str = "\
You are a multi-source study assistant. You answer questions about the user's \
uploaded documents, web pages, and videos using the retrieved excerpts below.

INSTRUCTIONS:
1. You may combine your general knowledge with the retrieved excerpts.
2. When a claim comes from an excerpt, cite it as [Source: filename, Page: X] \
for documents and web pages, or [Source: filename, Time: MM:SS] for videos.
3. If the user asks to be strictly bound to sources, use ONLY the retrieved \
excerpts and nothing else.
4. Prefer source material when it is available, and never invent citations \
for claims the excerpts do not support.";

#[async_trait]
pub trait ReasoningAgent: Send + Sync {
    /// Answer a query. May drive retrieval internally any number of times.
    async fn run(&self, query: &str) -> Result<String, ApiError>;
}

/// Chat completion capability consumed by the default agent.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, system: &str, user: &str) -> Result<String, ApiError>;
}

/// OpenAI-compatible `/v1/chat/completions` client.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    timeout: Duration,
    client: Client,
}

impl OpenAiCompatClient {
    pub fn new(
        base_url: String,
        model: String,
        api_key: Option<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            temperature,
            timeout,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn chat(&self, system: &str, user: &str) -> Result<String, ApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": self.temperature,
            "stream": false,
        });

        let mut request = self.client.post(&url).timeout(self.timeout).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await.map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            // Keep the status code in the error text: the retry layer
            // classifies on "503"/"429"/"overloaded"/"rate limit".
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Chat completion failed ({}): {}",
                status.as_u16(),
                text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(content)
    }
}

/// Default agent: one retrieval pass, one grounded completion.
///
/// Exclusively owned by its session; the bound retriever carries the
/// session's source-id filter, so the agent never sees chunks outside it.
pub struct GroundedAgent {
    retriever: FusionRetriever,
    llm: Arc<dyn LlmClient>,
}

impl GroundedAgent {
    pub fn new(retriever: FusionRetriever, llm: Arc<dyn LlmClient>) -> Self {
        Self { retriever, llm }
    }
}

#[async_trait]
impl ReasoningAgent for GroundedAgent {
    async fn run(&self, query: &str) -> Result<String, ApiError> {
        // Retrieval trouble degrades to an empty context rather than failing
        // the whole turn; only the reasoning call itself can fail here.
        let context = match self.retriever.retrieve_context(query).await {
            Ok(context) => context,
            Err(err) => {
                tracing::warn!("Retrieval failed, answering without context: {}", err);
                "No relevant documents found in the knowledge base.".to_string()
            }
        };

        let user = format!("{}\n{}", query, context);
        self.llm.chat(SYSTEM_PROMPT, &user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedder;
    use crate::models::{RetrievalResult, SourceInfo};
    use crate::store::VectorStore;
    use std::sync::{Arc, Mutex};

    struct RecordingLlm {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for RecordingLlm {
        async fn chat(&self, _system: &str, user: &str) -> Result<String, ApiError> {
            self.prompts.lock().unwrap().push(user.to_string());
            Ok("answer [Source: Math.pdf, Page: 5]".to_string())
        }
    }

    struct NullEmbedder;

    #[async_trait]
    impl Embedder for NullEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ApiError> {
            Ok(vec![0.0])
        }

        async fn embed_many(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(Vec::new())
        }
    }

    struct OneHitStore;

    #[async_trait]
    impl VectorStore for OneHitStore {
        async fn search(
            &self,
            collection: &str,
            _vector: &[f32],
            _top_k: usize,
            _score_threshold: f32,
            _source_ids: &[String],
        ) -> Result<Vec<RetrievalResult>, ApiError> {
            if collection != "documents" {
                return Ok(Vec::new());
            }
            Ok(vec![RetrievalResult {
                content: "Linear algebra studies vectors.".to_string(),
                score: 0.9,
                metadata: std::collections::HashMap::from([
                    ("source_id".to_string(), serde_json::json!("s1")),
                    ("source_name".to_string(), serde_json::json!("Math.pdf")),
                    ("page_number".to_string(), serde_json::json!(5)),
                ]),
            }])
        }

        async fn list_sources(&self) -> Result<Vec<SourceInfo>, ApiError> {
            Ok(Vec::new())
        }

        async fn get_source(&self, _source_id: &str) -> Result<Option<SourceInfo>, ApiError> {
            Ok(None)
        }

        async fn delete_source(&self, _source_id: &str) -> Result<(), ApiError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn run_feeds_retrieved_context_to_the_llm() {
        let retriever = FusionRetriever::new(
            Arc::new(NullEmbedder),
            Arc::new(OneHitStore),
            vec!["documents".to_string(), "web_pages".to_string()],
            Vec::new(),
            0.0,
            10,
        );
        let llm = Arc::new(RecordingLlm {
            prompts: Mutex::new(Vec::new()),
        });
        let agent = GroundedAgent::new(retriever, llm.clone());

        let answer = agent.run("what is linear algebra?").await.unwrap();
        assert!(answer.contains("[Source: Math.pdf, Page: 5]"));

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("what is linear algebra?"));
        assert!(prompts[0].contains("Source: Math.pdf, Page: 5"));
    }
}
