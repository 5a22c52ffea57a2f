use std::sync::Arc;
use std::time::Duration;

use crate::agent::{GroundedAgent, LlmClient, OpenAiCompatClient, ReasoningAgent};
use crate::chat::ChatService;
use crate::core::config::Settings;
use crate::embedding::{Embedder, HttpEmbedder};
use crate::retrieval::FusionRetriever;
use crate::session::SessionRegistry;
use crate::store::{QdrantStore, VectorStore};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn VectorStore>,
    pub chat: Arc<ChatService>,
}

impl AppState {
    /// Wire the full object graph once at startup; handlers receive it by
    /// reference through axum state.
    pub async fn initialize(settings: Settings) -> Arc<Self> {
        let settings = Arc::new(settings);
        let collections: Vec<String> = settings
            .collections()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let timeout = Duration::from_secs(settings.request_timeout_secs);
        let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(
            settings.embedding_base_url.clone(),
            settings.embedding_model.clone(),
            timeout,
        ));
        let qdrant = QdrantStore::new(
            settings.qdrant_url.clone(),
            settings.qdrant_api_key.clone(),
            collections.clone(),
            settings.embedding_dimension,
            timeout,
        );
        // Best-effort at startup; a store that is down here may come back
        // before the first query.
        if let Err(err) = qdrant.ensure_collections().await {
            tracing::warn!("Failed to ensure collections: {}", err);
        }
        let store: Arc<dyn VectorStore> = Arc::new(qdrant);
        let llm: Arc<dyn LlmClient> = Arc::new(OpenAiCompatClient::new(
            settings.llm_base_url.clone(),
            settings.llm_model.clone(),
            settings.llm_api_key.clone(),
            settings.llm_temperature,
            timeout,
        ));

        // Each new session gets an agent whose retriever is bound to exactly
        // that session's source-id set.
        let factory = {
            let embedder = embedder.clone();
            let store = store.clone();
            let settings = settings.clone();
            move |source_ids: &[String]| -> Arc<dyn ReasoningAgent> {
                let retriever = FusionRetriever::new(
                    embedder.clone(),
                    store.clone(),
                    collections.clone(),
                    source_ids.to_vec(),
                    settings.score_threshold,
                    settings.retrieval_top_k,
                );
                Arc::new(GroundedAgent::new(retriever, llm.clone()))
            }
        };
        let registry = Arc::new(SessionRegistry::new(Arc::new(factory)));
        let chat = Arc::new(ChatService::new(registry, settings.max_retry_attempts));

        Arc::new(AppState {
            settings,
            store,
            chat,
        })
    }
}
