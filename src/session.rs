//! Session identity and the session registry.
//!
//! A session is keyed by the *set* of selected source ids: the key is
//! order-independent, so `{a, b}` and `{b, a}` land in the same conversation.
//! The registry owns one lazily built reasoning agent plus an append-only
//! transcript per key. It is constructed once at startup and handed to
//! request handlers through `AppState`; there are no module-level globals.

use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::agent::ReasoningAgent;
use crate::models::{Citation, Message, Role};

/// Key used when no sources are selected: chat against everything.
pub const ALL_SOURCES_KEY: &str = "all_sources";

/// Derive the session key for a set of source ids.
///
/// Ids are sorted before hashing so input order cannot change the key. The
/// digest only needs determinism and low collision probability, not secrecy;
/// SHA-256 is what we already ship for content hashing.
pub fn derive_session_key(source_ids: &[String]) -> String {
    if source_ids.is_empty() {
        return ALL_SOURCES_KEY.to_string();
    }

    let mut sorted: Vec<&String> = source_ids.iter().collect();
    sorted.sort();
    sorted.dedup();
    // serde_json of the sorted list gives an unambiguous byte encoding
    // (escaping prevents ["ab"] and ["a","b"] from colliding).
    let serialized = serde_json::to_string(&sorted).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    hex::encode(hasher.finalize())
}

struct Session {
    /// None only for the defensive bare-transcript case: an `append` hit a
    /// key no query has been processed for yet.
    agent: Option<Arc<dyn ReasoningAgent>>,
    transcript: Vec<Message>,
}

#[derive(Default)]
pub struct SessionSummary {
    pub session_key: String,
    pub message_count: usize,
}

/// Builds a retrieval-scoped agent for a given source-id set. The registry
/// calls this exactly once per session key.
pub trait AgentFactory: Send + Sync {
    fn build(&self, source_ids: &[String]) -> Arc<dyn ReasoningAgent>;
}

impl<F> AgentFactory for F
where
    F: Fn(&[String]) -> Arc<dyn ReasoningAgent> + Send + Sync,
{
    fn build(&self, source_ids: &[String]) -> Arc<dyn ReasoningAgent> {
        self(source_ids)
    }
}

pub struct SessionRegistry {
    factory: Arc<dyn AgentFactory>,
    // One lock over the whole map, held across check-then-insert: this is
    // what guarantees at most one agent is ever constructed per key. Agent
    // construction is pure in-memory wiring, so the critical section is
    // short and never awaits an external service.
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn AgentFactory>) -> Self {
        Self {
            factory,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Return the existing session for this source-set, or build one.
    ///
    /// Reuse never reconstructs the agent: the returned `Arc` is the same
    /// instance for every call with an equivalent source-id set.
    pub async fn get_or_create(
        &self,
        source_ids: &[String],
    ) -> (Arc<dyn ReasoningAgent>, String) {
        let session_key = derive_session_key(source_ids);
        let mut sessions = self.sessions.lock().await;

        if let Some(agent) = sessions.get(&session_key).and_then(|s| s.agent.clone()) {
            tracing::info!(
                "Reusing session {:.8}... ({} sources)",
                session_key,
                source_ids.len()
            );
            return (agent, session_key);
        }

        tracing::info!(
            "Creating session {:.8}... ({} sources)",
            session_key,
            source_ids.len()
        );
        let agent = self.factory.build(source_ids);
        let session = sessions.entry(session_key.clone()).or_insert_with(|| Session {
            agent: None,
            transcript: Vec::new(),
        });
        session.agent = Some(agent.clone());
        (agent, session_key)
    }

    /// Append one immutable message to a session's transcript.
    ///
    /// Unknown keys get a transcript lazily; that should not happen in the
    /// normal flow but must not drop the message.
    pub async fn append(
        &self,
        session_key: &str,
        role: Role,
        content: String,
        citations: Option<Vec<Citation>>,
    ) {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(session_key) {
            Some(session) => session.transcript.push(Message {
                role,
                content,
                citations,
            }),
            None => {
                tracing::warn!(
                    "Append to unknown session {:.8}..., creating bare transcript",
                    session_key
                );
                sessions.insert(
                    session_key.to_string(),
                    Session {
                        agent: None,
                        transcript: vec![Message {
                            role,
                            content,
                            citations,
                        }],
                    },
                );
            }
        }
    }

    /// Cloned snapshot of a transcript; empty if the key is unknown. Callers
    /// cannot corrupt registry state through the returned value.
    pub async fn get_transcript(&self, session_key: &str) -> Vec<Message> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(session_key)
            .map(|s| s.transcript.clone())
            .unwrap_or_default()
    }

    pub async fn active_sessions(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.lock().await;
        sessions
            .iter()
            .map(|(key, session)| SessionSummary {
                session_key: key.clone(),
                message_count: session.transcript.len(),
            })
            .collect()
    }

    /// Remove one session. Returns whether it existed.
    pub async fn evict(&self, session_key: &str) -> bool {
        let removed = self.sessions.lock().await.remove(session_key).is_some();
        if removed {
            tracing::info!("Cleared session {:.8}...", session_key);
        }
        removed
    }

    pub async fn evict_all(&self) {
        self.sessions.lock().await.clear();
        tracing::info!("Cleared all sessions");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ApiError;
    use async_trait::async_trait;

    struct EchoAgent;

    #[async_trait]
    impl ReasoningAgent for EchoAgent {
        async fn run(&self, query: &str) -> Result<String, ApiError> {
            Ok(query.to_string())
        }
    }

    fn registry() -> SessionRegistry {
        let factory = |_: &[String]| -> Arc<dyn ReasoningAgent> { Arc::new(EchoAgent) };
        SessionRegistry::new(Arc::new(factory))
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn key_is_order_independent() {
        assert_eq!(
            derive_session_key(&ids(&["b", "a"])),
            derive_session_key(&ids(&["a", "b"]))
        );
    }

    #[test]
    fn distinct_sets_get_distinct_keys() {
        assert_ne!(
            derive_session_key(&ids(&["a"])),
            derive_session_key(&ids(&["a", "b"]))
        );
        assert_ne!(
            derive_session_key(&ids(&["ab"])),
            derive_session_key(&ids(&["a", "b"]))
        );
    }

    #[test]
    fn empty_set_uses_the_sentinel() {
        assert_eq!(derive_session_key(&[]), ALL_SOURCES_KEY);
        assert_eq!(derive_session_key(&[]), derive_session_key(&[]));
    }

    #[test]
    fn no_collisions_for_small_populations() {
        let mut keys = std::collections::HashSet::new();
        for i in 0..200 {
            let set = ids(&[&format!("src-{}", i), &format!("src-{}", i + 1)]);
            assert!(keys.insert(derive_session_key(&set)));
        }
    }

    #[tokio::test]
    async fn session_reuse_returns_the_same_agent() {
        let registry = registry();
        let (agent1, key1) = registry.get_or_create(&ids(&["a", "b"])).await;
        let (agent2, key2) = registry.get_or_create(&ids(&["b", "a"])).await;

        assert_eq!(key1, key2);
        assert!(Arc::ptr_eq(&agent1, &agent2));
    }

    #[tokio::test]
    async fn transcript_accumulates_across_reuse() {
        let registry = registry();
        let (_, key) = registry.get_or_create(&ids(&["a"])).await;

        registry
            .append(&key, Role::User, "q1".to_string(), None)
            .await;
        registry
            .append(&key, Role::Assistant, "a1".to_string(), Some(Vec::new()))
            .await;
        let (_, key_again) = registry.get_or_create(&ids(&["a"])).await;
        assert_eq!(key, key_again);

        registry
            .append(&key, Role::User, "q2".to_string(), None)
            .await;

        let transcript = registry.get_transcript(&key).await;
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[0].content, "q1");
        assert_eq!(transcript[1].content, "a1");
        assert_eq!(transcript[2].content, "q2");
        assert_eq!(transcript[0].role, Role::User);
        assert_eq!(transcript[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn transcript_snapshot_is_isolated_from_the_registry() {
        let registry = registry();
        let (_, key) = registry.get_or_create(&[]).await;
        registry
            .append(&key, Role::User, "q".to_string(), None)
            .await;

        let mut snapshot = registry.get_transcript(&key).await;
        snapshot.clear();

        assert_eq!(registry.get_transcript(&key).await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_key_gets_empty_transcript() {
        let registry = registry();
        assert!(registry.get_transcript("missing").await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_first_queries_build_one_agent() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static BUILDS: AtomicUsize = AtomicUsize::new(0);
        let factory = |_: &[String]| -> Arc<dyn ReasoningAgent> {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            Arc::new(EchoAgent)
        };
        let registry = Arc::new(SessionRegistry::new(Arc::new(factory)));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.get_or_create(&ids(&["x", "y"])).await.1
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
        assert_eq!(registry.active_sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn bare_transcript_survives_later_session_creation() {
        let registry = registry();
        let key = derive_session_key(&ids(&["a"]));

        // Defensive path: append before any query created the session.
        registry
            .append(&key, Role::User, "orphan".to_string(), None)
            .await;
        assert_eq!(registry.get_transcript(&key).await.len(), 1);

        let (_, created_key) = registry.get_or_create(&ids(&["a"])).await;
        assert_eq!(created_key, key);
        assert_eq!(registry.get_transcript(&key).await.len(), 1);
    }

    #[tokio::test]
    async fn evict_removes_state() {
        let registry = registry();
        let (_, key) = registry.get_or_create(&ids(&["a"])).await;
        registry
            .append(&key, Role::User, "q".to_string(), None)
            .await;

        assert!(registry.evict(&key).await);
        assert!(!registry.evict(&key).await);
        assert!(registry.get_transcript(&key).await.is_empty());

        registry.get_or_create(&ids(&["a"])).await;
        registry.get_or_create(&ids(&["b"])).await;
        registry.evict_all().await;
        assert!(registry.active_sessions().await.is_empty());
    }
}
