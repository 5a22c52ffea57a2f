//! Chat turn processing.
//!
//! One turn: derive the session for the selected source-set, run the
//! retry-guarded reasoning call, extract citations, append both messages to
//! the transcript. Known upstream failure classes degrade into a normal
//! answer turn instead of an error, so the chat flow never crashes on them.

pub mod citations;
pub mod retry;

use std::sync::Arc;
use std::time::Instant;

use crate::models::{Citation, Message, Role};
use crate::session::SessionRegistry;

const STRICT_TRIGGERS: [&str; 3] = ["strictly bound", "only from sources", "only from source"];

const STRICT_INSTRUCTION: &str = "\n\nIMPORTANT: Answer ONLY using information from the \
retrieved sources. Do not add any external knowledge.";

/// Result of one chat turn. Always produced, even for degraded answers.
pub struct ChatOutcome {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub source_ids_used: Vec<String>,
    pub session_key: String,
    pub processing_time: f64,
}

pub struct ChatService {
    registry: Arc<SessionRegistry>,
    max_attempts: usize,
}

impl ChatService {
    pub fn new(registry: Arc<SessionRegistry>, max_attempts: usize) -> Self {
        Self {
            registry,
            max_attempts,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Process one query against the selected sources.
    pub async fn process_query(&self, query: &str, source_ids: &[String]) -> ChatOutcome {
        let started = Instant::now();

        let lowered = query.to_lowercase();
        let strictly_bound = STRICT_TRIGGERS.iter().any(|t| lowered.contains(t));

        let (agent, session_key) = self.registry.get_or_create(source_ids).await;

        let query_to_run = if strictly_bound {
            format!("{}{}", query, STRICT_INSTRUCTION)
        } else {
            query.to_string()
        };

        tracing::info!(
            "Processing query: {:.100}... with {} selected sources (strictly bound: {})",
            query,
            source_ids.len(),
            strictly_bound
        );

        let (answer, citations) =
            match retry::run_with_retry(agent.as_ref(), &query_to_run, self.max_attempts).await {
                Ok(answer) => {
                    let citations = citations::extract_citations(&answer);
                    tracing::info!(
                        "Generated answer with {} citations (session {:.8}...)",
                        citations.len(),
                        session_key
                    );
                    (answer, citations)
                }
                Err(err) => {
                    tracing::error!("Chat turn failed: {}", err);
                    (degraded_answer(&err.to_string()), Vec::new())
                }
            };

        // User turn first, assistant turn second: per-session append order is
        // the transcript order.
        self.registry
            .append(&session_key, Role::User, query.to_string(), None)
            .await;
        self.registry
            .append(
                &session_key,
                Role::Assistant,
                answer.clone(),
                Some(citations.clone()),
            )
            .await;

        ChatOutcome {
            answer,
            citations,
            source_ids_used: source_ids.to_vec(),
            session_key,
            processing_time: started.elapsed().as_secs_f64(),
        }
    }

    /// Transcript for a source-set, without creating a session.
    pub async fn history(&self, source_ids: &[String]) -> (String, Vec<Message>) {
        let session_key = crate::session::derive_session_key(source_ids);
        let transcript = self.registry.get_transcript(&session_key).await;
        (session_key, transcript)
    }
}

/// Map a failed reasoning call to the human-readable degraded answer.
fn degraded_answer(error_msg: &str) -> String {
    let lowered = error_msg.to_lowercase();
    if lowered.contains("503") || lowered.contains("overloaded") {
        "The AI model is currently overloaded. I tried several times with delays, but it's \
         still unavailable. Please try again in 1-2 minutes."
            .to_string()
    } else if lowered.contains("429") || lowered.contains("rate limit") {
        "Rate limit exceeded even after retries. Please wait a moment and try again.".to_string()
    } else {
        format!("I apologize, but I encountered an error: {}", error_msg)
    }
}
