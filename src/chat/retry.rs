//! Retry guard around the reasoning call.
//!
//! Transient upstream failures (503/overloaded, 429/rate-limited) are retried
//! with exponential backoff; anything else aborts on the first failure. The
//! classification works on the error's text because that is all the upstream
//! surfaces uniformly.

use std::time::Duration;

use crate::agent::ReasoningAgent;
use crate::core::errors::ApiError;

/// Whether an error is in the transient class worth retrying.
pub fn is_retryable(err: &ApiError) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("503")
        || msg.contains("overloaded")
        || msg.contains("429")
        || msg.contains("rate limit")
}

/// Run the agent with up to `max_attempts` tries.
///
/// Sleeps 2^attempt seconds between attempts (2s after the first failure, 4s
/// after the second). No sleep on a non-retryable error, and none after the
/// final failed attempt.
pub async fn run_with_retry(
    agent: &dyn ReasoningAgent,
    query: &str,
    max_attempts: usize,
) -> Result<String, ApiError> {
    debug_assert!(max_attempts >= 1);

    for attempt in 1..=max_attempts {
        tracing::info!("Agent attempt {}/{}", attempt, max_attempts);
        match agent.run(query).await {
            Ok(answer) => return Ok(answer),
            Err(err) if is_retryable(&err) && attempt < max_attempts => {
                let wait = Duration::from_secs(1 << attempt);
                tracing::warn!(
                    "Model overloaded or rate limited, retrying in {:?} (attempt {}/{}): {}",
                    wait,
                    attempt,
                    max_attempts,
                    err
                );
                tokio::time::sleep(wait).await;
            }
            Err(err) => {
                if is_retryable(&err) {
                    tracing::error!("Max retries reached, last error: {}", err);
                } else {
                    tracing::error!("Non-retryable agent error: {}", err);
                }
                return Err(err);
            }
        }
    }
    unreachable!("retry loop returns on the final attempt")
}
