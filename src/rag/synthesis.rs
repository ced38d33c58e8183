//! LLM chat-completion synthesis. Wrapped in a bounded retry
//! (rate-limit/timeout/5xx only) and a named circuit breaker (`cohere_chat`:
//! 5 consecutive failures -> 60s open; retries: up to 2, base 1s, cap 16s,
//! factor 2, with jitter).
//!
//! The retry loop constructs `backoff::ExponentialBackoff` directly rather
//! than going through `backoff::future::retry` (that helper wants a crate
//! feature this workspace doesn't pull in).

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitBreakerRegistry;
use crate::error::{Error, Result};

type ChatResult<T> = std::result::Result<T, LlmError>;

pub const COHERE_CHAT_BREAKER: &str = "cohere_chat";
const MAX_RETRIES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    RateLimited,
    Timeout,
    ServerError,
    Other,
}

#[derive(Debug)]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
}

impl LlmError {
    fn is_retryable(&self) -> bool {
        matches!(self.kind, LlmErrorKind::RateLimited | LlmErrorKind::Timeout | LlmErrorKind::ServerError)
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, system_prompt: &str, user_prompt: &str, temperature: f32, max_output_tokens: u32) -> ChatResult<String>;
}

#[derive(Serialize)]
struct CohereChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CohereChatRequest<'a> {
    model: &'a str,
    messages: Vec<CohereChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CohereChatResponse {
    message: CohereChatResponseMessage,
}

#[derive(Deserialize)]
struct CohereChatResponseMessage {
    content: Vec<CohereChatContentBlock>,
}

#[derive(Deserialize)]
struct CohereChatContentBlock {
    text: String,
}

pub struct CohereChatProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl CohereChatProvider {
    pub fn new(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self { client, api_key, model }
    }
}

#[async_trait]
impl LlmProvider for CohereChatProvider {
    async fn chat(&self, system_prompt: &str, user_prompt: &str, temperature: f32, max_output_tokens: u32) -> ChatResult<String> {
        let request = CohereChatRequest {
            model: &self.model,
            messages: vec![
                CohereChatMessage { role: "system", content: system_prompt },
                CohereChatMessage { role: "user", content: user_prompt },
            ],
            temperature,
            max_tokens: max_output_tokens,
        };

        let response = self
            .client
            .post("https://api.cohere.com/v2/chat")
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError { kind: LlmErrorKind::RateLimited, message: "rate limited".to_string() });
        }
        if status.is_server_error() {
            return Err(LlmError { kind: LlmErrorKind::ServerError, message: format!("server error: {status}") });
        }
        if !status.is_success() {
            return Err(LlmError { kind: LlmErrorKind::Other, message: format!("unexpected status: {status}") });
        }

        let body: CohereChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError { kind: LlmErrorKind::Other, message: format!("malformed response: {e}") })?;

        Ok(body.message.content.into_iter().map(|block| block.text).collect::<Vec<_>>().join(""))
    }
}

fn classify_transport_error(error: &reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError { kind: LlmErrorKind::Timeout, message: error.to_string() }
    } else {
        LlmError { kind: LlmErrorKind::Other, message: error.to_string() }
    }
}

fn retry_schedule() -> ExponentialBackoff {
    ExponentialBackoff {
        current_interval: StdDuration::from_secs(1),
        initial_interval: StdDuration::from_secs(1),
        multiplier: 2.0,
        max_interval: StdDuration::from_secs(16),
        max_elapsed_time: None,
        ..Default::default()
    }
}

/// Runs `provider.chat` behind the named circuit breaker with up to
/// `MAX_RETRIES` additional attempts on retryable errors. Non-retryable
/// errors and an open circuit both surface immediately.
pub async fn synthesize(
    breaker: &Arc<CircuitBreakerRegistry>,
    provider: &dyn LlmProvider,
    system_prompt: &str,
    user_prompt: &str,
    temperature: f32,
    max_output_tokens: u32,
) -> Result<String> {
    let guard = breaker.before_call(COHERE_CHAT_BREAKER)?;
    let mut backoff = retry_schedule();

    for attempt in 0..=MAX_RETRIES {
        match provider.chat(system_prompt, user_prompt, temperature, max_output_tokens).await {
            Ok(text) => {
                guard.success();
                return Ok(text);
            }
            Err(error) if attempt < MAX_RETRIES && error.is_retryable() => {
                let base_delay = backoff.next_backoff().unwrap_or(StdDuration::from_secs(16));
                let jitter_millis = rand::thread_rng().gen_range(0..250);
                tokio::time::sleep(base_delay + StdDuration::from_millis(jitter_millis)).await;
                continue;
            }
            Err(error) => {
                guard.failure();
                return Err(Error::synthesis_failed(error.message));
            }
        }
    }

    unreachable!("loop always returns on the final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFails;

    #[async_trait]
    impl LlmProvider for AlwaysFails {
        async fn chat(&self, _: &str, _: &str, _: f32, _: u32) -> ChatResult<String> {
            Err(LlmError { kind: LlmErrorKind::ServerError, message: "boom".to_string() })
        }
    }

    struct SucceedsOnce {
        calls: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl LlmProvider for SucceedsOnce {
        async fn chat(&self, _: &str, _: &str, _: f32, _: u32) -> ChatResult<String> {
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 0 {
                Err(LlmError { kind: LlmErrorKind::RateLimited, message: "slow down".to_string() })
            } else {
                Ok("synthesized answer".to_string())
            }
        }
    }

    #[tokio::test]
    async fn retries_on_rate_limit_then_succeeds() {
        let breaker = CircuitBreakerRegistry::new(5, 60);
        let provider = SucceedsOnce { calls: std::sync::atomic::AtomicU32::new(0) };
        let result = synthesize(&breaker, &provider, "system", "user", 0.3, 500).await;
        assert_eq!(result.unwrap(), "synthesized answer");
    }

    #[tokio::test]
    async fn opens_breaker_after_repeated_exhaustion() {
        let breaker = CircuitBreakerRegistry::new(2, 60);
        let provider = AlwaysFails;
        for _ in 0..2 {
            let _ = synthesize(&breaker, &provider, "s", "u", 0.3, 500).await;
        }
        let result = synthesize(&breaker, &provider, "s", "u", 0.3, 500).await;
        assert!(matches!(result, Err(Error::CircuitOpen { .. })));
    }
}
