//! Completion clients.
//!
//! `ChatClient` speaks the OpenAI-compatible `/chat/completions` dialect.
//! Every call runs under a bounded timeout and maps transport and status
//! failures onto the `CompletionError` taxonomy; an optional policy allows
//! one bounded retry for rate-limit and server-side failures.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{CompletionError, Result};
use crate::payload::PromptPayload;

/// Trait for completion clients.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send the assembled payload and return the generated text.
    async fn complete(&self, payload: &PromptPayload) -> Result<String>;
}

/// Retry policy for transient completion failures.
///
/// At most one retry, only for `RateLimited` and `ServiceUnavailable`,
/// with the backoff capped. Disabled by default.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Whether the single retry is allowed at all.
    pub enabled: bool,

    /// Backoff when the service gave no `retry-after` hint.
    pub base_backoff: Duration,

    /// Upper bound on any backoff, hinted or not.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Backoff to apply before retrying the given failure.
    fn backoff_for(&self, err: &CompletionError) -> Duration {
        let hinted = match err {
            CompletionError::RateLimited { retry_after_secs } => {
                Duration::from_secs(*retry_after_secs)
            }
            _ => self.base_backoff,
        };
        hinted.min(self.max_backoff)
    }
}

/// Client for an OpenAI-compatible chat completion service.
pub struct ChatClient {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// Model identifier sent with every request.
    model: String,

    /// Bound on one network round trip.
    timeout: Duration,

    /// Retry policy for transient failures.
    retry: RetryPolicy,

    /// HTTP client, built once on first use.
    client: OnceCell<reqwest::Client>,
}

impl ChatClient {
    /// Create a new client with defaults.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            client: OnceCell::new(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The per-call timeout bound.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The shared HTTP client, initialized exactly once.
    fn client(&self) -> &reqwest::Client {
        self.client.get_or_init(reqwest::Client::new)
    }

    /// One round trip: send, classify the status, decode the text.
    async fn send_once(&self, payload: &PromptPayload) -> Result<String> {
        let api_key = self.api_key.as_deref().unwrap_or_default();

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": payload.system_text() },
                { "role": "user", "content": payload.user_question },
            ],
        });

        let request = self
            .client()
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| CompletionError::Timeout)??;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(CompletionError::Unauthorized);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(CompletionError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if status.is_server_error() {
            return Err(CompletionError::ServiceUnavailable);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::MalformedResponse(format!(
                "unexpected status {status}: {body}"
            )));
        }

        let body = tokio::time::timeout(self.timeout, response.text())
            .await
            .map_err(|_| CompletionError::Timeout)??;

        let decoded: WireChatResponse = serde_json::from_str(&body)
            .map_err(|err| CompletionError::MalformedResponse(err.to_string()))?;

        let text = decoded
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                CompletionError::MalformedResponse("no choices in response".to_string())
            })?;

        debug!("Completion returned {} chars", text.len());
        Ok(text)
    }
}

impl Default for ChatClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionClient for ChatClient {
    async fn complete(&self, payload: &PromptPayload) -> Result<String> {
        payload.validate()?;

        match self.send_once(payload).await {
            Ok(text) => Ok(text),
            Err(err) if self.retry.enabled && err.is_retryable() => {
                let backoff = self.retry.backoff_for(&err);
                warn!("Completion failed ({err}), retrying once after {backoff:?}");
                tokio::time::sleep(backoff).await;
                self.send_once(payload).await
            }
            Err(err) => Err(err),
        }
    }
}

/// OpenAI-compatible API response format.
#[derive(Debug, Deserialize)]
struct WireChatResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload() -> PromptPayload {
        PromptPayload {
            persona_instructions: "You are a coach.".to_string(),
            profile_text: String::new(),
            context_text: "Some context.".to_string(),
            history_text: String::new(),
            user_question: "What now?".to_string(),
        }
    }

    fn success_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": text } }]
        })
    }

    fn client_for(server: &MockServer) -> ChatClient {
        ChatClient::new()
            .with_api_key("test-key")
            .with_base_url(server.uri())
            .with_model("test-model")
            .with_timeout(Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("glide wax")))
            .mount(&server)
            .await;

        let answer = client_for(&server).complete(&payload()).await.unwrap();
        assert_eq!(answer, "glide wax");
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        assert!(matches!(
            client_for(&server).complete(&payload()).await,
            Err(CompletionError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(matches!(
            client_for(&server).complete(&payload()).await,
            Err(CompletionError::ServiceUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_rate_limited_without_retry_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .mount(&server)
            .await;

        assert!(matches!(
            client_for(&server).complete(&payload()).await,
            Err(CompletionError::RateLimited { .. })
        ));
    }

    #[tokio::test]
    async fn test_rate_limited_then_success_with_retry() {
        let server = MockServer::start().await;

        // First call is rate limited, second succeeds.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("recovered")))
            .mount(&server)
            .await;

        let client = client_for(&server).with_retry(RetryPolicy {
            enabled: true,
            base_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(10),
        });

        let answer = client.complete(&payload()).await.unwrap();
        assert_eq!(answer, "recovered");
    }

    #[tokio::test]
    async fn test_retry_is_bounded_to_one() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server).with_retry(RetryPolicy {
            enabled: true,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        });

        assert!(matches!(
            client.complete(&payload()).await,
            Err(CompletionError::ServiceUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(success_body("late"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).with_timeout(Duration::from_millis(50));

        assert!(matches!(
            client.complete(&payload()).await,
            Err(CompletionError::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "oops": true })),
            )
            .mount(&server)
            .await;

        assert!(matches!(
            client_for(&server).complete(&payload()).await,
            Err(CompletionError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_payload_never_hits_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("x")))
            .expect(0)
            .mount(&server)
            .await;

        let mut p = payload();
        p.user_question = String::new();

        assert!(matches!(
            client_for(&server).complete(&p).await,
            Err(CompletionError::InvalidPayload(_))
        ));
    }
}
