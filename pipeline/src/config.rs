//! Configuration for the answering pipeline.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use coach_completion::{ChatClient, RetryPolicy};
use coach_embeddings::{EmbeddingProvider, HashingProvider, RemoteProvider};

/// Persona used when none is configured.
const DEFAULT_PERSONA: &str = "You are an experienced cross-country skiing coach. \
Answer the athlete's questions using the reference material provided below. \
When the material does not cover the question, say so and give your best \
general coaching advice.";

/// Session key used when a request carries none.
pub const DEFAULT_SESSION_KEY: &str = "default";

/// Top-level configuration for the answering pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Persona instructions prepended to every prompt.
    pub persona: String,

    /// Session key substituted when a request carries none.
    pub default_session_key: String,

    /// Retrieval configuration.
    pub retrieval: RetrievalConfig,

    /// Conversation memory configuration.
    pub memory: MemoryConfig,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Completion service configuration.
    pub completion: CompletionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            default_session_key: DEFAULT_SESSION_KEY.to_string(),
            retrieval: RetrievalConfig::default(),
            memory: MemoryConfig::default(),
            embedding: EmbeddingConfig::default(),
            completion: CompletionConfig::default(),
        }
    }
}

/// Configuration for retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks to retrieve per question.
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

/// Configuration for conversation memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum retained turns per session.
    pub max_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { max_turns: 6 }
    }
}

/// Which embedding backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// OpenAI-compatible embeddings API.
    Remote,
    /// Deterministic offline hashing provider.
    Hashing,
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// API base URL (remote provider only).
    pub base_url: Option<String>,

    /// API key (remote provider only).
    pub api_key: Option<String>,

    /// Model to request (remote provider only).
    pub model: Option<String>,

    /// Vector dimension; must match the prebuilt index.
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::Remote,
            base_url: None,
            api_key: None,
            model: None,
            dimension: 1536,
        }
    }
}

impl EmbeddingConfig {
    /// Build the configured provider.
    pub fn build(&self) -> Arc<dyn EmbeddingProvider> {
        match self.provider {
            EmbeddingProviderType::Hashing => Arc::new(HashingProvider::new(self.dimension)),
            EmbeddingProviderType::Remote => {
                let mut provider = RemoteProvider::new();
                if let Some(url) = &self.base_url {
                    provider = provider.with_base_url(url.clone());
                }
                if let Some(key) = &self.api_key {
                    provider = provider.with_api_key(key.clone());
                }
                if let Some(model) = &self.model {
                    provider = provider.with_model(model.clone(), self.dimension);
                }
                Arc::new(provider)
            }
        }
    }
}

/// Configuration for the completion retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Whether the single bounded retry is enabled.
    pub enabled: bool,

    /// Backoff when the service gives no hint, in milliseconds.
    pub base_backoff_ms: u64,

    /// Cap on any backoff, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_backoff_ms: 1_000,
            max_backoff_ms: 5_000,
        }
    }
}

impl RetryConfig {
    /// Convert into the client-side policy.
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            enabled: self.enabled,
            base_backoff: Duration::from_millis(self.base_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

/// Configuration for the completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// API base URL.
    pub base_url: Option<String>,

    /// API key.
    pub api_key: Option<String>,

    /// Model identifier.
    pub model: Option<String>,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,

    /// Retry policy.
    pub retry: RetryConfig,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: None,
            timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl CompletionConfig {
    /// Build the configured chat client.
    pub fn build(&self) -> ChatClient {
        let mut client = ChatClient::new()
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_retry(self.retry.to_policy());
        if let Some(url) = &self.base_url {
            client = client.with_base_url(url.clone());
        }
        if let Some(key) = &self.api_key {
            client = client.with_api_key(key.clone());
        }
        if let Some(model) = &self.model {
            client = client.with_model(model.clone());
        }
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.memory.max_turns, 6);
        assert_eq!(config.default_session_key, "default");
        assert!(!config.completion.retry.enabled);
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.retrieval.top_k, config.retrieval.top_k);
        assert_eq!(back.persona, config.persona);
    }

    #[test]
    fn test_hashing_provider_build() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Hashing,
            dimension: 32,
            ..EmbeddingConfig::default()
        };
        let provider = config.build();
        assert_eq!(provider.dimension(), 32);
        assert_eq!(provider.name(), "hashing");
    }
}
