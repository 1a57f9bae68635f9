//! Embedding providers.
//!
//! A provider maps text to a fixed-dimension vector. Two backends are
//! supported: a remote OpenAI-compatible embeddings API, and a
//! deterministic hashing provider for offline and test deployments.

use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{EmbeddingError, Result};
use crate::similarity::normalize;
use crate::Embedding;

/// Upper bound on input length; anything larger is a caller bug, not a
/// payload to forward to the API.
const MAX_INPUT_CHARS: usize = 32_768;

/// Trait for embedding providers.
///
/// `embed` is deterministic for a fixed model version and never returns a
/// partial or zero vector: any failure surfaces as an error.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Dimension of the vectors this provider produces.
    fn dimension(&self) -> usize;

    /// Generate an embedding for the given text.
    async fn embed(&self, text: &str) -> Result<Embedding>;
}

fn validate_input(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::MalformedInput(
            "cannot embed empty text".to_string(),
        ));
    }
    if text.len() > MAX_INPUT_CHARS {
        return Err(EmbeddingError::MalformedInput(format!(
            "input of {} chars exceeds the {MAX_INPUT_CHARS} char limit",
            text.len()
        )));
    }
    Ok(())
}

/// Remote provider speaking the OpenAI-compatible `/embeddings` dialect.
pub struct RemoteProvider {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// Model identifier sent with every request.
    model: String,

    /// Expected output dimension.
    dimension: usize,

    /// HTTP client, built once on first use.
    client: OnceCell<reqwest::Client>,
}

impl RemoteProvider {
    /// Create a new remote provider with the default model.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
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

    /// Set the model and its output dimension.
    pub fn with_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.model = model.into();
        self.dimension = dimension;
        self
    }

    /// Check if the provider is available (API key set).
    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// The shared HTTP client, initialized exactly once. Concurrent first
    /// calls are serialized by the cell; later calls take the fast path.
    fn client(&self) -> &reqwest::Client {
        self.client.get_or_init(reqwest::Client::new)
    }
}

impl Default for RemoteProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteProvider {
    fn name(&self) -> &str {
        "remote"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        validate_input(text)?;

        let api_key = self
            .api_key
            .as_ref()
            .ok_or(EmbeddingError::ProviderNotConfigured)?;

        debug!("Generating embedding with model: {}", self.model);

        let body = serde_json::json!({
            "input": text,
            "model": self.model,
        });

        let response = self
            .client()
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "API error: {error_text}"
            )));
        }

        let result: WireEmbeddingResponse = response.json().await?;

        let embedding = result
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))?
            .embedding;

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }
}

/// OpenAI-compatible API response format.
#[derive(Debug, Deserialize)]
struct WireEmbeddingResponse {
    data: Vec<WireEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct WireEmbeddingData {
    embedding: Vec<f32>,
}

/// Deterministic offline provider.
///
/// Folds token hashes into a fixed-dimension vector and L2-normalizes the
/// result. Not semantically meaningful, but stable across runs, which is
/// what air-gapped deployments and tests need.
pub struct HashingProvider {
    dimension: usize,
}

impl HashingProvider {
    /// Create a provider with the given output dimension.
    pub fn new(dimension: usize) -> Self {
        info!("Using deterministic hashing embeddings ({dimension} dims)");
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        validate_input(text)?;

        let mut vector = vec![0.0f32; self.dimension];
        for token in text.to_lowercase().split_whitespace() {
            let mut hasher = std::hash::DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();

            let bucket = (h % self.dimension as u64) as usize;
            let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        normalize(&mut vector);
        Ok(vector)
    }
}
