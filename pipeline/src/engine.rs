//! The answering engine.
//!
//! Wires the embedding provider, vector index, chunk store, conversation
//! memory, profile store, prompt assembler and completion client into one
//! request pipeline. Every per-request failure is converted here into a
//! classified, user-visible answer; nothing panics and nothing escapes to
//! the transport layer.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use coach_completion::{CompletionClient, CompletionError};
use coach_embeddings::{EmbeddingProvider, SearchHit};
use coach_memory::{ConversationMemory, ConversationTurn, ProfileStore};

use crate::config::PipelineConfig;
use crate::corpus::Corpus;
use crate::error::{FailureKind, PipelineError, Result};
use crate::prompt::PromptAssembler;

/// Extra budget on top of the completion timeout for embedding and search
/// before the whole request is declared timed out.
const DEADLINE_GRACE: Duration = Duration::from_secs(5);

/// One inbound question.
#[derive(Debug, Clone)]
pub struct AskRequest {
    /// The question text (required, non-empty).
    pub question: String,

    /// Session key scoping memory and personalization; a fixed sentinel is
    /// substituted when absent.
    pub session_key: Option<String>,

    /// Prior turns used to seed memory for stateless-per-call callers.
    pub seed_messages: Option<Vec<ConversationTurn>>,
}

impl AskRequest {
    /// A request with just a question, using the default session.
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            session_key: None,
            seed_messages: None,
        }
    }

    /// Scope the request to a session key.
    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = Some(key.into());
        self
    }

    /// Seed memory with prior turns before answering.
    pub fn with_seed_messages(mut self, messages: Vec<ConversationTurn>) -> Self {
        self.seed_messages = Some(messages);
        self
    }
}

/// The boundary result of one request. Always an answer; failures carry a
/// classification so the transport layer can pick a status code.
#[derive(Debug, Clone)]
pub struct AskOutcome {
    /// Answer text, or a prefixed user-facing failure explanation.
    pub answer: String,

    /// Set when the answer is a failure explanation.
    pub failure: Option<FailureKind>,
}

impl AskOutcome {
    /// Whether this outcome is a failure answer.
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// The retrieval-augmented answering engine.
pub struct AskEngine {
    corpus: Arc<Corpus>,
    provider: Arc<dyn EmbeddingProvider>,
    completion: Arc<dyn CompletionClient>,
    memory: Arc<ConversationMemory>,
    profiles: Arc<ProfileStore>,
    assembler: PromptAssembler,
    top_k: usize,
    default_session_key: String,
    deadline: Duration,
}

impl AskEngine {
    /// Create an engine builder.
    pub fn builder() -> AskEngineBuilder {
        AskEngineBuilder::new()
    }

    /// Answer one question. Never fails: per-request errors come back as a
    /// classified failure outcome.
    pub async fn ask(&self, request: AskRequest) -> AskOutcome {
        match self.answer(request).await {
            Ok(answer) => AskOutcome {
                answer,
                failure: None,
            },
            Err(err) => {
                let kind = FailureKind::classify(&err);
                error!("Request failed ({kind:?}): {err}");
                AskOutcome {
                    answer: kind.user_answer(),
                    failure: Some(kind),
                }
            }
        }
    }

    async fn answer(&self, request: AskRequest) -> Result<String> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(PipelineError::InvalidRequest(
                "question must not be empty".to_string(),
            ));
        }

        let session_key = request
            .session_key
            .as_deref()
            .unwrap_or(&self.default_session_key);

        if let Some(seed) = request.seed_messages {
            self.memory.seed(session_key, seed).await;
        }

        // Embed and search. An empty or degraded index reduces the context;
        // it never fails the request.
        let query = self.provider.embed(question).await?;
        let hits = self.corpus.index().search(&query, self.top_k)?;
        let context_chunks = self.context_for_hits(&hits);

        debug!(
            "Retrieved {} of {} requested chunks for session '{session_key}'",
            context_chunks.len(),
            self.top_k
        );

        // History is the transcript of prior turns; the current question
        // travels in its own section, so it is appended after rendering.
        let history_text = self.memory.render(session_key).await;
        let profile_text = self.profiles.lookup(session_key).render();

        self.memory
            .append(session_key, ConversationTurn::user(question))
            .await;

        let payload =
            self.assembler
                .assemble(&profile_text, &context_chunks, &history_text, question);

        // No lock is held here: everything the prompt needs was copied out
        // above, and the network call runs under the end-to-end deadline.
        let answer = tokio::time::timeout(self.deadline, self.completion.complete(&payload))
            .await
            .map_err(|_| PipelineError::Completion(CompletionError::Timeout))??;

        self.memory
            .append(session_key, ConversationTurn::assistant(answer.clone()))
            .await;

        Ok(answer)
    }

    /// Resolve search hits to chunk texts, nearest first. Out-of-range ids
    /// are skipped with a warning; retrieval degradation must never crash a
    /// request.
    fn context_for_hits(&self, hits: &[SearchHit]) -> Vec<&str> {
        hits.iter()
            .filter_map(|hit| match self.corpus.chunks().get(hit.chunk_id) {
                Some(chunk) => Some(chunk.text.as_str()),
                None => {
                    warn!(
                        "Index returned out-of-range chunk id {}, skipping",
                        hit.chunk_id
                    );
                    None
                }
            })
            .collect()
    }

    /// The conversation memory (for boundary-layer introspection).
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// The end-to-end deadline applied to the completion call.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

/// Builder for the answering engine.
pub struct AskEngineBuilder {
    config: PipelineConfig,
    corpus: Option<Arc<Corpus>>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    completion: Option<Arc<dyn CompletionClient>>,
    profiles: Option<Arc<ProfileStore>>,
}

impl AskEngineBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            corpus: None,
            provider: None,
            completion: None,
            profiles: None,
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the corpus.
    pub fn with_corpus(mut self, corpus: Corpus) -> Self {
        self.corpus = Some(Arc::new(corpus));
        self
    }

    /// Set the embedding provider, overriding the configured one.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the completion client, overriding the configured one.
    pub fn with_completion(mut self, completion: Arc<dyn CompletionClient>) -> Self {
        self.completion = Some(completion);
        self
    }

    /// Set the profile store.
    pub fn with_profiles(mut self, profiles: ProfileStore) -> Self {
        self.profiles = Some(Arc::new(profiles));
        self
    }

    /// Build the engine, running the fatal startup checks. An engine is
    /// only handed out in a servable state.
    pub fn build(self) -> Result<AskEngine> {
        let corpus = self
            .corpus
            .ok_or_else(|| PipelineError::Configuration("corpus is required".to_string()))?;

        let provider = self
            .provider
            .unwrap_or_else(|| self.config.embedding.build());
        corpus.validate_provider(provider.as_ref())?;

        let completion = self
            .completion
            .unwrap_or_else(|| Arc::new(self.config.completion.build()));

        let deadline = Duration::from_secs(self.config.completion.timeout_secs) + DEADLINE_GRACE;

        info!(
            "Answering engine ready: {} chunks, provider '{}', top_k {}",
            corpus.chunks().len(),
            provider.name(),
            self.config.retrieval.top_k
        );

        Ok(AskEngine {
            corpus,
            provider,
            completion,
            memory: Arc::new(ConversationMemory::new(self.config.memory.max_turns)),
            profiles: self.profiles.unwrap_or_default(),
            assembler: PromptAssembler::new(self.config.persona.clone()),
            top_k: self.config.retrieval.top_k,
            default_session_key: self.config.default_session_key,
            deadline,
        })
    }
}

impl Default for AskEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
