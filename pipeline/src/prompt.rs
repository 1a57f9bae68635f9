//! Prompt assembly.
//!
//! A pure function from the request's text fragments to a `PromptPayload`.
//! No I/O, no hidden state: everything the prompt contains is passed in.

use coach_completion::PromptPayload;

/// Separator between retrieved chunks in the context section.
const CHUNK_SEPARATOR: &str = "\n\n";

/// Substituted for the context section when retrieval produced nothing, so
/// the model answers from persona knowledge instead of inventing sources.
const EMPTY_CONTEXT_NOTICE: &str = "No reference material matched this question. \
Answer from your general knowledge and say so when you are unsure.";

/// Assembles completion payloads with a fixed persona.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    persona: String,
}

impl PromptAssembler {
    /// Create an assembler with the given persona instructions.
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
        }
    }

    /// The persona instructions.
    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Combine the request's fragments into one payload.
    ///
    /// `context_chunks` must already be ordered nearest-first; the order is
    /// preserved. An empty chunk list yields the fallback notice rather
    /// than an empty section, and never fails.
    pub fn assemble(
        &self,
        profile_text: &str,
        context_chunks: &[&str],
        history_text: &str,
        question: &str,
    ) -> PromptPayload {
        let context_text = if context_chunks.is_empty() {
            EMPTY_CONTEXT_NOTICE.to_string()
        } else {
            context_chunks.join(CHUNK_SEPARATOR)
        };

        PromptPayload {
            persona_instructions: self.persona.clone(),
            profile_text: profile_text.to_string(),
            context_text,
            history_text: history_text.to_string(),
            user_question: question.to_string(),
        }
    }
}
