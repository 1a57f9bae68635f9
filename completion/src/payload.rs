//! The assembled prompt payload.
//!
//! A `PromptPayload` is built fresh for every request by the prompt
//! assembler and consumed once by the completion client. Section order is
//! fixed: persona, personalization, retrieved context, conversation
//! history, current question. Later sections sit closer to the question and
//! take precedence when the model resolves conflicting instructions.

use serde::{Deserialize, Serialize};

use crate::error::{CompletionError, Result};

/// A fully assembled completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPayload {
    /// Static behavioral template prepended to every request.
    pub persona_instructions: String,

    /// Rendered personalization descriptor (may be empty).
    pub profile_text: String,

    /// Retrieved corpus chunks, nearest first (may be a fallback notice).
    pub context_text: String,

    /// Rendered conversation transcript (may be empty).
    pub history_text: String,

    /// The raw current question.
    pub user_question: String,
}

impl PromptPayload {
    /// Validate the payload before it goes on the wire.
    pub fn validate(&self) -> Result<()> {
        if self.user_question.trim().is_empty() {
            return Err(CompletionError::InvalidPayload(
                "user question must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Render everything before the question as one system message.
    ///
    /// Section markers are always present, even for empty sections, so the
    /// ordering is observable regardless of content.
    pub fn system_text(&self) -> String {
        format!(
            "{}\n\n## Personalization\n{}\n\n## Context\n{}\n\n## Conversation so far\n{}",
            self.persona_instructions.trim_end(),
            self.profile_text,
            self.context_text,
            self.history_text,
        )
    }

    /// Render the full prompt as one document, question last.
    pub fn render(&self) -> String {
        format!(
            "{}\n\n## Question\n{}",
            self.system_text(),
            self.user_question
        )
    }
}
