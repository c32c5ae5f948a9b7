//! Text-completion collaborator used for question generation, grading and answers.

mod openai;

pub use openai::OpenAILanguageModel;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for a conversational text-completion model.
///
/// Implementations may remember earlier turns. [`ensure_session`](Self::ensure_session)
/// primes that memory with a context message.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Prime the conversation with `context_message`.
    ///
    /// `reset` starts a fresh conversation. Otherwise an already primed
    /// conversation keeps its earlier turns when `keep_history` is set.
    async fn ensure_session(&self, reset: bool, keep_history: bool, context_message: &str) -> Result<()>;

    /// Complete `prompt` within the current conversation.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
