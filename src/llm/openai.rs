//! OpenAI chat-completion language model.

use super::LanguageModel;
use crate::error::{RecapError, Result};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

#[derive(Default)]
struct Conversation {
    system: Option<String>,
    history: Vec<ChatCompletionRequestMessage>,
    /// Bumped whenever the history is cleared.
    epoch: u64,
}

impl Conversation {
    fn clear(&mut self) {
        self.history.clear();
        self.epoch += 1;
    }

    /// Record an exchange started in `epoch`. Exchanges that straddle a
    /// clear are dropped so they cannot leak into the next dialogue.
    fn record(
        &mut self,
        epoch: u64,
        exchange: [ChatCompletionRequestMessage; 2],
        max_history: usize,
    ) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.history.extend(exchange);

        // Trim history if too long
        let len = self.history.len();
        if len > max_history {
            self.history.drain(..len - max_history);
        }
        true
    }
}

/// Language model backed by the OpenAI chat API, keeping its own conversation history.
pub struct OpenAILanguageModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
    max_history: usize,
    conversation: Mutex<Conversation>,
}

impl OpenAILanguageModel {
    /// Create a new language model client.
    pub fn new(model: &str) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: model.to_string(),
            temperature: 0.7,
            max_history: 20,
            conversation: Mutex::new(Conversation::default()),
        })
    }

    /// Set how many conversation messages are remembered.
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Conversation> {
        self.conversation.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Messages for `prompt`, with the epoch they were taken from.
    fn build_messages(&self, prompt: &str) -> Result<(Vec<ChatCompletionRequestMessage>, u64)> {
        let conversation = self.lock();
        let mut messages = Vec::with_capacity(conversation.history.len() + 2);

        if let Some(system) = &conversation.system {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system.clone())
                    .build()
                    .map_err(|e| RecapError::LanguageModel(e.to_string()))?
                    .into(),
            );
        }
        messages.extend(conversation.history.iter().cloned());
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| RecapError::LanguageModel(e.to_string()))?
                .into(),
        );

        Ok((messages, conversation.epoch))
    }

    fn remember(&self, epoch: u64, prompt: &str, answer: &str) -> Result<()> {
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| RecapError::LanguageModel(e.to_string()))?;
        let assistant = ChatCompletionRequestAssistantMessageArgs::default()
            .content(answer)
            .build()
            .map_err(|e| RecapError::LanguageModel(e.to_string()))?;

        if !self
            .lock()
            .record(epoch, [user.into(), assistant.into()], self.max_history)
        {
            debug!("Session was reset during completion, not remembering it");
        }
        Ok(())
    }
}

#[async_trait]
impl LanguageModel for OpenAILanguageModel {
    async fn ensure_session(&self, reset: bool, keep_history: bool, context_message: &str) -> Result<()> {
        let mut conversation = self.lock();
        let primed = conversation.system.is_some();

        if reset || !primed || !keep_history {
            conversation.clear();
        }
        conversation.system = Some(context_message.to_string());

        debug!(reset, keep_history, primed, "Primed language model session");
        Ok(())
    }

    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String> {
        let (messages, epoch) = self.build_messages(prompt)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| RecapError::LanguageModel(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| RecapError::OpenAI(format!("Failed to generate response: {}", e)))?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| RecapError::LanguageModel("Empty response from LLM".to_string()))?
            .clone();

        self.remember(epoch, prompt, &answer)?;
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(text: &str) -> [ChatCompletionRequestMessage; 2] {
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(text)
            .build()
            .unwrap();
        let assistant = ChatCompletionRequestAssistantMessageArgs::default()
            .content(text)
            .build()
            .unwrap();
        [user.into(), assistant.into()]
    }

    #[test]
    fn test_exchange_across_clear_is_dropped() {
        let mut conversation = Conversation::default();
        let started = conversation.epoch;
        assert!(conversation.record(started, exchange("first video"), 20));

        let in_flight = conversation.epoch;
        conversation.clear();
        assert!(!conversation.record(in_flight, exchange("late answer"), 20));
        assert!(conversation.history.is_empty());
    }

    #[test]
    fn test_history_is_trimmed() {
        let mut conversation = Conversation::default();
        for i in 0..5 {
            conversation.record(0, exchange(&i.to_string()), 4);
        }
        assert_eq!(conversation.history.len(), 4);
    }
}
