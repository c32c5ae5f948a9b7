//! The per-video dialogue state: message log and question counters.

use crate::chunking::Chunk;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opening message of every new session.
pub const INITIAL_MESSAGE: &str =
    "I'll start asking you questions about the video content to test your understanding.";

/// Shown after a correct option is picked.
pub const CORRECT_OPTION_MESSAGE: &str = "Correct! Let's continue with the next question.";

/// Shown after a wrong option is picked.
pub const WRONG_OPTION_MESSAGE: &str = "That's not correct. Let's try another question.";

/// Announces the switch to free-form questions.
pub const FREE_FORM_MESSAGE: &str =
    "Great! You've completed the initial questions. You can now ask questions freely about any part of the video!";

/// Shown when a turn fails.
pub const ERROR_MESSAGE: &str = "Sorry, I encountered an error. Please reopen the Q&A Tab.";

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

/// Presentation hint for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleType {
    Green,
}

/// One choice of a single-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub text: String,
    #[serde(alias = "isCorrect", alias = "correct")]
    pub is_correct: bool,
}

/// A message in the dialogue log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaMessage {
    /// Position-derived id, unique within a session.
    pub id: u64,
    pub content: String,
    pub sender: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_type: Option<StyleType>,
    /// Choices offered by a single-choice question.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<AnswerOption>>,
    pub created_at: DateTime<Utc>,
}

/// A message waiting to be appended; the session assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    pub content: String,
    pub sender: Sender,
    pub style_type: Option<StyleType>,
    pub options: Option<Vec<AnswerOption>>,
}

impl MessageDraft {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sender: Sender::User,
            style_type: None,
            options: None,
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sender: Sender::Ai,
            style_type: None,
            options: None,
        }
    }

    pub fn styled(mut self, style: StyleType) -> Self {
        self.style_type = Some(style);
        self
    }

    pub fn with_options(mut self, options: Vec<AnswerOption>) -> Self {
        self.options = Some(options);
        self
    }
}

/// Dialogue state for one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaSession {
    pub id: Uuid,
    /// Append-only message log.
    pub messages: Vec<QaMessage>,
    /// Completed question rounds, plus one for the free-form announcement.
    pub question_count: u32,
    /// Single-choice rounds answered by picking an option.
    pub single_choice_count: u32,
    /// Last question shown to the user.
    pub prev_question: String,
    /// Expected answer to `prev_question`.
    pub prev_answer: String,
    pub updated_at: DateTime<Utc>,
}

impl QaSession {
    /// A fresh session holding only the opening message.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            messages: vec![QaMessage {
                id: 1,
                content: INITIAL_MESSAGE.to_string(),
                sender: Sender::Ai,
                style_type: None,
                options: None,
                created_at: now,
            }],
            question_count: 0,
            single_choice_count: 0,
            prev_question: String::new(),
            prev_answer: String::new(),
            updated_at: now,
        }
    }

    /// Append a message, assigning the next id.
    pub fn push(&mut self, draft: MessageDraft) -> &QaMessage {
        let id = self.messages.last().map(|m| m.id + 1).unwrap_or(1);
        self.messages.push(QaMessage {
            id,
            content: draft.content,
            sender: draft.sender,
            style_type: draft.style_type,
            options: draft.options,
            created_at: Utc::now(),
        });
        &self.messages[self.messages.len() - 1]
    }

    /// Options of the most recent single-choice question.
    pub fn open_options(&self) -> Option<&[AnswerOption]> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.sender == Sender::Ai && m.options.is_some())
            .and_then(|m| m.options.as_deref())
    }
}

impl Default for QaSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Chunks to draw scripted questions from, and whether the dialogue accepts input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkingContext {
    /// Set once the first scripted question has been asked.
    pub is_initialized: bool,
    pub chunks: Vec<Chunk>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session() {
        let session = QaSession::new();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].id, 1);
        assert_eq!(session.messages[0].sender, Sender::Ai);
        assert_eq!(session.question_count, 0);
    }

    #[test]
    fn test_push_assigns_sequential_ids() {
        let mut session = QaSession::new();
        session.push(MessageDraft::user("hi"));
        let id = session.push(MessageDraft::ai("hello").styled(StyleType::Green)).id;
        assert_eq!(id, 3);
        assert_eq!(session.messages[2].style_type, Some(StyleType::Green));
    }

    #[test]
    fn test_open_options_finds_latest() {
        let mut session = QaSession::new();
        session.push(MessageDraft::ai("q1").with_options(vec![AnswerOption {
            text: "old".into(),
            is_correct: true,
        }]));
        session.push(MessageDraft::ai("q2").with_options(vec![AnswerOption {
            text: "new".into(),
            is_correct: false,
        }]));
        session.push(MessageDraft::user("thinking"));

        assert_eq!(session.open_options().unwrap()[0].text, "new");
    }

    #[test]
    fn test_serialized_shape() {
        let mut session = QaSession::new();
        session.push(MessageDraft::ai("q").with_options(vec![AnswerOption {
            text: "a".into(),
            is_correct: true,
        }]));

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["messages"][0]["sender"], "ai");
        assert!(json["messages"][0].get("options").is_none());
        assert_eq!(json["messages"][1]["options"][0]["is_correct"], true);

        let back: QaSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }
}
