//! Error types for Recap.

use thiserror::Error;

/// Library-level error type for Recap operations.
#[derive(Error, Debug)]
pub enum RecapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transcript error: {0}")]
    Transcript(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Language model error: {0}")]
    LanguageModel(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Embedding index not built for video {0}")]
    MissingIndex(String),

    #[error("Could not parse generated question: {0}")]
    QuestionFormat(String),

    #[error("Transition not allowed: {event} while {phase}")]
    IllegalTransition { phase: String, event: String },

    #[error("Another request is still being answered")]
    Busy,

    #[error("No video is active")]
    NoActiveVideo,

    #[error("Transcript has no text to ask questions about")]
    EmptyTranscript,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl RecapError {
    /// Failures of a turn that are reported to the user as a chat message
    /// rather than returned to the caller.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            RecapError::Embedding(_)
                | RecapError::LanguageModel(_)
                | RecapError::OpenAI(_)
                | RecapError::MissingIndex(_)
                | RecapError::QuestionFormat(_)
        )
    }
}

/// Result type alias for Recap operations.
pub type Result<T> = std::result::Result<T, RecapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_failure_classification() {
        assert!(RecapError::Embedding("boom".into()).is_collaborator_failure());
        assert!(RecapError::MissingIndex("abc".into()).is_collaborator_failure());
        assert!(!RecapError::Busy.is_collaborator_failure());
        assert!(!RecapError::EmptyTranscript.is_collaborator_failure());
    }
}
