//! Configuration settings for Recap.

use crate::chunking::ChunkUnit;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub qa: QaSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub storage: StorageSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.recap".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Question/answer dialogue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaSettings {
    /// Number of single-choice questions asked before short-answer questions.
    pub max_single_choice: u32,
    /// Number of short-answer questions asked before free-form mode.
    pub max_short_answer: u32,
    /// Attempts at generating a parseable question before giving up.
    pub question_retries: u32,
    /// LLM model for question generation, evaluation and answers.
    pub model: String,
    /// Seed for picking the source chunk of scripted questions.
    pub seed: Option<u64>,
    /// Conversation turns kept in the model's memory.
    pub max_history_messages: usize,
}

impl Default for QaSettings {
    fn default() -> Self {
        Self {
            max_single_choice: 1,
            max_short_answer: 1,
            question_retries: 5,
            model: "gpt-4o-mini".to_string(),
            seed: None,
            max_history_messages: 20,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Maximum embedding calls in flight while building an index.
    pub max_concurrent: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 512,
            max_concurrent: 8,
        }
    }
}

/// Transcript chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Whether `target_size` counts words or characters.
    pub unit: ChunkUnit,
    /// Target chunk size.
    pub target_size: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            unit: ChunkUnit::Words,
            target_size: 300,
        }
    }
}

/// Retrieval settings for free-form questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of ranked hits used to build the context.
    pub top_n: usize,
    /// Leading hits that get the wide window.
    pub primary_hits: usize,
    /// Entries before a primary hit.
    pub primary_before: usize,
    /// Entries after a primary hit.
    pub primary_after: usize,
    /// Entries before a secondary hit.
    pub secondary_before: usize,
    /// Entries after a secondary hit.
    pub secondary_after: usize,
    /// Videos whose embeddings stay cached.
    pub cache_capacity: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_n: 10,
            primary_hits: 3,
            primary_before: 8,
            primary_after: 8,
            secondary_before: 3,
            secondary_after: 3,
            cache_capacity: 16,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Path to the SQLite database holding transcripts and sessions.
    pub sqlite_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.recap/recap.db".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the dialogue cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::RecapError;

        if self.chunking.target_size == 0 {
            return Err(RecapError::Config("chunking.target_size must be positive".to_string()));
        }
        if self.retrieval.top_n == 0 {
            return Err(RecapError::Config("retrieval.top_n must be positive".to_string()));
        }
        if self.retrieval.cache_capacity == 0 {
            return Err(RecapError::Config("retrieval.cache_capacity must be positive".to_string()));
        }
        if self.embedding.max_concurrent == 0 {
            return Err(RecapError::Config("embedding.max_concurrent must be positive".to_string()));
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::RecapError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("recap")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.storage.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [qa]
            max_short_answer = 2

            [chunking]
            unit = "characters"
            target_size = 800
            "#,
        )
        .unwrap();

        assert_eq!(settings.qa.max_single_choice, 1);
        assert_eq!(settings.qa.max_short_answer, 2);
        assert_eq!(crate::qa::QaLimits::from(&settings.qa).scripted_total(), 3);
        assert_eq!(settings.chunking.unit, ChunkUnit::Characters);
        assert_eq!(settings.retrieval.primary_hits, 3);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_target_size_rejected() {
        let mut settings = Settings::default();
        settings.chunking.target_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.qa.seed = Some(42);
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.qa.seed, Some(42));
    }
}
