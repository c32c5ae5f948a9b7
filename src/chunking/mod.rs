//! Splitting transcript text into bounded chunks for scripted questions.
//!
//! Chunks are contiguous slices of the input cut at whitespace. Joining the
//! chunk texts with single spaces gives back the input, except that the
//! whitespace at each cut collapses to one space.

use crate::transcript::{full_text, TranscriptEntry};
use serde::{Deserialize, Serialize};

/// A contiguous slice of transcript text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the chunk sequence.
    pub index: usize,
    /// Text content of this chunk.
    pub text: String,
}

/// What a chunk's target size counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkUnit {
    Words,
    Characters,
}

impl std::str::FromStr for ChunkUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "words" | "word" => Ok(ChunkUnit::Words),
            "characters" | "chars" => Ok(ChunkUnit::Characters),
            _ => Err(format!("Unknown chunk unit: {}", s)),
        }
    }
}

/// Configuration for chunking.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub unit: ChunkUnit,
    /// Target size in `unit`s. A single word longer than this still forms one chunk.
    pub target_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            unit: ChunkUnit::Words,
            target_size: 300,
        }
    }
}

impl From<&crate::config::ChunkingSettings> for ChunkingConfig {
    fn from(settings: &crate::config::ChunkingSettings) -> Self {
        Self {
            unit: settings.unit,
            target_size: settings.target_size,
        }
    }
}

/// Byte ranges of the whitespace-separated words in `text`.
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;

    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }

    spans
}

/// Split `text` into chunks of roughly `config.target_size` units.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let target = config.target_size.max(1);
    let spans = word_spans(text);
    let mut chunks = Vec::new();

    let mut chunk_start: Option<usize> = None;
    let mut chunk_end = 0;
    let mut words = 0;

    for (start, end) in spans {
        if let Some(cs) = chunk_start {
            let would_be = match config.unit {
                ChunkUnit::Words => words + 1,
                ChunkUnit::Characters => text[cs..end].chars().count(),
            };
            if would_be > target {
                chunks.push(Chunk {
                    index: chunks.len(),
                    text: text[cs..chunk_end].to_string(),
                });
                chunk_start = None;
                words = 0;
            }
        }

        if chunk_start.is_none() {
            chunk_start = Some(start);
        }
        chunk_end = end;
        words += 1;
    }

    if let Some(cs) = chunk_start {
        chunks.push(Chunk {
            index: chunks.len(),
            text: text[cs..chunk_end].to_string(),
        });
    }

    chunks
}

/// Chunk a transcript as one newline-joined document.
pub fn chunk_transcript(entries: &[TranscriptEntry], config: &ChunkingConfig) -> Vec<Chunk> {
    chunk_text(&full_text(entries), config)
}
