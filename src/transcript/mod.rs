//! Transcript entries and the sources they are acquired from.
//!
//! Acquiring a transcript (scraping captions, speech-to-text) happens outside
//! this crate; a [`TranscriptSource`] hands over the finished entries.

use crate::error::{RecapError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// One timed line of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Start time in seconds.
    pub start: f64,
    /// Spoken text.
    pub text: String,
}

impl TranscriptEntry {
    pub fn new(start: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            text: text.into(),
        }
    }

    /// Format timestamp for display.
    pub fn format_timestamp(&self) -> String {
        let total_seconds = self.start.max(0.0) as u32;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let secs = total_seconds % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, secs)
        } else {
            format!("{:02}:{:02}", minutes, secs)
        }
    }
}

/// Join entry texts into one newline-separated document.
pub fn full_text(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|e| e.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a JSON array of `{start, text}` objects, checking the entries are chronological.
pub fn parse_entries(json: &str) -> Result<Vec<TranscriptEntry>> {
    let entries: Vec<TranscriptEntry> = serde_json::from_str(json)?;

    for (i, pair) in entries.windows(2).enumerate() {
        if pair[1].start < pair[0].start {
            return Err(RecapError::Transcript(format!(
                "entry {} starts at {}s, before the previous entry ({}s)",
                i + 1,
                pair[1].start,
                pair[0].start
            )));
        }
    }
    if let Some(bad) = entries.iter().find(|e| e.start < 0.0) {
        return Err(RecapError::Transcript(format!(
            "negative start time {}s",
            bad.start
        )));
    }

    Ok(entries)
}

/// Read a transcript from a JSON file.
pub fn load_entries(path: &Path) -> Result<Vec<TranscriptEntry>> {
    let content = std::fs::read_to_string(path)?;
    parse_entries(&content)
}

/// Availability of a transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptStatus {
    /// Entries are available, in chronological order.
    Ready(Vec<TranscriptEntry>),
    /// Acquisition is still running; ask again later.
    Pending,
}

/// Trait for transcript acquisition.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Fetch the transcript for a video.
    async fn get_transcript(&self, video_id: &str) -> Result<TranscriptStatus>;
}

/// Reads `<dir>/<video_id>.json` files.
///
/// A missing file is reported as [`TranscriptStatus::Pending`], so a
/// transcript written later by another tool is picked up on the next call.
pub struct DirectoryTranscriptSource {
    dir: PathBuf,
}

impl DirectoryTranscriptSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, video_id: &str) -> Result<PathBuf> {
        if video_id.is_empty() || video_id.contains(['/', '\\']) || video_id.starts_with('.') {
            return Err(RecapError::InvalidInput(format!("Invalid video id: {}", video_id)));
        }
        Ok(self.dir.join(format!("{}.json", video_id)))
    }
}

#[async_trait]
impl TranscriptSource for DirectoryTranscriptSource {
    #[instrument(skip(self))]
    async fn get_transcript(&self, video_id: &str) -> Result<TranscriptStatus> {
        let path = self.path_for(video_id)?;
        if !path.exists() {
            debug!("No transcript file at {:?} yet", path);
            return Ok(TranscriptStatus::Pending);
        }
        let content = tokio::fs::read_to_string(&path).await?;
        Ok(TranscriptStatus::Ready(parse_entries(&content)?))
    }
}
