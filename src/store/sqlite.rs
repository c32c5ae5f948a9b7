//! SQLite-backed storage for sessions and imported transcripts.

use super::SessionStore;
use crate::error::{RecapError, Result};
use crate::qa::QaSession;
use crate::transcript::{TranscriptEntry, TranscriptSource, TranscriptStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    video_id TEXT PRIMARY KEY,
    session_json TEXT NOT NULL,
    question_count INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transcripts (
    video_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    transcript_json TEXT NOT NULL,
    entry_count INTEGER NOT NULL,
    duration_seconds REAL NOT NULL,
    imported_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transcripts_imported_at ON transcripts(imported_at);
"#;

/// Summary of an imported transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTranscript {
    pub video_id: String,
    pub title: String,
    pub entry_count: usize,
    /// Start of the last entry, in seconds.
    pub duration_seconds: f64,
    pub imported_at: DateTime<Utc>,
}

/// SQLite store for sessions and transcripts.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Opened SQLite store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RecapError::Store(format!("Failed to acquire lock: {}", e)))
    }

    /// Store a transcript under `video_id`, replacing any previous one.
    pub fn store_transcript(&self, video_id: &str, title: &str, entries: &[TranscriptEntry]) -> Result<()> {
        let transcript_json = serde_json::to_string(entries)?;
        let duration = entries.last().map(|e| e.start).unwrap_or(0.0);

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO transcripts
            (video_id, title, transcript_json, entry_count, duration_seconds, imported_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                video_id,
                title,
                transcript_json,
                entries.len() as i64,
                duration,
                Utc::now().to_rfc3339(),
            ],
        )?;

        info!("Stored transcript for video {} ({} entries)", video_id, entries.len());
        Ok(())
    }

    /// The stored transcript for `video_id`.
    pub fn get_transcript(&self, video_id: &str) -> Result<Option<Vec<TranscriptEntry>>> {
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT transcript_json FROM transcripts WHERE video_id = ?1",
                params![video_id],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => {
                let entries = serde_json::from_str(&json).map_err(|e| {
                    RecapError::Store(format!("Failed to deserialize transcript: {}", e))
                })?;
                Ok(Some(entries))
            }
            None => Ok(None),
        }
    }

    /// All stored transcripts, newest first.
    pub fn list_transcripts(&self) -> Result<Vec<StoredTranscript>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT video_id, title, entry_count, duration_seconds, imported_at
             FROM transcripts ORDER BY imported_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            let imported_at: String = row.get(4)?;
            Ok(StoredTranscript {
                video_id: row.get(0)?,
                title: row.get(1)?,
                entry_count: row.get::<_, i64>(2)? as usize,
                duration_seconds: row.get(3)?,
                imported_at: DateTime::parse_from_rfc3339(&imported_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;

        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Remove the transcript for `video_id`. Returns how many were removed.
    pub fn delete_transcript(&self, video_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM transcripts WHERE video_id = ?1", params![video_id])?;
        Ok(deleted)
    }
}

impl SessionStore for SqliteStore {
    fn get(&self, video_id: &str) -> Result<Option<QaSession>> {
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT session_json FROM sessions WHERE video_id = ?1",
                params![video_id],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| RecapError::Store(format!("Failed to deserialize session: {}", e)))
        })
        .transpose()
    }

    fn set(&self, video_id: &str, session: &QaSession) -> Result<()> {
        let session_json = serde_json::to_string(session)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO sessions (video_id, session_json, question_count, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                video_id,
                session_json,
                session.question_count,
                session.updated_at.to_rfc3339(),
            ],
        )?;

        debug!("Saved session for {} at question {}", video_id, session.question_count);
        Ok(())
    }

    fn clear(&self, video_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM sessions WHERE video_id = ?1", params![video_id])?;
        Ok(deleted)
    }
}

#[async_trait]
impl TranscriptSource for SqliteStore {
    async fn get_transcript(&self, video_id: &str) -> Result<TranscriptStatus> {
        Ok(match SqliteStore::get_transcript(self, video_id)? {
            Some(entries) => TranscriptStatus::Ready(entries),
            None => TranscriptStatus::Pending,
        })
    }
}
