//! Per-video persistence of dialogue sessions.

mod memory;
mod sqlite;

pub use memory::MemorySessionStore;
pub use sqlite::{SqliteStore, StoredTranscript};

use crate::error::Result;
use crate::qa::QaSession;

/// Key-value persistence of sessions, keyed by video id.
///
/// Calls are synchronous so a session can be written from inside the
/// manager's update callback.
pub trait SessionStore: Send + Sync {
    /// The stored session for `video_id`, if any.
    fn get(&self, video_id: &str) -> Result<Option<QaSession>>;

    /// Store `session` under `video_id`, replacing any previous one.
    fn set(&self, video_id: &str, session: &QaSession) -> Result<()>;

    /// Remove the session for `video_id`. Returns how many were removed.
    fn clear(&self, video_id: &str) -> Result<usize>;
}
