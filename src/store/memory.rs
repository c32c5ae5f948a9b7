//! In-memory session store.
//!
//! Useful for testing and for runs that should not leave anything behind.

use super::SessionStore;
use crate::error::Result;
use crate::qa::QaSession;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory session store.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, QaSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, video_id: &str) -> Result<Option<QaSession>> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        Ok(sessions.get(video_id).cloned())
    }

    fn set(&self, video_id: &str, session: &QaSession) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.insert(video_id.to_string(), session.clone());
        Ok(())
    }

    fn clear(&self, video_id: &str) -> Result<usize> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        Ok(usize::from(sessions.remove(video_id).is_some()))
    }
}
