//! Per-video embedding index with a bounded, process-wide cache.
//!
//! An index holds one embedding per transcript entry. It is built at most once
//! per video while its transcript is unchanged; a different transcript for the
//! same video replaces the index wholesale.

use super::Embedder;
use crate::error::{RecapError, Result};
use crate::transcript::TranscriptEntry;
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

/// Embedding of one transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingEntry {
    /// Position of the source entry in the transcript.
    pub index: usize,
    pub embedding: Vec<f32>,
    /// Copy of the source text.
    pub transcript: String,
}

/// All embeddings for one video.
#[derive(Debug, Clone)]
pub struct EmbeddingIndex {
    pub video_id: String,
    /// Content hash of the transcript the index was built from.
    pub fingerprint: String,
    pub entries: Vec<EmbeddingEntry>,
}

impl EmbeddingIndex {
    /// Text of every entry keyed by its index.
    pub fn text_by_index(&self) -> HashMap<usize, &str> {
        self.entries
            .iter()
            .map(|e| (e.index, e.transcript.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Content hash identifying a transcript.
pub fn fingerprint(entries: &[TranscriptEntry]) -> String {
    let mut hasher = blake3::Hasher::new();
    for entry in entries {
        hasher.update(entry.text.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize().to_hex().to_string()
}

/// Cache of embedding indexes keyed by video id, evicting the least recently
/// used video once `capacity` is exceeded.
pub struct EmbeddingCache {
    embedder: Arc<dyn Embedder>,
    max_concurrent: usize,
    indexes: Mutex<LruCache<String, Arc<EmbeddingIndex>>>,
}

impl EmbeddingCache {
    pub fn new(embedder: Arc<dyn Embedder>, capacity: usize) -> Self {
        Self {
            embedder,
            max_concurrent: 8,
            indexes: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// Set how many embedding calls may be in flight while building.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// The embedder used for indexes and queries.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Arc<EmbeddingIndex>>> {
        self.indexes.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the cached index for `video_id`, building it if absent or stale.
    ///
    /// One embedding call is issued per entry. If any call fails the build
    /// fails as a whole and nothing is cached.
    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn build_or_get(
        &self,
        video_id: &str,
        entries: &[TranscriptEntry],
    ) -> Result<Arc<EmbeddingIndex>> {
        let fingerprint = fingerprint(entries);

        if let Some(index) = self.get_matching(video_id, &fingerprint) {
            debug!("Embedding cache hit for {}", video_id);
            return Ok(index);
        }

        info!("Embedding {} transcript entries for {}", entries.len(), video_id);

        let embedder = &self.embedder;
        let embedded: Vec<EmbeddingEntry> = futures::stream::iter(0..entries.len())
            .map(|index| {
                let entry = &entries[index];
                async move {
                    let embedding = embedder.embed(&entry.text).await?;
                    Ok::<_, RecapError>(EmbeddingEntry {
                        index,
                        embedding,
                        transcript: entry.text.clone(),
                    })
                }
            })
            .buffered(self.max_concurrent)
            .try_collect()
            .await?;

        let index = Arc::new(EmbeddingIndex {
            video_id: video_id.to_string(),
            fingerprint,
            entries: embedded,
        });
        self.insert(index.clone());

        Ok(index)
    }

    fn get_matching(&self, video_id: &str, fingerprint: &str) -> Option<Arc<EmbeddingIndex>> {
        let mut indexes = self.lock();
        let index = indexes.get(video_id)?.clone();
        if index.fingerprint != fingerprint {
            debug!("Transcript for {} changed, rebuilding index", video_id);
            return None;
        }
        Some(index)
    }

    fn insert(&self, index: Arc<EmbeddingIndex>) {
        let video_id = index.video_id.clone();
        if let Some((evicted, _)) = self.lock().push(video_id.clone(), index) {
            if evicted != video_id {
                debug!("Evicted embedding index for {}", evicted);
            }
        }
    }

    /// The cached index for `video_id`, if built.
    pub fn get(&self, video_id: &str) -> Option<Arc<EmbeddingIndex>> {
        self.lock().get(video_id).cloned()
    }

    /// Like [`get`](Self::get), failing with [`RecapError::MissingIndex`].
    pub fn require(&self, video_id: &str) -> Result<Arc<EmbeddingIndex>> {
        self.get(video_id)
            .ok_or_else(|| RecapError::MissingIndex(video_id.to_string()))
    }

    /// Number of cached indexes.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
