//! Context building for retrieval answers.
//!
//! Each ranked hit is widened with its neighbouring entries. The leading
//! hits get a wide window, the rest a narrow one.

use super::search::{similarity_search, ScoredHit};
use crate::config::RetrievalSettings;
use crate::embedding::EmbeddingCache;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Number of neighbours gathered on each side of a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub before: usize,
    pub after: usize,
}

impl Window {
    pub fn new(before: usize, after: usize) -> Self {
        Self { before, after }
    }
}

/// Expand each hit into `[..before, hit, ..after]`, joined by spaces.
///
/// Output order follows the hits. Indices outside the sequence or absent
/// from `text_by_index` are skipped.
pub fn assemble(hits: &[ScoredHit], text_by_index: &HashMap<usize, &str>, window: Window) -> Vec<String> {
    hits.iter()
        .map(|hit| {
            let first = hit.index.saturating_sub(window.before);
            let last = hit.index.saturating_add(window.after);

            (first..=last)
                .filter_map(|i| text_by_index.get(&i).copied())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Two-tier windowing over ranked hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextPolicy {
    /// Leading hits that use `primary`.
    pub primary_hits: usize,
    pub primary: Window,
    pub secondary: Window,
}

impl Default for ContextPolicy {
    fn default() -> Self {
        Self {
            primary_hits: 3,
            primary: Window::new(8, 8),
            secondary: Window::new(3, 3),
        }
    }
}

impl From<&RetrievalSettings> for ContextPolicy {
    fn from(settings: &RetrievalSettings) -> Self {
        Self {
            primary_hits: settings.primary_hits,
            primary: Window::new(settings.primary_before, settings.primary_after),
            secondary: Window::new(settings.secondary_before, settings.secondary_after),
        }
    }
}

impl ContextPolicy {
    /// Assemble the passages for `hits` and join them with blank lines.
    pub fn build(&self, hits: &[ScoredHit], text_by_index: &HashMap<usize, &str>) -> String {
        let split = self.primary_hits.min(hits.len());
        let (primary, secondary) = hits.split_at(split);

        let mut passages = assemble(primary, text_by_index, self.primary);
        passages.extend(assemble(secondary, text_by_index, self.secondary));

        passages.join("\n\n")
    }
}

/// Context retrieved for one question.
#[derive(Debug, Clone)]
pub struct RetrievedContext {
    pub hits: Vec<ScoredHit>,
    pub context: String,
}

/// Builds retrieval context from a video's cached embedding index.
pub struct ContextBuilder {
    cache: Arc<EmbeddingCache>,
    top_n: usize,
    policy: ContextPolicy,
}

impl ContextBuilder {
    /// Create a new context builder.
    pub fn new(cache: Arc<EmbeddingCache>) -> Self {
        Self {
            cache,
            top_n: 10,
            policy: ContextPolicy::default(),
        }
    }

    /// Set the number of ranked hits.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Set the windowing policy.
    pub fn with_policy(mut self, policy: ContextPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Rank the cached index for `video_id` against `query` without expanding context.
    pub async fn search(&self, video_id: &str, query: &str) -> Result<Vec<ScoredHit>> {
        let index = self.cache.require(video_id)?;
        let query_embedding = self.cache.embedder().embed(query).await?;
        Ok(similarity_search(&query_embedding, &index.entries, self.top_n))
    }

    /// Build context for a question about `video_id`.
    ///
    /// Fails with `MissingIndex` if the video's index has not been built.
    #[instrument(skip(self, query))]
    pub async fn build(&self, video_id: &str, query: &str) -> Result<RetrievedContext> {
        let index = self.cache.require(video_id)?;
        let query_embedding = self.cache.embedder().embed(query).await?;

        let hits = similarity_search(&query_embedding, &index.entries, self.top_n);
        let context = self.policy.build(&hits, &index.text_by_index());

        debug!("Built context from {} hits ({} chars)", hits.len(), context.len());
        Ok(RetrievedContext { hits, context })
    }
}
