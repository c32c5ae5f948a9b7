//! Embedding generation and the per-video embedding index.

pub mod index;
mod openai;

pub use index::{EmbeddingCache, EmbeddingEntry, EmbeddingIndex};
pub use openai::OpenAIEmbedder;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let futures = texts.iter().map(|t| self.embed(t));
        futures::future::try_join_all(futures).await
    }

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}
