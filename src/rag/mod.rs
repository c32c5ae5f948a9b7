//! Retrieval over a video's embedding index: similarity ranking and context assembly.

pub mod context;
pub mod search;

pub use context::{assemble, ContextBuilder, ContextPolicy, RetrievedContext, Window};
pub use search::{cosine_similarity, similarity_search, ScoredHit};
