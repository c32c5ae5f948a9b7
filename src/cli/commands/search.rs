//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::{EmbeddingCache, OpenAIEmbedder};
use crate::rag::{ContextBuilder, ContextPolicy};
use crate::store::SqliteStore;
use anyhow::{anyhow, Result};
use std::sync::Arc;

/// Run the search command.
pub async fn run_search(
    video_id: &str,
    query: &str,
    top_n: Option<usize>,
    show_context: bool,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let store = SqliteStore::new(&settings.sqlite_path())?;
    let entries = store
        .get_transcript(video_id)?
        .ok_or_else(|| anyhow!("No transcript imported for {}", video_id))?;

    let embedder = Arc::new(OpenAIEmbedder::with_config(
        &settings.embedding.model,
        settings.embedding.dimensions as usize,
    )?);
    let cache = Arc::new(
        EmbeddingCache::new(embedder, settings.retrieval.cache_capacity)
            .with_max_concurrent(settings.embedding.max_concurrent),
    );
    let builder = ContextBuilder::new(cache.clone())
        .with_top_n(top_n.unwrap_or(settings.retrieval.top_n))
        .with_policy(ContextPolicy::from(&settings.retrieval));

    let spinner = Output::spinner(&format!("Embedding {} transcript entries...", entries.len()));
    let built = cache.build_or_get(video_id, &entries).await;
    spinner.finish_and_clear();
    built?;

    let spinner = Output::spinner("Searching...");
    let results = builder.build(video_id, query).await;
    spinner.finish_and_clear();

    let retrieved = match results {
        Ok(retrieved) => retrieved,
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    };

    if retrieved.hits.is_empty() {
        Output::warning("No results found matching your query.");
        return Ok(());
    }

    Output::success(&format!("Found {} results", retrieved.hits.len()));
    for (rank, hit) in retrieved.hits.iter().enumerate() {
        let Some(entry) = entries.get(hit.index) else {
            continue;
        };
        Output::search_result(rank + 1, &entry.format_timestamp(), hit.similarity, &entry.text);
    }

    if show_context {
        Output::header("Context");
        println!("{}", retrieved.context);
    }

    Ok(())
}
