//! Chunks command implementation.

use crate::chunking::{chunk_transcript, ChunkUnit, ChunkingConfig};
use crate::cli::Output;
use crate::config::Settings;
use crate::store::SqliteStore;
use anyhow::{anyhow, Result};

/// Run the chunks command.
pub fn run_chunks(video_id: &str, size: Option<usize>, unit: Option<&str>, settings: Settings) -> Result<()> {
    let mut config = ChunkingConfig::from(&settings.chunking);
    if let Some(size) = size {
        if size == 0 {
            return Err(anyhow!("Chunk size must be positive"));
        }
        config.target_size = size;
    }
    if let Some(unit) = unit {
        config.unit = unit.parse::<ChunkUnit>().map_err(|e| anyhow!(e))?;
    }

    let store = SqliteStore::new(&settings.sqlite_path())?;
    let entries = store
        .get_transcript(video_id)?
        .ok_or_else(|| anyhow!("No transcript imported for {}", video_id))?;

    let chunks = chunk_transcript(&entries, &config);

    Output::header(&format!(
        "{} chunks of ~{} {}",
        chunks.len(),
        config.target_size,
        match config.unit {
            ChunkUnit::Words => "words",
            ChunkUnit::Characters => "characters",
        }
    ));
    println!();

    for chunk in &chunks {
        Output::chunk(chunk.index, chunk.text.split_whitespace().count(), &chunk.text);
    }

    Ok(())
}
