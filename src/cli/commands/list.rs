//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::store::SqliteStore;
use anyhow::Result;

/// Run the list command.
pub fn run_list(settings: Settings) -> Result<()> {
    let store = SqliteStore::new(&settings.sqlite_path())?;
    let transcripts = store.list_transcripts()?;

    if transcripts.is_empty() {
        Output::info("No transcripts imported yet. Use 'recap import <video_id> <file>' to add one.");
        return Ok(());
    }

    Output::header(&format!("Imported Transcripts ({})", transcripts.len()));
    println!();

    for item in &transcripts {
        Output::transcript_info(&item.title, &item.video_id, item.entry_count, item.duration_seconds);
    }

    let total_entries: usize = transcripts.iter().map(|t| t.entry_count).sum();
    println!();
    Output::kv("Total transcripts", &transcripts.len().to_string());
    Output::kv("Total entries", &total_entries.to_string());

    Ok(())
}
