//! Import command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::store::SqliteStore;
use crate::transcript::load_entries;
use anyhow::{Context, Result};
use std::path::Path;

/// Run the import command.
pub fn run_import(video_id: &str, file: &str, title: Option<String>, settings: Settings) -> Result<()> {
    let path = Settings::expand_path(file);
    let entries = load_entries(&path).with_context(|| format!("Failed to read transcript {}", file))?;

    if entries.is_empty() {
        Output::warning("Transcript has no entries; the dialogue will have nothing to ask about.");
    }

    let title = title.unwrap_or_else(|| default_title(&path, video_id));

    let store = SqliteStore::new(&settings.sqlite_path())?;
    store.store_transcript(video_id, &title, &entries)?;

    Output::success(&format!(
        "Imported {} entries for {} ({})",
        entries.len(),
        video_id,
        title
    ));
    Output::info(&format!("Start the dialogue with: recap quiz {}", video_id));

    Ok(())
}

fn default_title(path: &Path, video_id: &str) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| video_id.to_string())
}
