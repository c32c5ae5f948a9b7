//! Reset command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::store::{SessionStore, SqliteStore};
use anyhow::Result;

/// Run the reset command.
pub fn run_reset(video_id: &str, settings: Settings) -> Result<()> {
    let store = SqliteStore::new(&settings.sqlite_path())?;

    match store.clear(video_id)? {
        0 => Output::info(&format!("No stored dialogue for {}", video_id)),
        _ => Output::success(&format!("Dialogue for {} cleared", video_id)),
    }

    Ok(())
}
