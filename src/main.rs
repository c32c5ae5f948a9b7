//! Recap CLI entry point.

use anyhow::Result;
use clap::Parser;
use recap::cli::{commands, Cli, Commands};
use recap::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("recap={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let config_path = cli.config.as_deref().map(Settings::expand_path);
    let settings = Settings::load_from(config_path.as_ref())?;

    std::fs::create_dir_all(settings.data_dir())?;

    match &cli.command {
        Commands::Import { video_id, file, title } => {
            commands::run_import(video_id, file, title.clone(), settings)?;
        }

        Commands::List => {
            commands::run_list(settings)?;
        }

        Commands::Quiz { video_id } => {
            commands::run_quiz(video_id, settings).await?;
        }

        Commands::Search {
            video_id,
            query,
            top_n,
            context,
        } => {
            commands::run_search(video_id, query, *top_n, *context, settings).await?;
        }

        Commands::Chunks { video_id, size, unit } => {
            commands::run_chunks(video_id, *size, unit.as_deref(), settings)?;
        }

        Commands::Reset { video_id } => {
            commands::run_reset(video_id, settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, config_path, settings)?;
        }
    }

    Ok(())
}
