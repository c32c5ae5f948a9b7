//! CLI module for Recap.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Recap - quiz yourself on a video, then ask it anything
///
/// Imports video transcripts, asks scripted questions about them and answers
/// free-form questions from the most relevant transcript passages.
#[derive(Parser, Debug)]
#[command(name = "recap")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import a transcript from a JSON file of {start, text} entries
    Import {
        /// Video ID to store the transcript under
        video_id: String,

        /// Path to the transcript JSON file
        file: String,

        /// Title shown in listings (defaults to the file name)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// List imported transcripts
    List,

    /// Start or resume the question/answer dialogue for a video
    Quiz {
        /// Video ID of an imported transcript
        video_id: String,
    },

    /// Rank transcript entries of a video by similarity to a query
    Search {
        /// Video ID of an imported transcript
        video_id: String,

        /// Search query
        query: String,

        /// Number of results
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Also print the context a free-form answer would be given
        #[arg(long)]
        context: bool,
    },

    /// Show how a transcript is split into question chunks
    Chunks {
        /// Video ID of an imported transcript
        video_id: String,

        /// Target chunk size (overrides config)
        #[arg(short, long)]
        size: Option<usize>,

        /// Chunk unit: words or characters (overrides config)
        #[arg(short, long)]
        unit: Option<String>,
    },

    /// Discard the stored dialogue of a video
    Reset {
        /// Video ID whose session is removed
        video_id: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration file if none exists
    Init,
}
