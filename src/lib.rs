//! Recap - quiz yourself on a video transcript, then ask it anything
//!
//! A retrieval-augmented question/answer engine over video transcripts.
//!
//! # Overview
//!
//! For each video, Recap:
//! - asks scripted questions generated from random transcript chunks
//!   (single-choice first, then short-answer) and grades the answers
//! - then answers free-form questions from the transcript entries most
//!   similar to the question, widened with their neighbours
//! - persists the dialogue per video, so reopening it resumes
//!
//! # Architecture
//!
//! - `transcript` - Transcript entries and their sources
//! - `chunking` - Splitting transcripts into question chunks
//! - `embedding` - Embedding generation and the per-video index cache
//! - `rag` - Similarity search and context assembly
//! - `llm` - The text-completion collaborator
//! - `qa` - Sessions, the dialogue state machine and the orchestrator
//! - `store` - Session and transcript persistence
//! - `config` - Configuration management
//!
//! # Example
//!
//! ```rust,no_run
//! use recap::config::Settings;
//! use recap::qa::{Activation, QaOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = QaOrchestrator::new(&settings)?;
//!
//!     if orchestrator.activate("dQw4w9WgXcQ").await? == Activation::Ready {
//!         for message in orchestrator.messages() {
//!             println!("{}", message.content);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod openai;
pub mod qa;
pub mod rag;
pub mod store;
pub mod transcript;

pub use error::{RecapError, Result};
