//! CLI output formatting utilities.

use crate::qa::{QaMessage, Sender, StyleType};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print an imported transcript.
    pub fn transcript_info(title: &str, id: &str, entries: usize, duration: f64) {
        println!(
            "  {} {} ({}, {} entries, {})",
            style("*").cyan(),
            style(title).bold(),
            style(id).dim(),
            entries,
            format_duration(duration)
        );
    }

    /// Print a ranked transcript entry.
    pub fn search_result(rank: usize, timestamp: &str, score: f32, content: &str) {
        println!(
            "\n{} #{} @ {} (score: {:.2})",
            style(">>").green(),
            rank,
            style(timestamp).cyan(),
            score
        );
        println!("   {}", content_preview(content, 200));
    }

    /// Print a chunk with a preview of its text.
    pub fn chunk(index: usize, words: usize, text: &str) {
        println!(
            "{} {} {}",
            style(format!("[{}]", index)).cyan(),
            style(format!("({} words)", words)).dim(),
            content_preview(text, 120)
        );
    }

    /// Print one dialogue message. Options are numbered from 1.
    pub fn message(message: &QaMessage) {
        match message.sender {
            Sender::User => {
                println!("{} {}", style("You:").green().bold(), message.content);
            }
            Sender::Ai => {
                let content = match message.style_type {
                    Some(StyleType::Green) => style(message.content.as_str()).green().to_string(),
                    None => message.content.clone(),
                };
                println!("\n{} {}", style("Recap:").cyan().bold(), content);

                if let Some(options) = &message.options {
                    for (i, option) in options.iter().enumerate() {
                        println!("  {} {}", style(format!("{}.", i + 1)).cyan(), option.text);
                    }
                }
                println!();
            }
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Format duration in seconds to a human-readable string.
fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    match content.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &content[..end]),
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(42.9), "42s");
        assert_eq!(format_duration(125.0), "2m 5s");
        assert_eq!(format_duration(3725.0), "1h 2m 5s");
    }

    #[test]
    fn test_content_preview_respects_char_boundaries() {
        assert_eq!(content_preview("short\ntext", 20), "short text");
        assert_eq!(content_preview("héllo wörld", 4), "héll...");
    }
}
