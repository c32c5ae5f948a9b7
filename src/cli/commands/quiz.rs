//! Interactive question/answer dialogue.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::RecapError;
use crate::qa::{Activation, QaOrchestrator, QaPhase, TurnOutcome};
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};
use tracing::debug;

/// What a line typed at the prompt asks for.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Exit,
    Reset,
    /// Zero-based option index.
    Choice(usize),
    Message(&'a str),
}

fn parse_input(line: &str, choosing: bool) -> Option<Input<'_>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return Some(Input::Exit);
    }
    if line.eq_ignore_ascii_case("reset") {
        return Some(Input::Reset);
    }
    if choosing {
        if let Ok(n) = line.parse::<usize>() {
            if n >= 1 {
                return Some(Input::Choice(n - 1));
            }
        }
    }
    Some(Input::Message(line))
}

/// Print messages after the first `shown`; returns the new count.
fn print_new(orchestrator: &QaOrchestrator, shown: usize) -> usize {
    let messages = orchestrator.messages();
    for message in messages.iter().skip(shown) {
        Output::message(message);
    }
    messages.len()
}

fn report_activation(activation: &Activation, video_id: &str) -> bool {
    match activation {
        Activation::Ready | Activation::InProgress | Activation::Superseded => true,
        Activation::Recovered { error } => {
            debug!("Initialization failed: {}", error);
            true
        }
        Activation::TranscriptPending => {
            Output::error(&format!("No transcript imported for {}", video_id));
            Output::info(&format!("Import one first: recap import {} <file>", video_id));
            false
        }
        Activation::EmptyTranscript => {
            Output::error("The transcript has no text to ask questions about.");
            false
        }
    }
}

/// Run the quiz command.
pub async fn run_quiz(video_id: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Quiz) {
        Output::error(&format!("{}", e));
        Output::info("Run 'recap config show' to check your configuration.");
        return Err(e.into());
    }

    let orchestrator = QaOrchestrator::new(&settings)?;

    let spinner = Output::spinner("Preparing the dialogue...");
    let activation = orchestrator.activate(video_id).await;
    spinner.finish_and_clear();

    if !report_activation(&activation?, video_id) {
        return Ok(());
    }

    println!("\n{}", style("Recap").bold().cyan());
    println!(
        "{}\n",
        style("Answer with an option number or text. Type 'reset' to start over, 'exit' to quit.").dim()
    );

    let mut shown = print_new(&orchestrator, 0);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let choosing = orchestrator.phase() == Some(QaPhase::SingleChoice);
        let Some(input) = parse_input(&line, choosing) else {
            continue;
        };

        let outcome = match input {
            Input::Exit => {
                Output::info("Goodbye! Your progress is saved.");
                break;
            }
            Input::Reset => {
                orchestrator.reset()?;
                let spinner = Output::spinner("Starting over...");
                let activation = orchestrator.refresh().await;
                spinner.finish_and_clear();
                if !report_activation(&activation?, video_id) {
                    break;
                }
                println!();
                shown = print_new(&orchestrator, 0);
                continue;
            }
            Input::Choice(option) => {
                let spinner = Output::spinner("Thinking...");
                let outcome = orchestrator.select_option(option).await;
                spinner.finish_and_clear();
                outcome
            }
            Input::Message(text) => {
                let spinner = Output::spinner("Thinking...");
                let outcome = orchestrator.send(text).await;
                spinner.finish_and_clear();
                outcome
            }
        };

        match outcome {
            Ok(TurnOutcome::Recovered { error }) => debug!("Turn failed: {}", error),
            Ok(TurnOutcome::Ignored) => Output::warning("Wait for the first question."),
            Ok(_) => {}
            Err(RecapError::InvalidInput(msg)) => Output::warning(&msg),
            Err(e) => Output::error(&format!("Error: {}", e)),
        }

        shown = print_new(&orchestrator, shown);
    }

    orchestrator.deactivate();
    Ok(())
}
