//! Question generation, grading and retrieval answers through the language model.

use super::session::AnswerOption;
use crate::config::Prompts;
use crate::error::{RecapError, Result};
use crate::llm::LanguageModel;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::{debug, instrument, warn};

/// A generated single-choice question.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleChoiceQuestion {
    pub question: String,
    pub options: Vec<AnswerOption>,
}

impl SingleChoiceQuestion {
    /// Text of the correct option.
    pub fn correct_answer(&self) -> &str {
        self.options
            .iter()
            .find(|o| o.is_correct)
            .map(|o| o.text.as_str())
            .unwrap_or_default()
    }
}

/// A generated short-answer question with its expected answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortAnswerQuestion {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
struct RawSingleChoice {
    question: String,
    options: Vec<AnswerOption>,
}

fn truncate_for_error(response: &str) -> &str {
    let end = response
        .char_indices()
        .nth(300)
        .map(|(i, _)| i)
        .unwrap_or(response.len());
    &response[..end]
}

/// Parse a single-choice question from model output containing a JSON object.
pub fn parse_single_choice(response: &str) -> Result<SingleChoiceQuestion> {
    // Try to extract JSON from the response
    let json_start = response.find('{');
    let json_end = response.rfind('}');

    let json_str = match (json_start, json_end) {
        (Some(start), Some(end)) if end > start => &response[start..=end],
        _ => response,
    };

    let raw: RawSingleChoice = serde_json::from_str(json_str).map_err(|e| {
        RecapError::QuestionFormat(format!("{}. Response was: {}", e, truncate_for_error(response)))
    })?;

    let question = raw.question.trim().to_string();
    if question.is_empty() {
        return Err(RecapError::QuestionFormat("empty question".to_string()));
    }

    let options: Vec<AnswerOption> = raw
        .options
        .into_iter()
        .map(|o| AnswerOption {
            text: o.text.trim().to_string(),
            is_correct: o.is_correct,
        })
        .filter(|o| !o.text.is_empty())
        .collect();

    if options.len() < 2 {
        return Err(RecapError::QuestionFormat(format!(
            "expected at least 2 options, got {}",
            options.len()
        )));
    }
    let correct = options.iter().filter(|o| o.is_correct).count();
    if correct != 1 {
        return Err(RecapError::QuestionFormat(format!(
            "expected exactly one correct option, got {}",
            correct
        )));
    }

    Ok(SingleChoiceQuestion { question, options })
}

fn answer_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"(?is)\banswer\s*:\s*\*\*(.+?)\*\*").expect("answer marker regex is valid")
    })
}

/// Parse a short-answer question followed by an `answer: **...**` marker.
pub fn parse_short_answer(response: &str) -> Result<ShortAnswerQuestion> {
    let captures = answer_marker().captures(response).ok_or_else(|| {
        RecapError::QuestionFormat(format!(
            "no answer marker. Response was: {}",
            truncate_for_error(response)
        ))
    })?;

    let marker_start = captures.get(0).map(|m| m.start()).unwrap_or(0);
    let answer = captures
        .get(1)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    let question = response[..marker_start].trim();
    let question = question
        .strip_prefix("Question:")
        .or_else(|| question.strip_prefix("question:"))
        .unwrap_or(question)
        .trim()
        .to_string();

    if question.is_empty() || answer.is_empty() {
        return Err(RecapError::QuestionFormat(
            "question or answer is empty".to_string(),
        ));
    }

    Ok(ShortAnswerQuestion { question, answer })
}

/// Renders prompts and turns model output into questions.
pub struct QuestionGenerator {
    prompts: Prompts,
    retries: u32,
}

impl QuestionGenerator {
    pub fn new(prompts: Prompts) -> Self {
        Self { prompts, retries: 5 }
    }

    /// Set how many generations are attempted before giving up.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries.max(1);
        self
    }

    /// Message the model session is primed with.
    pub fn context_message(&self) -> &str {
        &self.prompts.qa.context
    }

    async fn generate<T>(
        &self,
        model: &dyn LanguageModel,
        prompt: &str,
        parse: fn(&str) -> Result<T>,
    ) -> Result<T> {
        let mut last_error = None;

        for attempt in 1..=self.retries {
            let response = model.complete(prompt).await?;
            match parse(&response) {
                Ok(question) => return Ok(question),
                Err(e) => {
                    warn!("Attempt {}/{} produced an unusable question: {}", attempt, self.retries, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| RecapError::QuestionFormat("no attempts made".to_string())))
    }

    /// Generate a single-choice question about `chunk`.
    #[instrument(skip_all)]
    pub async fn single_choice(&self, model: &dyn LanguageModel, chunk: &str) -> Result<SingleChoiceQuestion> {
        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.qa.single_choice, &[("chunk", chunk)]);
        self.generate(model, &prompt, parse_single_choice).await
    }

    /// Generate a short-answer question about `chunk`.
    #[instrument(skip_all)]
    pub async fn short_answer(&self, model: &dyn LanguageModel, chunk: &str) -> Result<ShortAnswerQuestion> {
        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.qa.short_answer, &[("chunk", chunk)]);
        self.generate(model, &prompt, parse_short_answer).await
    }

    /// Grade `answer` to `question`; returns the model's feedback.
    #[instrument(skip_all)]
    pub async fn evaluate(
        &self,
        model: &dyn LanguageModel,
        question: &str,
        expected: &str,
        answer: &str,
    ) -> Result<String> {
        let prompt = self.prompts.render_with_custom(
            &self.prompts.qa.evaluate,
            &[("question", question), ("expected", expected), ("answer", answer)],
        );
        let feedback = model.complete(&prompt).await?;
        Ok(feedback.trim().to_string())
    }

    /// Answer a free-form question from retrieved context.
    #[instrument(skip_all)]
    pub async fn answer(&self, model: &dyn LanguageModel, question: &str, context: &str) -> Result<String> {
        let prompt = self.prompts.render_with_custom(
            &self.prompts.qa.answer,
            &[("question", question), ("context", context)],
        );
        debug!("Answer prompt is {} chars", prompt.len());
        let answer = model.complete(&prompt).await?;
        Ok(answer.trim().to_string())
    }
}
