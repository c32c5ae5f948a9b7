//! Prompt templates for Recap.
//!
//! Prompts can be customized by placing a `qa.toml` file in the custom prompts directory.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder regex is valid"))
}

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub qa: QaPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts driving the question/answer dialogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaPrompts {
    /// Message the model session is primed with.
    pub context: String,
    pub single_choice: String,
    pub short_answer: String,
    pub evaluate: String,
    pub answer: String,
}

impl Default for QaPrompts {
    fn default() -> Self {
        Self {
            context: r#"You are an AI assistant to help test and reinforce understanding of this video content. Your role is to:
1. Ask ONE question about the video content and provide the answer in answer: **answer** format after the question.
2. Your answer should be concise and to the point.
3. Wait for the user's answer
4. Provide feedback on their answer

Keep everything educational and family-friendly. If you don't know something, be honest about it."#.to_string(),

            single_choice: r#"Write one single-choice question that tests understanding of this excerpt from the video transcript.

Excerpt:
{{chunk}}

Respond with JSON only, in this shape:
{"question": "...", "options": [{"text": "...", "is_correct": true}, {"text": "...", "is_correct": false}]}

Give between 2 and 4 options. Exactly one option must be correct."#.to_string(),

            short_answer: r#"Ask ONE short-answer question about this excerpt from the video transcript.

Excerpt:
{{chunk}}

Write the question on its own, then on a new line give the expected answer in the format:
answer: **expected answer**"#.to_string(),

            evaluate: r#"Question: {{question}}
Expected answer: {{expected}}
User's answer: {{answer}}

Judge whether the user's answer is correct. Start with "Correct" or "Not quite", then explain briefly in one or two sentences."#.to_string(),

            answer: r#"Answer the question using only these excerpts from the video transcript. If the excerpts don't cover it, say so.

Excerpts:
{{context}}

Question: {{question}}"#.to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let qa_path = custom_path.join("qa.toml");
            if qa_path.exists() {
                let content = std::fs::read_to_string(&qa_path)?;
                prompts.qa = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are replaced in a single pass, so substituted values are
    /// never expanded again. Unknown placeholders are left as written.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        placeholder()
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &[(&str, &str)]) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.to_string(), value.to_string());
        }
        Self::render(template, &merged)
    }
}
