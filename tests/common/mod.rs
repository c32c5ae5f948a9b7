//! In-memory collaborators for driving the orchestrator in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use recap::config::{Prompts, QaPrompts, Settings};
use recap::embedding::Embedder;
use recap::llm::LanguageModel;
use recap::qa::{QaComponents, QaOrchestrator};
use recap::store::{MemorySessionStore, SessionStore};
use recap::transcript::{TranscriptEntry, TranscriptSource, TranscriptStatus};
use recap::{RecapError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const DIMENSIONS: usize = 32;

/// Bag-of-words embedder: each word lands in a hashed bucket.
#[derive(Default)]
pub struct FakeEmbedder {
    calls: AtomicUsize,
    fail_on: Mutex<Option<String>>,
}

impl FakeEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    /// Make embedding `text` fail until cleared.
    pub fn fail_on(&self, text: Option<&str>) {
        *self.fail_on.lock().unwrap() = text.map(str::to_string);
    }
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIMENSIONS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
        vector[bucket % DIMENSIONS] += 1.0;
    }
    vector
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.lock().unwrap().as_deref() == Some(text) {
            return Err(RecapError::Embedding(format!("refused to embed {:?}", text)));
        }
        Ok(bag_of_words(text))
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }
}

/// Answers prompts by their leading tag, recording everything it is asked.
///
/// `complete` can be gated: once armed, the next call signals `entered` and
/// waits for `release` before answering.
#[derive(Default)]
pub struct ScriptedModel {
    pub prompts: Mutex<Vec<String>>,
    pub sessions: Mutex<Vec<(bool, bool)>>,
    fail: AtomicBool,
    armed: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
}

impl ScriptedModel {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Hold the next completion until `release` is notified.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn prompts_with_tag(&self, tag: &str) -> Vec<String> {
        self.prompts()
            .into_iter()
            .filter(|p| p.starts_with(tag))
            .collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn ensure_session(&self, reset: bool, keep_history: bool, _context_message: &str) -> Result<()> {
        self.sessions.lock().unwrap().push((reset, keep_history));
        Ok(())
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }

        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(RecapError::LanguageModel("model unavailable".to_string()));
        }

        let reply = if prompt.starts_with("SC ") {
            r#"{"question": "Which word appears in the chunk?", "options": [
                {"text": "ownership", "is_correct": true},
                {"text": "garbage collector", "is_correct": false},
                {"text": "inheritance", "is_correct": false}
            ]}"#
            .to_string()
        } else if prompt.starts_with("SA ") {
            "What does the speaker explain?\nanswer: **How borrowing works**".to_string()
        } else if prompt.starts_with("EV ") {
            "Close enough, well done.".to_string()
        } else if prompt.starts_with("AN ") {
            "The video covers that topic.".to_string()
        } else {
            return Err(RecapError::LanguageModel(format!("unexpected prompt {:?}", prompt)));
        };
        Ok(reply)
    }
}

/// Transcripts keyed by video id; unknown ids are pending.
#[derive(Default)]
pub struct MemoryTranscripts {
    transcripts: Mutex<HashMap<String, Vec<TranscriptEntry>>>,
}

impl MemoryTranscripts {
    pub fn insert(&self, video_id: &str, entries: Vec<TranscriptEntry>) {
        self.transcripts
            .lock()
            .unwrap()
            .insert(video_id.to_string(), entries);
    }
}

#[async_trait]
impl TranscriptSource for MemoryTranscripts {
    async fn get_transcript(&self, video_id: &str) -> Result<TranscriptStatus> {
        Ok(match self.transcripts.lock().unwrap().get(video_id) {
            Some(entries) => TranscriptStatus::Ready(entries.clone()),
            None => TranscriptStatus::Pending,
        })
    }
}

pub fn entries(texts: &[&str]) -> Vec<TranscriptEntry> {
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| TranscriptEntry::new(i as f64 * 4.0, *t))
        .collect()
}

pub fn rust_talk() -> Vec<TranscriptEntry> {
    entries(&[
        "welcome to this talk about rust ownership",
        "every value has exactly one owner",
        "borrowing lets you reference a value without owning it",
        "the tokio runtime schedules async tasks",
        "cargo builds and tests the whole project",
    ])
}

pub fn test_prompts() -> Prompts {
    Prompts {
        qa: QaPrompts {
            context: "CTX".to_string(),
            single_choice: "SC {{chunk}}".to_string(),
            short_answer: "SA {{chunk}}".to_string(),
            evaluate: "EV {{question}} | {{expected}} | {{answer}}".to_string(),
            answer: "AN {{question}}\n{{context}}".to_string(),
        },
        variables: HashMap::new(),
    }
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.qa.seed = Some(42);
    settings.qa.question_retries = 2;
    settings.chunking.target_size = 8;
    settings.embedding.max_concurrent = 2;
    settings
}

/// An orchestrator wired to fakes, with handles to each fake.
pub struct Harness {
    pub orchestrator: Arc<QaOrchestrator>,
    pub model: Arc<ScriptedModel>,
    pub embedder: Arc<FakeEmbedder>,
    pub transcripts: Arc<MemoryTranscripts>,
    pub store: Arc<MemorySessionStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemorySessionStore::new()))
    }

    pub fn with_store(store: Arc<MemorySessionStore>) -> Self {
        let model = Arc::new(ScriptedModel::default());
        let embedder = Arc::new(FakeEmbedder::default());
        let transcripts = Arc::new(MemoryTranscripts::default());
        transcripts.insert("rust-talk", rust_talk());

        let components = QaComponents {
            model: model.clone(),
            embedder: embedder.clone(),
            transcripts: transcripts.clone(),
            store: store.clone() as Arc<dyn SessionStore>,
        };
        let orchestrator = Arc::new(QaOrchestrator::with_components(
            &test_settings(),
            test_prompts(),
            components,
        ));

        Self {
            orchestrator,
            model,
            embedder,
            transcripts,
            store,
        }
    }

    /// Index of the correct option of the open question.
    pub fn correct_option(&self) -> usize {
        let session = self.orchestrator.session().expect("active session");
        session
            .open_options()
            .expect("open question")
            .iter()
            .position(|o| o.is_correct)
            .expect("a correct option")
    }
}
