//! Drives the dialogue for whichever video is active.
//!
//! The orchestrator restores or creates a session when a video is activated,
//! builds the video's embedding index once the transcript is available, asks
//! the first scripted question and routes user input to the state manager.
//!
//! Turns run without holding any lock. Each turn captures the activation
//! generation when it starts. Once the active video changes, the turn makes
//! no further collaborator calls and its result is dropped instead of applied.

use super::manager::{
    QaStateManager, SessionUpdate, TurnDeps, TurnGuard, TurnInput, UpdateCallback,
};
use super::picker::ChunkPicker;
use super::questions::QuestionGenerator;
use super::session::{MessageDraft, QaMessage, QaSession, ERROR_MESSAGE};
use super::state::{QaEvent, QaLimits, QaPhase};
use crate::chunking::{chunk_transcript, ChunkingConfig};
use crate::config::{Prompts, Settings};
use crate::embedding::{EmbeddingCache, Embedder, OpenAIEmbedder};
use crate::error::{RecapError, Result};
use crate::llm::{LanguageModel, OpenAILanguageModel};
use crate::rag::{ContextBuilder, ContextPolicy};
use crate::store::{SessionStore, SqliteStore};
use crate::transcript::{TranscriptEntry, TranscriptSource, TranscriptStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, instrument, warn};

/// Result of activating a video or refreshing its transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    /// Index built; the dialogue accepts input.
    Ready,
    /// The transcript is not available yet.
    TranscriptPending,
    /// The transcript has no text.
    EmptyTranscript,
    /// Another video was activated before this one finished.
    Superseded,
    /// Initialization is already running.
    InProgress,
    /// Initialization failed and the error message was added to the dialogue.
    Recovered { error: String },
}

/// Result of a user turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Applied,
    /// A collaborator failed; the error message was added and counters are unchanged.
    Recovered { error: String },
    /// The active video changed while the turn was running.
    Discarded,
    /// The dialogue does not accept input yet.
    Ignored,
}

/// Collaborators the orchestrator works with.
pub struct QaComponents {
    pub model: Arc<dyn LanguageModel>,
    pub embedder: Arc<dyn Embedder>,
    pub transcripts: Arc<dyn TranscriptSource>,
    pub store: Arc<dyn SessionStore>,
}

struct Inner {
    manager: Option<QaStateManager>,
    thinking: bool,
    initializing: bool,
    picker: ChunkPicker,
}

/// The dialogue driver.
pub struct QaOrchestrator {
    limits: QaLimits,
    chunking: ChunkingConfig,
    model: Arc<dyn LanguageModel>,
    cache: Arc<EmbeddingCache>,
    retriever: ContextBuilder,
    generator: QuestionGenerator,
    transcripts: Arc<dyn TranscriptSource>,
    store: Arc<dyn SessionStore>,
    /// Bumped, under the `inner` lock, whenever the active session is replaced.
    generation: Arc<AtomicU64>,
    inner: Mutex<Inner>,
}

/// Marks a turn as running. Dropping it before the turn finishes, as when
/// the caller cancels the future, clears the busy flags again.
struct BusyGuard<'a> {
    orchestrator: &'a QaOrchestrator,
    generation: u64,
    finished: bool,
}

impl<'a> BusyGuard<'a> {
    fn new(orchestrator: &'a QaOrchestrator, generation: u64) -> Self {
        Self {
            orchestrator,
            generation,
            finished: false,
        }
    }

    /// Hand the turn over to [`QaOrchestrator::finish`].
    fn release(mut self) -> u64 {
        self.finished = true;
        self.generation
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut inner = self.orchestrator.lock();
        if self.orchestrator.current_generation() == self.generation {
            debug!("Turn was cancelled before it finished");
            inner.thinking = false;
            inner.initializing = false;
        }
    }
}

impl QaOrchestrator {
    /// Create an orchestrator backed by OpenAI and the configured SQLite store.
    pub fn new(settings: &Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let store = Arc::new(SqliteStore::new(&settings.sqlite_path())?);
        let model = OpenAILanguageModel::new(&settings.qa.model)?
            .with_max_history(settings.qa.max_history_messages);
        let embedder = OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        )?;

        let components = QaComponents {
            model: Arc::new(model),
            embedder: Arc::new(embedder),
            transcripts: store.clone(),
            store,
        };

        Ok(Self::with_components(settings, prompts, components))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(settings: &Settings, prompts: Prompts, components: QaComponents) -> Self {
        let cache = Arc::new(
            EmbeddingCache::new(components.embedder, settings.retrieval.cache_capacity)
                .with_max_concurrent(settings.embedding.max_concurrent),
        );
        let retriever = ContextBuilder::new(cache.clone())
            .with_top_n(settings.retrieval.top_n)
            .with_policy(ContextPolicy::from(&settings.retrieval));
        let generator = QuestionGenerator::new(prompts).with_retries(settings.qa.question_retries);

        Self {
            limits: QaLimits::from(&settings.qa),
            chunking: ChunkingConfig::from(&settings.chunking),
            model: components.model,
            cache,
            retriever,
            generator,
            transcripts: components.transcripts,
            store: components.store,
            generation: Arc::new(AtomicU64::new(0)),
            inner: Mutex::new(Inner {
                manager: None,
                thinking: false,
                initializing: false,
                picker: ChunkPicker::new(settings.qa.seed),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn deps(&self, generation: u64) -> TurnDeps<'_> {
        TurnDeps {
            model: self.model.as_ref(),
            generator: &self.generator,
            retriever: &self.retriever,
            guard: TurnGuard::new(self.generation.clone(), generation),
        }
    }

    fn persist_callback(&self) -> UpdateCallback {
        let store = self.store.clone();
        Arc::new(move |video_id: &str, session: &QaSession| {
            if let Err(e) = store.set(video_id, session) {
                error!("Failed to persist session for {}: {}", video_id, e);
            }
        })
    }

    fn flush(&self, manager: &QaStateManager) {
        if let Err(e) = self.store.set(manager.video_id(), manager.session()) {
            error!("Failed to flush session for {}: {}", manager.video_id(), e);
        }
    }

    /// Flush and drop the active session; in-flight turns become stale.
    fn teardown(&self, inner: &mut Inner) {
        if let Some(manager) = inner.manager.take() {
            debug!("Tearing down session for {}", manager.video_id());
            self.flush(&manager);
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        inner.thinking = false;
        inner.initializing = false;
    }

    /// Make `video_id` the active video and prepare its dialogue.
    ///
    /// A previously stored session is resumed. Activating the video that is
    /// already active keeps its session and only refreshes the transcript.
    #[instrument(skip(self))]
    pub async fn activate(&self, video_id: &str) -> Result<Activation> {
        if video_id.trim().is_empty() {
            return Err(RecapError::InvalidInput("video id is empty".to_string()));
        }

        {
            let mut inner = self.lock();
            let same_video = inner
                .manager
                .as_ref()
                .is_some_and(|m| m.video_id() == video_id);

            if !same_video {
                self.teardown(&mut inner);

                let session = match self.store.get(video_id)? {
                    Some(session) => {
                        info!(
                            "Resuming session for {} at question {}",
                            video_id, session.question_count
                        );
                        session
                    }
                    None => QaSession::new(),
                };

                inner.manager = Some(QaStateManager::restore(
                    video_id,
                    session,
                    self.limits,
                    self.persist_callback(),
                ));
            }
        }

        self.refresh().await
    }

    /// Fetch the active video's transcript and, once it is available, build
    /// the index and ask the first question if none was asked yet.
    ///
    /// Call again after [`Activation::TranscriptPending`] or a recovered failure.
    pub async fn refresh(&self) -> Result<Activation> {
        let (video_id, generation) = {
            let inner = self.lock();
            let manager = inner.manager.as_ref().ok_or(RecapError::NoActiveVideo)?;
            (manager.video_id().to_string(), self.current_generation())
        };

        let entries = match self.transcripts.get_transcript(&video_id).await? {
            TranscriptStatus::Ready(entries) => entries,
            TranscriptStatus::Pending => {
                debug!("Transcript for {} is not available yet", video_id);
                return Ok(Activation::TranscriptPending);
            }
        };

        let chunks = chunk_transcript(&entries, &self.chunking);
        let has_chunks = !chunks.is_empty();
        {
            let mut inner = self.lock();
            if self.current_generation() != generation {
                return Ok(Activation::Superseded);
            }
            if let Some(manager) = inner.manager.as_mut() {
                manager.set_chunks(chunks);
            }
        }

        if !has_chunks {
            warn!("Transcript for {} has no text", video_id);
            return Ok(Activation::EmptyTranscript);
        }

        self.initialize(&video_id, generation, &entries).await
    }

    /// Build the index, then prime the model and ask the first question for
    /// a session that has not started yet.
    async fn initialize(
        &self,
        video_id: &str,
        generation: u64,
        entries: &[TranscriptEntry],
    ) -> Result<Activation> {
        let (plan, snapshot, source_chunk) = {
            let mut inner = self.lock();
            let Inner {
                manager,
                thinking,
                initializing,
                picker,
            } = &mut *inner;

            if self.current_generation() != generation {
                return Ok(Activation::Superseded);
            }
            if *initializing || *thinking {
                return Ok(Activation::InProgress);
            }

            let manager = manager.as_ref().ok_or(RecapError::NoActiveVideo)?;
            let plan = if manager.is_initialized() {
                None
            } else {
                Some(manager.plan(QaEvent::Start)?)
            };
            let source_chunk = match &plan {
                Some(plan) if plan.needs_chunk() => Some(
                    picker
                        .pick(manager.chunks())
                        .ok_or(RecapError::EmptyTranscript)?
                        .text
                        .clone(),
                ),
                _ => None,
            };

            *initializing = true;
            *thinking = true;
            (plan, manager.clone(), source_chunk)
        };

        let busy = BusyGuard::new(self, generation);
        let deps = self.deps(generation);
        let input = TurnInput {
            text: None,
            source_chunk,
        };

        let result = async {
            self.cache.build_or_get(video_id, entries).await?;

            match &plan {
                Some(plan) => snapshot.execute(plan, &input, &deps).await,
                None if deps.guard.is_stale() => Ok(SessionUpdate::new()),
                None => {
                    self.model
                        .ensure_session(false, true, self.generator.context_message())
                        .await?;
                    Ok(SessionUpdate::new())
                }
            }
        }
        .await;

        Ok(match self.finish(busy, None, result)? {
            TurnOutcome::Applied | TurnOutcome::Ignored => Activation::Ready,
            TurnOutcome::Discarded => Activation::Superseded,
            TurnOutcome::Recovered { error } => Activation::Recovered { error },
        })
    }

    /// Send free text: an answer to a scripted question, or a question about
    /// the video once free-form mode is reached.
    #[instrument(skip(self, text))]
    pub async fn send(&self, text: &str) -> Result<TurnOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RecapError::InvalidInput("message is empty".to_string()));
        }
        self.run_turn(QaEvent::UserMessage, Some(text.to_string())).await
    }

    /// Pick option `option` (zero-based) of the open single-choice question.
    #[instrument(skip(self))]
    pub async fn select_option(&self, option: usize) -> Result<TurnOutcome> {
        let correct = {
            let inner = self.lock();
            let manager = inner.manager.as_ref().ok_or(RecapError::NoActiveVideo)?;
            let options = manager
                .session()
                .open_options()
                .ok_or_else(|| RecapError::InvalidInput("no question with options is open".to_string()))?;
            options
                .get(option)
                .ok_or_else(|| {
                    RecapError::InvalidInput(format!(
                        "option {} does not exist ({} options)",
                        option + 1,
                        options.len()
                    ))
                })?
                .is_correct
        };

        self.run_turn(QaEvent::OptionSelected { correct }, None).await
    }

    async fn run_turn(&self, event: QaEvent, text: Option<String>) -> Result<TurnOutcome> {
        let (generation, plan, snapshot, source_chunk) = {
            let mut inner = self.lock();
            let Inner {
                manager,
                thinking,
                picker,
                ..
            } = &mut *inner;

            let manager = manager.as_ref().ok_or(RecapError::NoActiveVideo)?;
            if *thinking {
                return Err(RecapError::Busy);
            }
            if !manager.phase().accepts_input() {
                debug!("Ignoring {} before the first question", event);
                return Ok(TurnOutcome::Ignored);
            }

            let plan = manager.plan(event)?;
            let source_chunk = if plan.needs_chunk() {
                Some(
                    picker
                        .pick(manager.chunks())
                        .ok_or(RecapError::EmptyTranscript)?
                        .text
                        .clone(),
                )
            } else {
                None
            };

            *thinking = true;
            (self.current_generation(), plan, manager.clone(), source_chunk)
        };

        debug!(from = %plan.from, to = %plan.to, "Running {}", event);

        let busy = BusyGuard::new(self, generation);
        let input = TurnInput {
            text: text.clone(),
            source_chunk,
        };
        let result = snapshot.execute(&plan, &input, &self.deps(generation)).await;

        self.finish(busy, text.as_deref(), result)
    }

    /// Apply a finished turn, unless the session it was planned against is gone.
    fn finish(
        &self,
        busy: BusyGuard<'_>,
        user_text: Option<&str>,
        result: Result<SessionUpdate>,
    ) -> Result<TurnOutcome> {
        let generation = busy.release();
        let mut inner = self.lock();
        if self.current_generation() != generation {
            debug!("Dropping result of a turn for a session that is no longer active");
            return Ok(TurnOutcome::Discarded);
        }

        inner.thinking = false;
        inner.initializing = false;
        let manager = inner.manager.as_mut().ok_or(RecapError::NoActiveVideo)?;

        match result {
            Ok(update) => {
                manager.apply(update);
                Ok(TurnOutcome::Applied)
            }
            Err(e) if e.is_collaborator_failure() => {
                error!("Turn for {} failed: {}", manager.video_id(), e);

                let mut update = SessionUpdate::new();
                if let Some(text) = user_text {
                    update.append(MessageDraft::user(text));
                }
                update.append(MessageDraft::ai(ERROR_MESSAGE));
                manager.apply(update);

                Ok(TurnOutcome::Recovered {
                    error: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Flush the active session and stop driving it.
    pub fn deactivate(&self) {
        let mut inner = self.lock();
        self.teardown(&mut inner);
    }

    /// Discard the active video's session and start a fresh one.
    ///
    /// Returns how many stored sessions were removed. Call
    /// [`refresh`](Self::refresh) afterwards to ask the first question again.
    pub fn reset(&self) -> Result<usize> {
        let mut inner = self.lock();
        let manager = inner.manager.take().ok_or(RecapError::NoActiveVideo)?;

        let cleared = self.store.clear(manager.video_id())?;
        info!("Reset session for {}", manager.video_id());

        let mut fresh = QaStateManager::restore(
            manager.video_id(),
            QaSession::new(),
            self.limits,
            self.persist_callback(),
        );
        fresh.set_chunks(manager.chunks().to_vec());

        inner.manager = Some(fresh);
        self.generation.fetch_add(1, Ordering::SeqCst);
        inner.thinking = false;
        inner.initializing = false;

        Ok(cleared)
    }

    /// The active video id.
    pub fn active_video(&self) -> Option<String> {
        self.lock().manager.as_ref().map(|m| m.video_id().to_string())
    }

    /// A copy of the active session.
    pub fn session(&self) -> Option<QaSession> {
        self.lock().manager.as_ref().map(|m| m.session().clone())
    }

    /// Messages of the active session.
    pub fn messages(&self) -> Vec<QaMessage> {
        self.lock()
            .manager
            .as_ref()
            .map(|m| m.session().messages.clone())
            .unwrap_or_default()
    }

    pub fn phase(&self) -> Option<QaPhase> {
        self.lock().manager.as_ref().map(|m| m.phase())
    }

    /// Whether a turn is running.
    pub fn is_thinking(&self) -> bool {
        self.lock().thinking
    }

    pub fn is_initialized(&self) -> bool {
        self.lock()
            .manager
            .as_ref()
            .is_some_and(|m| m.is_initialized())
    }

    /// The embedding cache shared by every video.
    pub fn cache(&self) -> Arc<EmbeddingCache> {
        self.cache.clone()
    }

    pub fn retriever(&self) -> &ContextBuilder {
        &self.retriever
    }
}

impl Drop for QaOrchestrator {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(manager) = inner.manager.as_ref() {
            if let Err(e) = self.store.set(manager.video_id(), manager.session()) {
                error!("Failed to flush session for {}: {}", manager.video_id(), e);
            }
        }
    }
}
