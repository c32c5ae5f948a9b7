//! Owner of one video's dialogue session.
//!
//! Transitions are computed against the current session without touching it
//! and returned as a [`SessionUpdate`]. Applying an update is the only way the
//! session changes, so a turn either lands completely or not at all.

use super::questions::QuestionGenerator;
use super::session::{
    ChunkingContext, MessageDraft, QaSession, StyleType, CORRECT_OPTION_MESSAGE, FREE_FORM_MESSAGE,
    WRONG_OPTION_MESSAGE,
};
use super::state::{transition, Effect, Progress, QaEvent, QaLimits, QaPhase, Transition};
use crate::chunking::Chunk;
use crate::error::{RecapError, Result};
use crate::llm::LanguageModel;
use crate::rag::ContextBuilder;
use chrono::Utc;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Called with the video id and the session after every applied update.
pub type UpdateCallback = Arc<dyn Fn(&str, &QaSession) + Send + Sync>;

/// A single change to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Append(MessageDraft),
    SetPrevQuestion(String),
    SetPrevAnswer(String),
    IncrementQuestionCount,
    IncrementSingleChoiceCount,
    MarkInitialized,
}

/// Changes produced by one transition, applied together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub mutations: Vec<Mutation>,
}

impl SessionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    pub fn append(&mut self, draft: MessageDraft) {
        self.push(Mutation::Append(draft));
    }

    pub fn extend(&mut self, other: SessionUpdate) {
        self.mutations.extend(other.mutations);
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// The activation generation a turn was started under.
///
/// Once the live generation moves on, the turn stops before its next
/// collaborator call.
#[derive(Debug, Clone)]
pub struct TurnGuard {
    current: Arc<AtomicU64>,
    dispatched: u64,
}

impl TurnGuard {
    pub fn new(current: Arc<AtomicU64>, dispatched: u64) -> Self {
        Self { current, dispatched }
    }

    pub fn is_stale(&self) -> bool {
        self.current.load(Ordering::SeqCst) != self.dispatched
    }
}

/// Collaborators a turn runs against.
pub struct TurnDeps<'a> {
    pub model: &'a dyn LanguageModel,
    pub generator: &'a QuestionGenerator,
    pub retriever: &'a ContextBuilder,
    pub guard: TurnGuard,
}

/// Inputs of a turn.
#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    /// The user's text, for message events.
    pub text: Option<String>,
    /// Chunk a scripted question is generated from.
    pub source_chunk: Option<String>,
}

/// Holds a session and the transitions that advance it.
#[derive(Clone)]
pub struct QaStateManager {
    video_id: String,
    session: QaSession,
    context: ChunkingContext,
    limits: QaLimits,
    on_update: UpdateCallback,
}

impl fmt::Debug for QaStateManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QaStateManager")
            .field("video_id", &self.video_id)
            .field("session", &self.session)
            .field("context", &self.context)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl QaStateManager {
    pub fn new(
        video_id: impl Into<String>,
        session: QaSession,
        context: ChunkingContext,
        limits: QaLimits,
        on_update: UpdateCallback,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            session,
            context,
            limits,
            on_update,
        }
    }

    /// Manager for a restored (or fresh) session. A session that has already
    /// asked questions accepts input right away.
    pub fn restore(
        video_id: impl Into<String>,
        session: QaSession,
        limits: QaLimits,
        on_update: UpdateCallback,
    ) -> Self {
        let context = ChunkingContext {
            is_initialized: session.question_count > 0,
            chunks: Vec::new(),
        };
        Self::new(video_id, session, context, limits, on_update)
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn session(&self) -> &QaSession {
        &self.session
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.context.chunks
    }

    pub fn set_chunks(&mut self, chunks: Vec<Chunk>) {
        self.context.chunks = chunks;
    }

    pub fn is_initialized(&self) -> bool {
        self.context.is_initialized
    }

    pub fn limits(&self) -> &QaLimits {
        &self.limits
    }

    pub fn progress(&self) -> Progress {
        Progress {
            initialized: self.context.is_initialized,
            question_count: self.session.question_count,
            single_choice_count: self.session.single_choice_count,
        }
    }

    pub fn phase(&self) -> QaPhase {
        QaPhase::of(&self.progress(), &self.limits)
    }

    /// Plan `event` against the current counters.
    pub fn plan(&self, event: QaEvent) -> Result<Transition> {
        transition(self.progress(), event, &self.limits)
    }

    /// Apply `update` and report the new session.
    pub fn apply(&mut self, update: SessionUpdate) {
        if update.is_empty() {
            return;
        }

        for mutation in update.mutations {
            match mutation {
                Mutation::Append(draft) => {
                    self.session.push(draft);
                }
                Mutation::SetPrevQuestion(q) => self.session.prev_question = q,
                Mutation::SetPrevAnswer(a) => self.session.prev_answer = a,
                Mutation::IncrementQuestionCount => self.session.question_count += 1,
                Mutation::IncrementSingleChoiceCount => self.session.single_choice_count += 1,
                Mutation::MarkInitialized => self.context.is_initialized = true,
            }
        }
        self.session.updated_at = Utc::now();

        (self.on_update)(&self.video_id, &self.session);
    }

    /// Append one message.
    pub fn append_message(&mut self, draft: MessageDraft) {
        let mut update = SessionUpdate::new();
        update.append(draft);
        self.apply(update);
    }

    /// Generate a single-choice question from `chunk`.
    pub async fn ask_single_choice(&self, deps: &TurnDeps<'_>, chunk: &str) -> Result<SessionUpdate> {
        let question = deps.generator.single_choice(deps.model, chunk).await?;

        let mut update = SessionUpdate::new();
        update.push(Mutation::SetPrevQuestion(question.question.clone()));
        update.push(Mutation::SetPrevAnswer(question.correct_answer().to_string()));
        update.append(MessageDraft::ai(question.question).with_options(question.options));
        Ok(update)
    }

    /// Generate a short-answer question from `chunk`.
    pub async fn ask_short_answer(&self, deps: &TurnDeps<'_>, chunk: &str) -> Result<SessionUpdate> {
        let question = deps.generator.short_answer(deps.model, chunk).await?;

        let mut update = SessionUpdate::new();
        update.push(Mutation::SetPrevQuestion(question.question.clone()));
        update.push(Mutation::SetPrevAnswer(question.answer));
        update.append(MessageDraft::ai(question.question));
        Ok(update)
    }

    /// Grade `answer` against the previous question.
    pub async fn evaluate_answer(&self, deps: &TurnDeps<'_>, answer: &str) -> Result<SessionUpdate> {
        let feedback = deps
            .generator
            .evaluate(
                deps.model,
                &self.session.prev_question,
                &self.session.prev_answer,
                answer,
            )
            .await?;

        let mut update = SessionUpdate::new();
        update.append(MessageDraft::ai(feedback));
        Ok(update)
    }

    /// Answer a free-form question from the video's embedding index.
    pub async fn answer_question(&self, deps: &TurnDeps<'_>, question: &str) -> Result<SessionUpdate> {
        let retrieved = deps.retriever.build(&self.video_id, question).await?;
        let answer = deps
            .generator
            .answer(deps.model, question, &retrieved.context)
            .await?;

        let mut update = SessionUpdate::new();
        update.append(MessageDraft::ai(answer));
        Ok(update)
    }

    /// Run every effect of `plan` and collect the resulting update.
    ///
    /// Stops early, returning what was collected so far, once `deps.guard`
    /// is stale. The caller is expected to discard that partial update.
    pub async fn execute(
        &self,
        plan: &Transition,
        input: &TurnInput,
        deps: &TurnDeps<'_>,
    ) -> Result<SessionUpdate> {
        let mut update = SessionUpdate::new();
        let text = || {
            input
                .text
                .as_deref()
                .ok_or_else(|| RecapError::InvalidInput("turn needs user text".to_string()))
        };
        let chunk = || input.source_chunk.as_deref().ok_or(RecapError::EmptyTranscript);

        for effect in &plan.effects {
            if effect.calls_collaborator() && deps.guard.is_stale() {
                debug!(?effect, video_id = %self.video_id, "Session replaced, stopping turn");
                return Ok(update);
            }
            debug!(?effect, video_id = %self.video_id, "Running effect");
            match effect {
                Effect::PrimeSession { reset } => {
                    deps.model
                        .ensure_session(*reset, !*reset, deps.generator.context_message())
                        .await?;
                }
                Effect::RecordUserMessage => update.append(MessageDraft::user(text()?)),
                Effect::OptionFeedback { correct } => {
                    let message = if *correct {
                        CORRECT_OPTION_MESSAGE
                    } else {
                        WRONG_OPTION_MESSAGE
                    };
                    update.append(MessageDraft::ai(message).styled(StyleType::Green));
                }
                Effect::Evaluate => update.extend(self.evaluate_answer(deps, text()?).await?),
                Effect::CompleteRound { single_choice } => {
                    update.push(Mutation::IncrementQuestionCount);
                    if *single_choice {
                        update.push(Mutation::IncrementSingleChoiceCount);
                    }
                }
                Effect::AskSingleChoice => update.extend(self.ask_single_choice(deps, chunk()?).await?),
                Effect::AskShortAnswer => update.extend(self.ask_short_answer(deps, chunk()?).await?),
                Effect::AnnounceFreeForm => {
                    update.append(MessageDraft::ai(FREE_FORM_MESSAGE).styled(StyleType::Green));
                    update.push(Mutation::IncrementQuestionCount);
                }
                Effect::Retrieve => update.extend(self.answer_question(deps, text()?).await?),
                Effect::MarkInitialized => update.push(Mutation::MarkInitialized),
            }
        }

        Ok(update)
    }
}
