//! The question/answer dialogue.
//!
//! A session starts with scripted questions generated from random transcript
//! chunks (single-choice first, then short-answer) and then switches to
//! free-form questions answered from retrieved transcript context.

pub mod manager;
pub mod orchestrator;
mod picker;
pub mod questions;
pub mod session;
pub mod state;

pub use manager::{Mutation, QaStateManager, SessionUpdate, TurnDeps, TurnInput, UpdateCallback};
pub use orchestrator::{Activation, QaComponents, QaOrchestrator, TurnOutcome};
pub use picker::ChunkPicker;
pub use questions::{
    parse_short_answer, parse_single_choice, QuestionGenerator, ShortAnswerQuestion,
    SingleChoiceQuestion,
};
pub use session::{
    AnswerOption, ChunkingContext, MessageDraft, QaMessage, QaSession, Sender, StyleType,
    CORRECT_OPTION_MESSAGE, ERROR_MESSAGE, FREE_FORM_MESSAGE, INITIAL_MESSAGE,
    WRONG_OPTION_MESSAGE,
};
pub use state::{transition, Effect, Progress, QaEvent, QaLimits, QaPhase, Transition};
