//! Dialogue phases and the transition function between them.
//!
//! A phase is derived from the session counters. [`transition`] maps a phase
//! and an event to the effects a turn must carry out and the phase reached
//! once they succeed. Events that make no sense in a phase are rejected
//! before any collaborator is called.

use crate::error::{RecapError, Result};
use std::fmt;

/// Scripted question limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QaLimits {
    pub max_single_choice: u32,
    pub max_short_answer: u32,
}

impl QaLimits {
    pub fn scripted_total(&self) -> u32 {
        self.max_single_choice + self.max_short_answer
    }
}

impl Default for QaLimits {
    fn default() -> Self {
        Self {
            max_single_choice: 1,
            max_short_answer: 1,
        }
    }
}

impl From<&crate::config::QaSettings> for QaLimits {
    fn from(settings: &crate::config::QaSettings) -> Self {
        Self {
            max_single_choice: settings.max_single_choice,
            max_short_answer: settings.max_short_answer,
        }
    }
}

/// Counters a phase is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub initialized: bool,
    pub question_count: u32,
    pub single_choice_count: u32,
}

/// Phase of the dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QaPhase {
    /// No scripted question asked yet; input is not accepted.
    Uninitialized,
    SingleChoice,
    ShortAnswer,
    /// Scripted questions are done but free-form mode was not announced.
    Transitioning,
    OpenRetrieval,
}

impl QaPhase {
    pub fn of(progress: &Progress, limits: &QaLimits) -> Self {
        let qc = progress.question_count;
        if !progress.initialized {
            QaPhase::Uninitialized
        } else if qc < limits.max_single_choice {
            QaPhase::SingleChoice
        } else if qc < limits.scripted_total() {
            QaPhase::ShortAnswer
        } else if qc == limits.scripted_total() {
            QaPhase::Transitioning
        } else {
            QaPhase::OpenRetrieval
        }
    }

    /// Whether user text is accepted in this phase.
    pub fn accepts_input(&self) -> bool {
        !matches!(self, QaPhase::Uninitialized)
    }
}

impl fmt::Display for QaPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QaPhase::Uninitialized => "uninitialized",
            QaPhase::SingleChoice => "single-choice",
            QaPhase::ShortAnswer => "short-answer",
            QaPhase::Transitioning => "transitioning",
            QaPhase::OpenRetrieval => "open-retrieval",
        };
        write!(f, "{}", name)
    }
}

/// Something that drives the dialogue forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QaEvent {
    /// The transcript is ready; ask the first question.
    Start,
    /// The user picked an option of the open single-choice question.
    OptionSelected { correct: bool },
    /// The user sent free text.
    UserMessage,
}

impl fmt::Display for QaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QaEvent::Start => write!(f, "start"),
            QaEvent::OptionSelected { .. } => write!(f, "option selection"),
            QaEvent::UserMessage => write!(f, "user message"),
        }
    }
}

/// One step of a turn, executed in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Prime the language model with the dialogue context.
    PrimeSession { reset: bool },
    /// Log the user's text.
    RecordUserMessage,
    /// Fixed reply to an option pick.
    OptionFeedback { correct: bool },
    /// Grade the user's text against the previous question.
    Evaluate,
    /// Count a finished question round.
    CompleteRound { single_choice: bool },
    AskSingleChoice,
    AskShortAnswer,
    /// Announce free-form mode; counts once.
    AnnounceFreeForm,
    /// Answer the user's text from retrieved transcript context.
    Retrieve,
    MarkInitialized,
}

impl Effect {
    /// Whether the effect needs a source chunk.
    pub fn needs_chunk(&self) -> bool {
        matches!(self, Effect::AskSingleChoice | Effect::AskShortAnswer)
    }

    /// Whether the effect calls the language model or the embedder.
    pub fn calls_collaborator(&self) -> bool {
        matches!(
            self,
            Effect::PrimeSession { .. }
                | Effect::Evaluate
                | Effect::AskSingleChoice
                | Effect::AskShortAnswer
                | Effect::Retrieve
        )
    }

    /// Counter changes made by this effect.
    pub fn advance(&self, progress: &mut Progress) {
        match self {
            Effect::CompleteRound { single_choice } => {
                progress.question_count += 1;
                if *single_choice {
                    progress.single_choice_count += 1;
                }
            }
            Effect::AnnounceFreeForm => progress.question_count += 1,
            Effect::MarkInitialized => progress.initialized = true,
            _ => {}
        }
    }
}

/// The plan for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: QaPhase,
    pub to: QaPhase,
    pub effects: Vec<Effect>,
    /// Counters once every effect has succeeded.
    pub progress: Progress,
}

impl Transition {
    pub fn needs_chunk(&self) -> bool {
        self.effects.iter().any(Effect::needs_chunk)
    }
}

/// The scripted step that follows once `question_count` rounds are done.
fn next_scripted(question_count: u32, limits: &QaLimits) -> Effect {
    if question_count < limits.max_single_choice {
        Effect::AskSingleChoice
    } else if question_count < limits.scripted_total() {
        Effect::AskShortAnswer
    } else {
        Effect::AnnounceFreeForm
    }
}

/// Plan the effects of `event` in the phase given by `progress`.
pub fn transition(progress: Progress, event: QaEvent, limits: &QaLimits) -> Result<Transition> {
    use Effect::*;

    let from = QaPhase::of(&progress, limits);
    let illegal = || RecapError::IllegalTransition {
        phase: from.to_string(),
        event: event.to_string(),
    };

    let effects = match (from, event) {
        (QaPhase::Uninitialized, QaEvent::Start) => {
            if progress.question_count == 0 {
                vec![
                    PrimeSession { reset: true },
                    next_scripted(0, limits),
                    MarkInitialized,
                ]
            } else {
                vec![PrimeSession { reset: true }, MarkInitialized]
            }
        }

        (QaPhase::SingleChoice, QaEvent::OptionSelected { correct })
            if progress.single_choice_count < limits.max_single_choice =>
        {
            let next = next_scripted(progress.question_count + 1, limits);
            let mut effects = vec![
                OptionFeedback { correct },
                CompleteRound { single_choice: true },
            ];
            if next != AnnounceFreeForm {
                effects.push(PrimeSession { reset: false });
            }
            effects.push(next);
            effects
        }

        (QaPhase::SingleChoice | QaPhase::ShortAnswer, QaEvent::UserMessage) => {
            let next = next_scripted(progress.question_count + 1, limits);
            let mut effects = vec![
                RecordUserMessage,
                Evaluate,
                CompleteRound { single_choice: false },
            ];
            if next != AnnounceFreeForm {
                effects.push(PrimeSession { reset: false });
            }
            effects.push(next);
            effects
        }

        (QaPhase::Transitioning, QaEvent::UserMessage) => {
            vec![RecordUserMessage, Evaluate, AnnounceFreeForm]
        }

        (QaPhase::OpenRetrieval, QaEvent::UserMessage) => vec![RecordUserMessage, Retrieve],

        _ => return Err(illegal()),
    };

    let mut next = progress;
    for effect in &effects {
        effect.advance(&mut next);
    }

    Ok(Transition {
        from,
        to: QaPhase::of(&next, limits),
        effects,
        progress: next,
    })
}
