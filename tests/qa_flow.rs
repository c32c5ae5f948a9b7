//! End-to-end dialogue behaviour of the orchestrator against in-memory collaborators.

mod common;

use common::{entries, Harness};
use recap::qa::{
    Activation, MessageDraft, QaPhase, QaSession, Sender, StyleType, TurnOutcome,
    CORRECT_OPTION_MESSAGE, ERROR_MESSAGE, FREE_FORM_MESSAGE, INITIAL_MESSAGE,
    WRONG_OPTION_MESSAGE,
};
use recap::store::SessionStore;
use recap::RecapError;

#[tokio::test]
async fn test_scripted_flow_reaches_open_retrieval() {
    let h = Harness::new();
    let orc = &h.orchestrator;

    assert_eq!(orc.activate("rust-talk").await.unwrap(), Activation::Ready);
    assert!(orc.is_initialized());
    assert_eq!(orc.phase(), Some(QaPhase::SingleChoice));

    let messages = orc.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, INITIAL_MESSAGE);
    assert_eq!(messages[1].options.as_ref().map(|o| o.len()), Some(3));
    assert_eq!(h.model.prompts_with_tag("SC ").len(), 1);
    assert_eq!(h.model.sessions.lock().unwrap()[0], (true, false));

    // Single-choice answer
    let correct = h.correct_option();
    assert_eq!(orc.select_option(correct).await.unwrap(), TurnOutcome::Applied);

    let session = orc.session().unwrap();
    assert_eq!(session.question_count, 1);
    assert_eq!(session.single_choice_count, 1);
    assert_eq!(orc.phase(), Some(QaPhase::ShortAnswer));
    let feedback = &session.messages[2];
    assert_eq!(feedback.content, CORRECT_OPTION_MESSAGE);
    assert_eq!(feedback.style_type, Some(StyleType::Green));
    assert_eq!(session.messages[3].content, "What does the speaker explain?");
    assert_eq!(session.prev_answer, "How borrowing works");

    // Short-answer evaluation, then the one-time free-form announcement
    assert_eq!(orc.send("it is about borrowing").await.unwrap(), TurnOutcome::Applied);

    let session = orc.session().unwrap();
    assert_eq!(session.question_count, 3);
    assert_eq!(orc.phase(), Some(QaPhase::OpenRetrieval));
    let tail: Vec<_> = session.messages[4..].iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        tail,
        vec!["it is about borrowing", "Close enough, well done.", FREE_FORM_MESSAGE]
    );
    let evaluation = h.model.prompts_with_tag("EV ");
    assert_eq!(
        evaluation,
        vec!["EV What does the speaker explain? | How borrowing works | it is about borrowing"]
    );

    // Open retrieval does not count
    assert_eq!(orc.send("what schedules async tasks?").await.unwrap(), TurnOutcome::Applied);
    assert_eq!(orc.send("and what builds it?").await.unwrap(), TurnOutcome::Applied);

    let session = orc.session().unwrap();
    assert_eq!(session.question_count, 3);
    assert_eq!(session.messages.len(), 11);
    assert_eq!(session.messages.last().unwrap().sender, Sender::Ai);
    assert_eq!(h.model.prompts_with_tag("AN ").len(), 2);

    // Every mutation was mirrored into the store
    let stored = h.store.get("rust-talk").unwrap().unwrap();
    assert_eq!(stored, session);
}

#[tokio::test]
async fn test_wrong_option_still_advances() {
    let h = Harness::new();
    let orc = &h.orchestrator;
    orc.activate("rust-talk").await.unwrap();

    let wrong = if h.correct_option() == 0 { 1 } else { 0 };
    orc.select_option(wrong).await.unwrap();

    let session = orc.session().unwrap();
    assert_eq!(session.messages[2].content, WRONG_OPTION_MESSAGE);
    assert_eq!(session.question_count, 1);
    assert_eq!(session.single_choice_count, 1);
}

#[tokio::test]
async fn test_resume_does_not_reask() {
    let h = Harness::new();

    let mut persisted = QaSession::new();
    persisted.push(MessageDraft::ai("Which word appears?"));
    persisted.push(MessageDraft::ai(CORRECT_OPTION_MESSAGE).styled(StyleType::Green));
    persisted.push(MessageDraft::ai("What does the speaker explain?"));
    persisted.push(MessageDraft::user("ownership"));
    persisted.push(MessageDraft::ai("Close enough, well done."));
    persisted.question_count = 2;
    persisted.single_choice_count = 1;
    persisted.prev_question = "What does the speaker explain?".to_string();
    persisted.prev_answer = "How borrowing works".to_string();
    h.store.set("rust-talk", &persisted).unwrap();

    let orc = &h.orchestrator;
    assert_eq!(orc.activate("rust-talk").await.unwrap(), Activation::Ready);

    assert_eq!(orc.session().unwrap(), persisted);
    assert_eq!(orc.phase(), Some(QaPhase::Transitioning));
    assert!(h.model.prompts().is_empty());
    assert_eq!(h.embedder.calls(), 5);

    orc.send("borrowing, I think").await.unwrap();
    let session = orc.session().unwrap();
    assert_eq!(session.question_count, 3);
    assert_eq!(session.messages.last().unwrap().content, FREE_FORM_MESSAGE);
}

#[tokio::test]
async fn test_stale_result_is_dropped() {
    let h = Harness::new();
    h.transcripts.insert("other-talk", entries(&["a second video about databases"]));
    let orc = h.orchestrator.clone();

    orc.activate("rust-talk").await.unwrap();
    let correct = h.correct_option();
    let before = orc.session().unwrap();

    // Hold the short-answer generation that follows the option pick
    h.model.arm();
    let pending = {
        let orc = orc.clone();
        tokio::spawn(async move { orc.select_option(correct).await })
    };
    h.model.entered.notified().await;
    assert!(orc.is_thinking());

    assert_eq!(orc.activate("other-talk").await.unwrap(), Activation::Ready);
    let other = orc.session().unwrap();

    h.model.release.notify_one();
    assert_eq!(pending.await.unwrap().unwrap(), TurnOutcome::Discarded);

    // Neither the new session nor the flushed one changed
    assert_eq!(orc.active_video().as_deref(), Some("other-talk"));
    assert_eq!(orc.session().unwrap(), other);
    assert_eq!(h.store.get("rust-talk").unwrap().unwrap(), before);
    assert!(!orc.is_thinking());
}

#[tokio::test]
async fn test_superseded_turn_stops_calling_the_model() {
    let h = Harness::new();
    h.transcripts.insert("other-talk", entries(&["a second video about databases"]));
    let orc = h.orchestrator.clone();

    orc.activate("rust-talk").await.unwrap();
    assert_eq!(orc.phase(), Some(QaPhase::SingleChoice));

    // Hold the evaluation of a free-text reply to the open question
    h.model.arm();
    let pending = {
        let orc = orc.clone();
        tokio::spawn(async move { orc.send("free text answer").await })
    };
    h.model.entered.notified().await;

    assert_eq!(orc.activate("other-talk").await.unwrap(), Activation::Ready);
    let sessions_at_switch = h.model.sessions.lock().unwrap().clone();
    let prompts_at_switch = h.model.prompts().len();

    h.model.release.notify_one();
    assert_eq!(pending.await.unwrap().unwrap(), TurnOutcome::Discarded);

    // Only the held evaluation completed; nothing re-primed the model or
    // generated another question for the old video
    assert_eq!(*h.model.sessions.lock().unwrap(), sessions_at_switch);
    let late: Vec<String> = h.model.prompts()[prompts_at_switch..].to_vec();
    assert_eq!(late.len(), 1);
    assert!(late[0].starts_with("EV "));
    assert!(h.model.prompts_with_tag("SA ").is_empty());
}

#[tokio::test]
async fn test_concurrent_refresh_asks_first_question_once() {
    let h = Harness::new();
    let orc = h.orchestrator.clone();

    // Hold the first single-choice generation
    h.model.arm();
    let pending = {
        let orc = orc.clone();
        tokio::spawn(async move { orc.activate("rust-talk").await })
    };
    h.model.entered.notified().await;

    assert_eq!(orc.refresh().await.unwrap(), Activation::InProgress);

    h.model.release.notify_one();
    assert_eq!(pending.await.unwrap().unwrap(), Activation::Ready);

    assert_eq!(h.model.prompts_with_tag("SC ").len(), 1);
    assert_eq!(orc.session().unwrap().messages.len(), 2);
    assert!(orc.is_initialized());
}

#[tokio::test]
async fn test_stale_initialization_is_superseded() {
    let h = Harness::new();
    h.transcripts.insert("other-talk", entries(&["a second video about databases"]));
    let orc = h.orchestrator.clone();

    h.model.arm();
    let pending = {
        let orc = orc.clone();
        tokio::spawn(async move { orc.activate("rust-talk").await })
    };
    h.model.entered.notified().await;

    assert_eq!(orc.activate("other-talk").await.unwrap(), Activation::Ready);
    let other = orc.session().unwrap();

    h.model.release.notify_one();
    assert_eq!(pending.await.unwrap().unwrap(), Activation::Superseded);

    assert_eq!(orc.active_video().as_deref(), Some("other-talk"));
    assert_eq!(orc.session().unwrap(), other);

    // The flushed session never received its first question
    let stored = h.store.get("rust-talk").unwrap().unwrap();
    assert_eq!(stored.messages.len(), 1);
    assert_eq!(stored.question_count, 0);
    assert_eq!(h.model.prompts_with_tag("SC ").len(), 2);
}

#[tokio::test]
async fn test_cancelled_turn_releases_busy_flag() {
    let h = Harness::new();
    let orc = h.orchestrator.clone();
    orc.activate("rust-talk").await.unwrap();
    let correct = h.correct_option();
    let before = orc.session().unwrap();

    h.model.arm();
    let pending = {
        let orc = orc.clone();
        tokio::spawn(async move { orc.select_option(correct).await })
    };
    h.model.entered.notified().await;
    assert!(orc.is_thinking());

    pending.abort();
    assert!(pending.await.unwrap_err().is_cancelled());

    assert!(!orc.is_thinking());
    assert_eq!(orc.session().unwrap(), before);
    assert_eq!(orc.select_option(correct).await.unwrap(), TurnOutcome::Applied);
    assert_eq!(orc.session().unwrap().question_count, 1);
}

#[tokio::test]
async fn test_busy_while_thinking() {
    let h = Harness::new();
    let orc = h.orchestrator.clone();
    orc.activate("rust-talk").await.unwrap();
    let correct = h.correct_option();

    h.model.arm();
    let pending = {
        let orc = orc.clone();
        tokio::spawn(async move { orc.select_option(correct).await })
    };
    h.model.entered.notified().await;

    assert!(matches!(orc.send("hello?").await, Err(RecapError::Busy)));

    h.model.release.notify_one();
    assert_eq!(pending.await.unwrap().unwrap(), TurnOutcome::Applied);
    assert_eq!(orc.session().unwrap().question_count, 1);
}

#[tokio::test]
async fn test_failed_embedding_recovers_on_retry() {
    let h = Harness::new();
    let orc = &h.orchestrator;
    h.embedder.fail_on(Some("borrowing lets you reference a value without owning it"));

    let activation = orc.activate("rust-talk").await.unwrap();
    assert!(matches!(activation, Activation::Recovered { .. }));

    let session = orc.session().unwrap();
    assert_eq!(session.messages.last().unwrap().content, ERROR_MESSAGE);
    assert_eq!(session.question_count, 0);
    assert!(!orc.is_initialized());
    assert!(orc.cache().get("rust-talk").is_none());
    assert!(h.model.prompts().is_empty());

    h.embedder.fail_on(None);
    h.embedder.reset_calls();

    assert_eq!(orc.refresh().await.unwrap(), Activation::Ready);
    assert_eq!(h.embedder.calls(), 5);
    assert!(orc.is_initialized());
    assert_eq!(orc.phase(), Some(QaPhase::SingleChoice));
}

#[tokio::test]
async fn test_failed_turn_leaves_counters() {
    let h = Harness::new();
    let orc = &h.orchestrator;
    orc.activate("rust-talk").await.unwrap();
    orc.select_option(h.correct_option()).await.unwrap();

    h.model.set_failing(true);
    let outcome = orc.send("my answer").await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Recovered { .. }));

    let session = orc.session().unwrap();
    assert_eq!(session.question_count, 1);
    let n = session.messages.len();
    assert_eq!(session.messages[n - 2].content, "my answer");
    assert_eq!(session.messages[n - 1].content, ERROR_MESSAGE);
    assert_eq!(orc.phase(), Some(QaPhase::ShortAnswer));

    h.model.set_failing(false);
    assert_eq!(orc.send("my answer").await.unwrap(), TurnOutcome::Applied);
    assert_eq!(orc.session().unwrap().question_count, 3);
}

#[tokio::test]
async fn test_index_built_once_per_video() {
    let h = Harness::new();
    h.transcripts.insert("other-talk", entries(&["one", "two"]));
    let orc = &h.orchestrator;

    orc.activate("rust-talk").await.unwrap();
    orc.activate("rust-talk").await.unwrap();
    assert_eq!(h.embedder.calls(), 5);

    orc.activate("other-talk").await.unwrap();
    orc.activate("rust-talk").await.unwrap();
    assert_eq!(h.embedder.calls(), 7);
    assert_eq!(orc.cache().len(), 2);
}

#[tokio::test]
async fn test_retrieval_ranks_matching_entry_first() {
    let h = Harness::new();
    let orc = &h.orchestrator;
    orc.activate("rust-talk").await.unwrap();

    let hits = orc
        .retriever()
        .search("rust-talk", "which runtime schedules async tasks")
        .await
        .unwrap();
    assert_eq!(hits[0].index, 3);
    assert!(hits.windows(2).all(|w| w[0].similarity >= w[1].similarity));
}

#[tokio::test]
async fn test_pending_transcript_ignores_input() {
    let h = Harness::new();
    let orc = &h.orchestrator;

    assert_eq!(orc.activate("not-yet").await.unwrap(), Activation::TranscriptPending);
    assert_eq!(orc.send("hello").await.unwrap(), TurnOutcome::Ignored);
    assert_eq!(orc.messages().len(), 1);

    h.transcripts.insert("not-yet", common::rust_talk());
    assert_eq!(orc.refresh().await.unwrap(), Activation::Ready);
    assert_eq!(orc.messages().len(), 2);
}

#[tokio::test]
async fn test_empty_transcript_asks_nothing() {
    let h = Harness::new();
    h.transcripts.insert("silent", entries(&["   "]));
    let orc = &h.orchestrator;

    assert_eq!(orc.activate("silent").await.unwrap(), Activation::EmptyTranscript);
    assert!(!orc.is_initialized());
    assert!(h.model.prompts().is_empty());
    assert_eq!(h.embedder.calls(), 0);
}

#[tokio::test]
async fn test_invalid_selections() {
    let h = Harness::new();
    let orc = &h.orchestrator;

    assert!(matches!(orc.select_option(0).await, Err(RecapError::NoActiveVideo)));

    orc.activate("rust-talk").await.unwrap();
    assert!(matches!(orc.select_option(9).await, Err(RecapError::InvalidInput(_))));
    assert!(matches!(orc.send("   ").await, Err(RecapError::InvalidInput(_))));

    orc.select_option(h.correct_option()).await.unwrap();
    // The answered question's options are no longer selectable
    assert!(matches!(
        orc.select_option(0).await,
        Err(RecapError::IllegalTransition { .. })
    ));
    assert_eq!(orc.session().unwrap().question_count, 1);
}

#[tokio::test]
async fn test_reset_starts_over() {
    let h = Harness::new();
    let orc = &h.orchestrator;
    orc.activate("rust-talk").await.unwrap();
    orc.select_option(h.correct_option()).await.unwrap();

    assert_eq!(orc.reset().unwrap(), 1);
    assert!(h.store.get("rust-talk").unwrap().is_none());
    assert_eq!(orc.messages().len(), 1);
    assert!(!orc.is_initialized());

    assert_eq!(orc.refresh().await.unwrap(), Activation::Ready);
    let session = orc.session().unwrap();
    assert_eq!(session.question_count, 0);
    assert_eq!(orc.phase(), Some(QaPhase::SingleChoice));
    assert_eq!(h.embedder.calls(), 5);
}

#[tokio::test]
async fn test_deactivate_flushes_session() {
    let h = Harness::new();
    let orc = &h.orchestrator;
    orc.activate("rust-talk").await.unwrap();

    orc.deactivate();
    assert!(orc.active_video().is_none());
    assert!(matches!(orc.send("hi").await, Err(RecapError::NoActiveVideo)));

    let stored = h.store.get("rust-talk").unwrap().unwrap();
    assert_eq!(stored.messages.len(), 2);
}
