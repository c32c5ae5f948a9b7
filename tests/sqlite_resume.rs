//! Sessions and transcripts survive reopening the SQLite database.

mod common;

use common::{rust_talk, test_prompts, test_settings, FakeEmbedder, ScriptedModel};
use recap::qa::{Activation, QaComponents, QaOrchestrator, QaPhase};
use recap::store::{SessionStore, SqliteStore};
use std::sync::Arc;
use tempfile::TempDir;

fn orchestrator(store: Arc<SqliteStore>) -> QaOrchestrator {
    let components = QaComponents {
        model: Arc::new(ScriptedModel::default()),
        embedder: Arc::new(FakeEmbedder::default()),
        transcripts: store.clone(),
        store,
    };
    QaOrchestrator::with_components(&test_settings(), test_prompts(), components)
}

#[tokio::test]
async fn test_dialogue_resumes_after_reopen() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("recap.db");

    let progressed = {
        let store = Arc::new(SqliteStore::new(&db_path).unwrap());
        store.store_transcript("rust-talk", "Rust talk", &rust_talk()).unwrap();

        let orc = orchestrator(store);
        assert_eq!(orc.activate("rust-talk").await.unwrap(), Activation::Ready);

        let session = orc.session().unwrap();
        let correct = session
            .open_options()
            .unwrap()
            .iter()
            .position(|o| o.is_correct)
            .unwrap();
        orc.select_option(correct).await.unwrap();
        orc.send("something about borrowing").await.unwrap();

        orc.session().unwrap()
    };
    assert_eq!(progressed.question_count, 3);

    let store = Arc::new(SqliteStore::new(&db_path).unwrap());
    assert_eq!(store.get("rust-talk").unwrap().as_ref(), Some(&progressed));
    assert_eq!(store.list_transcripts().unwrap().len(), 1);

    let orc = orchestrator(store);
    assert_eq!(orc.activate("rust-talk").await.unwrap(), Activation::Ready);
    assert_eq!(orc.session().unwrap(), progressed);
    assert_eq!(orc.phase(), Some(QaPhase::OpenRetrieval));
}

#[tokio::test]
async fn test_unknown_video_is_pending() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::new(&temp.path().join("recap.db")).unwrap());

    let orc = orchestrator(store.clone());
    assert_eq!(orc.activate("missing").await.unwrap(), Activation::TranscriptPending);

    orc.deactivate();
    // The untouched session was flushed and can be cleared again
    assert_eq!(store.clear("missing").unwrap(), 1);
    assert_eq!(store.clear("missing").unwrap(), 0);
}
