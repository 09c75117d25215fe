mod helpers;

use std::time::Duration;

use draftkit_core::WizardError;
use draftkit_engine::{AutosaveStatus, WizardEvent};
use helpers::{new_session, wait_for_status, RecordingStore, QUIET_PERIOD};
use serde_json::json;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn test_edits_within_quiet_period_are_coalesced() {
    let store = RecordingStore::new();
    let session = new_session(store.clone());

    for name in ["A", "Ac", "Acme", "Acme Launch"] {
        session.set_field("name", name);
        sleep(Duration::from_millis(500)).await;
    }
    session.set_field("budget", 1500);
    assert_eq!(store.save_count(), 0);

    sleep(QUIET_PERIOD + Duration::from_millis(100)).await;

    let patches = store.patches();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].fields["name"], json!("Acme Launch"));
    assert_eq!(patches[0].fields["budget"], json!(1500));
    assert_eq!(session.autosave_status(), AutosaveStatus::Success);
    assert!(!session.is_dirty());
}

#[tokio::test(start_paused = true)]
async fn test_single_edit_is_merged_into_current_step() {
    let store = RecordingStore::new();
    let session = new_session(store.clone());

    session.set_field("name", "Acme Launch");
    sleep(QUIET_PERIOD * 2).await;

    assert_eq!(store.save_count(), 1);
    let draft_id = session.draft_id().expect("draft created by first save");
    let stored = store.stored(&draft_id).await;
    assert_eq!(stored.step_fields(1)["name"], json!("Acme Launch"));
    assert_eq!(stored.current_step, 1);
    assert!(stored.step_completion.is_empty());
    assert!(stored.last_saved_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_timer_during_in_flight_save_queues_one_follow_up() {
    let store = RecordingStore::new();
    store.set_delay(Duration::from_secs(5));
    let session = new_session(store.clone());

    session.set_field("name", "first");
    sleep(QUIET_PERIOD + Duration::from_millis(500)).await;
    assert_eq!(store.save_count(), 1);

    // Both quiet periods expire while the first save is still running
    session.set_field("name", "second");
    sleep(QUIET_PERIOD + Duration::from_millis(100)).await;
    session.set_field("name", "third");
    sleep(Duration::from_secs(20)).await;

    let patches = store.patches();
    assert_eq!(patches.len(), 2);
    assert_eq!(store.max_concurrent(), 1);
    assert!(patches[0].sequence < patches[1].sequence);
    assert_eq!(patches[1].fields["name"], json!("third"));

    let stored = store.stored(&session.draft_id().unwrap()).await;
    assert_eq!(stored.step_fields(1)["name"], json!("third"));
    assert!(!session.is_dirty());
}

#[tokio::test(start_paused = true)]
async fn test_saves_reach_store_in_initiation_order() {
    let store = RecordingStore::new();
    store.set_delay(Duration::from_secs(1));
    let session = new_session(store.clone());

    session.set_field("name", "one");
    let first = session.save_now();
    let second = async {
        tokio::task::yield_now().await;
        session.set_field("name", "two");
        session.save_now().await
    };
    let (first, second) = tokio::join!(first, second);

    let (first, second) = (first.unwrap(), second.unwrap());
    assert!(first.sequence < second.sequence);
    assert_eq!(first.draft_id, second.draft_id);
    assert_eq!(store.max_concurrent(), 1);

    let stored = store.stored(&second.draft_id).await;
    assert_eq!(stored.step_fields(1)["name"], json!("two"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_save_keeps_form_dirty_and_recovers() {
    let store = RecordingStore::new();
    store.fail_next(1);
    let session = new_session(store.clone());
    let mut events = session.subscribe();
    let mut status = session.subscribe_autosave_status();

    session.set_field("name", "Acme");
    wait_for_status(&mut status, AutosaveStatus::Error).await;
    assert!(session.is_dirty());
    assert!(session.draft_id().is_none());

    let mut failure = None;
    while let Ok(event) = events.try_recv() {
        if let WizardEvent::SaveFailed { blocking, .. } = event {
            failure = Some(blocking);
        }
    }
    assert_eq!(failure, Some(false));

    session.set_field("name", "Acme Launch");
    wait_for_status(&mut status, AutosaveStatus::Success).await;
    assert!(!session.is_dirty());
    assert_eq!(store.save_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_autosave_only_saves_on_request() {
    let store = RecordingStore::new();
    let session = new_session(store.clone());

    session.set_autosave_enabled(false);
    session.set_field("name", "Acme");
    sleep(QUIET_PERIOD * 3).await;
    assert_eq!(store.save_count(), 0);
    assert!(session.is_dirty());

    let outcome = session.save_now().await.unwrap();
    assert_eq!(Some(outcome.draft_id), session.draft_id());
    assert_eq!(session.current_step(), 1);
    assert!(!session.is_dirty());

    session.set_autosave_enabled(true);
    session.set_field("name", "Acme Launch");
    sleep(QUIET_PERIOD * 2).await;
    assert_eq!(store.save_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_cancels_timer_but_not_in_flight_save() {
    let store = RecordingStore::new();
    store.set_delay(Duration::from_secs(5));
    let session = new_session(store.clone());

    session.set_field("name", "first");
    sleep(QUIET_PERIOD + Duration::from_millis(500)).await;
    session.set_field("name", "second");

    session.teardown();
    sleep(Duration::from_secs(30)).await;

    assert_eq!(store.save_count(), 1);
    assert_eq!(store.completed(), 1);
    assert!(matches!(
        session.save_now().await,
        Err(WizardError::SessionClosed)
    ));
}
