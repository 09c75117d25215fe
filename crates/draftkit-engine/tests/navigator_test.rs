mod helpers;

use std::sync::Arc;
use std::time::Duration;

use draftkit_core::models::{campaign_wizard_steps, DraftId, ASSETS_FIELD};
use draftkit_core::{AssetStatus, AssetType, DraftAsset, ErrorMetadata, WizardError};
use draftkit_engine::{NavigatorState, WizardSession};
use draftkit_storage::MemoryAssetService;
use draftkit_upload::AssetSink;
use helpers::{
    draft_at, new_session, resume_session, test_config, valid_overview, RecordingStore,
    QUIET_PERIOD,
};
use serde_json::json;
use tokio::time::sleep;
use tokio_test::assert_ok;

fn uploaded(id: &str) -> DraftAsset {
    DraftAsset {
        id: id.to_string(),
        url: format!("https://cdn.test/f/{}", id),
        file_name: format!("{}.png", id),
        file_size: 64,
        asset_type: AssetType::Image,
        temporary: true,
        status: AssetStatus::Ready,
    }
}

fn fill_overview(session: &WizardSession) {
    for (name, value) in valid_overview() {
        session.set_field(name, value);
    }
}

#[tokio::test(start_paused = true)]
async fn test_invalid_step_blocks_forward_without_saving() {
    let store = RecordingStore::new();
    let session =
        resume_session(store.clone(), Arc::new(MemoryAssetService::new()), draft_at("d1", 2)).await;
    assert_eq!(session.current_step(), 2);

    session.set_autosave_enabled(false);
    session.set_field("primaryKPI", "reach");

    let err = session.forward().await.unwrap_err();
    match &err {
        WizardError::Validation(errors) => assert!(errors.contains_key("mainMessage")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(session.navigator_state(), NavigatorState::Error);
    assert_eq!(session.current_step(), 2);
    assert!(session.errors().contains_key("mainMessage"));

    sleep(QUIET_PERIOD * 3).await;
    assert_eq!(store.save_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_forward_replaces_pending_autosave_with_one_save() {
    let store = RecordingStore::new();
    let session = new_session(store.clone());

    fill_overview(&session);
    sleep(QUIET_PERIOD / 4).await;
    assert_eq!(store.save_count(), 0);

    assert_eq!(assert_ok!(session.forward().await), 2);
    sleep(QUIET_PERIOD * 3).await;

    let patches = store.patches();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].step, 1);
    assert_eq!(patches[0].current_step, 2);
    assert_eq!(patches[0].completed_step, Some(1));

    assert_eq!(session.current_step(), 2);
    assert!(!session.is_dirty());
    assert_eq!(session.navigator_state(), NavigatorState::Idle);

    let stored = store.stored(&session.draft_id().unwrap()).await;
    assert_eq!(stored.current_step, 2);
    assert!(stored.is_step_complete(1));
}

#[tokio::test(start_paused = true)]
async fn test_jump_is_limited_to_one_past_completed_steps() {
    let store = RecordingStore::new();
    let session = new_session(store.clone());

    assert!(matches!(
        session.jump(3).await,
        Err(WizardError::JumpNotAllowed {
            target: 3,
            max_allowed: 1
        })
    ));

    fill_overview(&session);
    assert_eq!(session.forward().await.unwrap(), 2);
    assert!(matches!(
        session.jump(3).await,
        Err(WizardError::JumpNotAllowed {
            target: 3,
            max_allowed: 2
        })
    ));

    // Backward jumps skip validation; the step is reloaded from the draft
    assert_eq!(session.jump(1).await.unwrap(), 1);
    assert_eq!(session.value("name"), Some(json!("Acme Launch")));
    assert_eq!(session.jump(2).await.unwrap(), 2);

    assert!(matches!(
        session.jump(9).await,
        Err(WizardError::InvalidTransition { to: 9, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_back_saves_without_validating() {
    let store = RecordingStore::new();
    let session = new_session(store.clone());

    assert!(matches!(
        session.back().await,
        Err(WizardError::InvalidTransition { from: 1, to: 0 })
    ));

    fill_overview(&session);
    session.forward().await.unwrap();
    session.set_field("mainMessage", "");

    assert_eq!(session.back().await.unwrap(), 1);

    let last = store.patches().pop().unwrap();
    assert_eq!(last.step, 2);
    assert_eq!(last.current_step, 1);
    assert_eq!(last.completed_step, None);
    assert_eq!(last.fields["mainMessage"], json!(""));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_navigation_is_rejected() {
    let store = RecordingStore::new();
    store.set_delay(Duration::from_secs(1));
    let session = new_session(store.clone());
    fill_overview(&session);

    let (first, second) = tokio::join!(session.forward(), session.forward());

    assert_eq!(first.unwrap(), 2);
    assert!(matches!(second, Err(WizardError::Busy)));
    assert_eq!(session.current_step(), 2);
    assert_eq!(store.save_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_save_keeps_user_on_step() {
    let store = RecordingStore::new();
    store.fail_next(1);
    let session = new_session(store.clone());
    fill_overview(&session);

    let err = session.forward().await.unwrap_err();
    assert!(matches!(err, WizardError::SaveFailure { .. }));
    assert!(err.is_recoverable());
    assert_eq!(session.current_step(), 1);
    assert_eq!(session.navigator_state(), NavigatorState::Error);
    assert!(session.is_dirty());

    assert_eq!(session.forward().await.unwrap(), 2);
    assert_eq!(session.navigator_state(), NavigatorState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_last_step_and_progress() {
    let store = RecordingStore::new();
    let session =
        resume_session(store.clone(), Arc::new(MemoryAssetService::new()), draft_at("d5", 5)).await;
    let navigator = session.navigator();

    assert!(navigator.is_last_step());
    assert!(!navigator.is_first_step());
    assert_eq!(navigator.progress_percent(), 100);
    assert_eq!(navigator.current_definition().unwrap().title, "Review");
    assert!(matches!(
        session.forward().await,
        Err(WizardError::InvalidTransition { from: 5, to: 6 })
    ));

    assert_eq!(session.jump(2).await.unwrap(), 2);
    assert_eq!(session.navigator().progress_percent(), 40);
}

#[tokio::test(start_paused = true)]
async fn test_resume_restores_position_and_values() {
    let store = RecordingStore::new();
    let session =
        resume_session(store.clone(), Arc::new(MemoryAssetService::new()), draft_at("d3", 3)).await;

    assert_eq!(session.draft_id(), Some(DraftId::from("d3")));
    assert_eq!(session.current_step(), 3);
    assert!(!session.is_dirty());
    assert_eq!(session.navigator().max_reachable_step(), 3);

    assert_eq!(session.jump(1).await.unwrap(), 1);
    assert_eq!(session.value("businessGoal"), Some(json!("awareness")));
    assert_eq!(store.patches()[0].current_step, 1);
}

#[tokio::test]
async fn test_resume_missing_draft_is_fatal() {
    let store = RecordingStore::new();
    let result = WizardSession::resume(
        &test_config(),
        campaign_wizard_steps(),
        store,
        Arc::new(MemoryAssetService::new()),
        &DraftId::from("gone"),
    )
    .await;

    let err = result.err().expect("missing draft must not resume");
    assert!(matches!(err, WizardError::NotFound(_)));
    assert!(err.is_fatal());
}

#[tokio::test(start_paused = true)]
async fn test_changes_during_navigation_save_are_saved_before_leaving() {
    let store = RecordingStore::new();
    let session =
        resume_session(store.clone(), Arc::new(MemoryAssetService::new()), draft_at("d4", 4)).await;
    store.set_delay(Duration::from_millis(500));

    let late_changes = async {
        sleep(Duration::from_millis(100)).await;
        session.form().append_asset(4, uploaded("late"));
        session.set_field("caption", "late edit");
    };
    let (moved, _) = tokio::join!(session.back(), late_changes);

    assert_eq!(moved.unwrap(), 3);
    assert_eq!(session.current_step(), 3);
    assert_eq!(session.navigator_state(), NavigatorState::Idle);
    assert_eq!(store.save_count(), 2);

    let stored = store.stored(&DraftId::from("d4")).await;
    let fields = stored.step_fields(4);
    assert_eq!(fields[ASSETS_FIELD][0]["id"], json!("late"));
    assert_eq!(fields["caption"], json!("late edit"));
    assert_eq!(stored.current_step, 3);

    let mirror = session.draft().unwrap().step_fields(4);
    assert_eq!(mirror[ASSETS_FIELD].as_array().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_edit_after_validation_that_breaks_step_blocks_forward() {
    let store = RecordingStore::new();
    store.set_delay(Duration::from_secs(5));
    let session = new_session(store.clone());

    fill_overview(&session);
    sleep(QUIET_PERIOD + Duration::from_millis(100)).await;
    assert_eq!(store.save_count(), 1);

    // Forward validates right away but its save waits behind the autosave
    let edit = async {
        sleep(Duration::from_secs(1)).await;
        session.set_field("name", "");
    };
    let (moved, _) = tokio::join!(session.forward(), edit);

    match moved {
        Err(WizardError::Validation(errors)) => assert!(errors.contains_key("name")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(session.current_step(), 1);
    assert_eq!(session.navigator_state(), NavigatorState::Error);

    let stored = store.stored(&session.draft_id().unwrap()).await;
    assert_eq!(stored.current_step, 1);
    assert!(!stored.is_step_complete(1));
    assert_eq!(stored.step_fields(1)["name"], json!(""));
    assert_eq!(store.max_concurrent(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_edit_after_validation_is_completed_before_moving_on() {
    let store = RecordingStore::new();
    store.set_delay(Duration::from_secs(5));
    let session = new_session(store.clone());

    fill_overview(&session);
    sleep(QUIET_PERIOD + Duration::from_millis(100)).await;

    let edit = async {
        sleep(Duration::from_secs(1)).await;
        session.set_field("name", "Acme Relaunch");
    };
    let (moved, _) = tokio::join!(session.forward(), edit);

    assert_eq!(moved.unwrap(), 2);
    let last = store.patches().pop().unwrap();
    assert_eq!(last.completed_step, Some(1));
    assert_eq!(last.fields["name"], json!("Acme Relaunch"));

    let stored = store.stored(&session.draft_id().unwrap()).await;
    assert!(stored.is_step_complete(1));
    assert_eq!(stored.current_step, 2);
    assert_eq!(session.navigator().max_reachable_step(), 2);
}
