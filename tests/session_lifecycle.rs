//! End-to-end session lifecycle: create -> finalize -> amend -> soft-delete
//! -> restore, exercised through `SessionService` against a live database
//! (skips cleanly without `TEST_DATABASE_URL`, same idiom as
//! `encryption_roundtrip.rs`).

mod common;

use pazpaz::appointments::AppointmentRepository;
use pazpaz::audit::AuditSink;
use pazpaz::ids::{ClientId, UserId};
use pazpaz::kv::memory_store::InMemoryFastStore;
use pazpaz::ratelimit::RateLimiter;
use pazpaz::sessions::version::SessionVersionRepository;
use pazpaz::sessions::{SessionRepository, SessionService, SoapPatch};
use std::sync::Arc;

fn service(pool: sqlx::PgPool) -> SessionService {
    SessionService::new(
        pool.clone(),
        SessionRepository::new(common::test_keyring()),
        SessionVersionRepository::new(pool.clone()),
        AppointmentRepository::new(pool.clone()),
        AuditSink::new(pool),
        RateLimiter::new(Arc::new(InMemoryFastStore::new())),
    )
}

#[tokio::test]
async fn finalize_then_amend_snapshots_previous_state_and_bumps_amendment_count() {
    let Some(pool) = common::setup_db().await else { return };
    let workspace = common::WorkspaceFixture::default();
    common::insert_workspace(&pool, &workspace).await;
    let client_id = ClientId::new();
    let actor = UserId::new();

    let svc = service(pool.clone());

    let initial = SoapPatch { subjective: Some("pain".to_string()), ..Default::default() };
    let session = svc.create(workspace.id, client_id, None, initial, actor).await.unwrap();
    assert_eq!(session.version, 1);

    let finalized = svc.finalize(workspace.id, session.id, actor, session.version).await.unwrap();
    assert!(finalized.finalized_at.is_some());

    let versions = SessionVersionRepository::new(pool.clone());
    assert_eq!(versions.count_for(session.id).await.unwrap(), 1);

    let patch = SoapPatch { subjective: Some("severe pain".to_string()), ..Default::default() };
    let amended = svc.amend(workspace.id, session.id, actor, patch, finalized.version).await.unwrap();

    assert_eq!(amended.subjective, "severe pain");
    assert_eq!(amended.amendment_count, 1);
    assert!(amended.amended_at.is_some());
    // v1 (finalize snapshot) + v2 (pre-amend snapshot, still "pain").
    assert_eq!(versions.count_for(session.id).await.unwrap(), 2);
}

#[tokio::test]
async fn unfinalize_clears_versions_and_next_finalize_restarts_at_v1() {
    let Some(pool) = common::setup_db().await else { return };
    let workspace = common::WorkspaceFixture::default();
    common::insert_workspace(&pool, &workspace).await;
    let client_id = ClientId::new();
    let actor = UserId::new();

    let svc = service(pool.clone());
    let session = svc.create(workspace.id, client_id, None, SoapPatch::default(), actor).await.unwrap();
    let finalized = svc.finalize(workspace.id, session.id, actor, session.version).await.unwrap();

    let draft = svc.unfinalize(workspace.id, session.id, finalized.version).await.unwrap();
    assert!(draft.finalized_at.is_none());
    assert_eq!(draft.amendment_count, 0);

    let versions = SessionVersionRepository::new(pool.clone());
    assert_eq!(versions.count_for(session.id).await.unwrap(), 0);

    let refinalized = svc.finalize(workspace.id, session.id, actor, draft.version).await.unwrap();
    assert!(refinalized.finalized_at.is_some());
    assert_eq!(versions.count_for(session.id).await.unwrap(), 1);
}

#[tokio::test]
async fn soft_delete_then_restore_round_trips_and_expires_after_grace_period() {
    let Some(pool) = common::setup_db().await else { return };
    let workspace = common::WorkspaceFixture::default();
    common::insert_workspace(&pool, &workspace).await;
    let client_id = ClientId::new();
    let actor = UserId::new();

    let svc = service(pool.clone());
    let session = svc.create(workspace.id, client_id, None, SoapPatch::default(), actor).await.unwrap();
    let finalized = svc.finalize(workspace.id, session.id, actor, session.version).await.unwrap();

    let deleted = svc.soft_delete(workspace.id, session.id, actor, "duplicate".to_string(), finalized.version).await.unwrap();
    assert!(deleted.deleted_at.is_some());
    let expected_expiry = pazpaz::time_util::add_days(deleted.deleted_at.unwrap(), 30);
    assert_eq!(deleted.permanent_delete_after, Some(expected_expiry));

    let restored = svc.restore(workspace.id, session.id, deleted.version).await.unwrap();
    assert!(restored.deleted_at.is_none());
    assert!(restored.permanent_delete_after.is_none());
    // finalized_at survives the delete/restore round trip.
    assert!(restored.finalized_at.is_some());
}

#[tokio::test]
async fn version_conflict_is_rejected_on_stale_expected_version() {
    let Some(pool) = common::setup_db().await else { return };
    let workspace = common::WorkspaceFixture::default();
    common::insert_workspace(&pool, &workspace).await;
    let client_id = ClientId::new();
    let actor = UserId::new();

    let svc = service(pool.clone());
    let session = svc.create(workspace.id, client_id, None, SoapPatch::default(), actor).await.unwrap();

    let stale_version = session.version;
    let patch = SoapPatch { objective: Some("first write".to_string()), ..Default::default() };
    svc.draft_update(workspace.id, session.id, actor, patch, stale_version).await.unwrap();

    // Same stale version again: the row has already moved on.
    let patch2 = SoapPatch { objective: Some("second write".to_string()), ..Default::default() };
    let result = svc.draft_update(workspace.id, session.id, actor, patch2, stale_version).await;
    assert!(matches!(result, Err(pazpaz::error::Error::VersionConflict { .. })));
}
