//! Appointment conflict detection against a live database: overlapping vs.
//! back-to-back intervals, self-exclusion on reschedule, and cancelled
//! appointments dropping out of conflict checks.

mod common;

use pazpaz::appointments::AppointmentRepository;
use pazpaz::ids::ClientId;
use time::macros::datetime;

#[tokio::test]
async fn back_to_back_is_clear_but_overlap_conflicts_then_clears_on_cancel() {
    let Some(pool) = common::setup_db().await else { return };
    let workspace = common::WorkspaceFixture::default();
    common::insert_workspace(&pool, &workspace).await;
    let client_id = ClientId::new();

    let repo = AppointmentRepository::new(pool.clone());
    let a_start = datetime!(2025-01-10 10:00 UTC);
    let a_end = datetime!(2025-01-10 11:00 UTC);
    let appointment = common::insert_appointment(&pool, workspace.id, client_id, a_start, a_end, "scheduled", None).await;

    // Back-to-back: 11:00-12:00 does not conflict with 10:00-11:00.
    let conflicts = repo
        .find_conflicts(workspace.id, datetime!(2025-01-10 11:00 UTC), datetime!(2025-01-10 12:00 UTC), None)
        .await
        .unwrap();
    assert!(conflicts.is_empty());

    // Overlapping: 10:30-11:30 conflicts with A.
    let conflicts = repo
        .find_conflicts(workspace.id, datetime!(2025-01-10 10:30 UTC), datetime!(2025-01-10 11:30 UTC), None)
        .await
        .unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].id, appointment);

    sqlx::query("UPDATE appointments SET status = 'cancelled' WHERE id = $1")
        .bind(appointment.0)
        .execute(&pool)
        .await
        .unwrap();

    let conflicts = repo
        .find_conflicts(workspace.id, datetime!(2025-01-10 10:30 UTC), datetime!(2025-01-10 11:30 UTC), None)
        .await
        .unwrap();
    assert!(conflicts.is_empty());
}

#[tokio::test]
async fn conflict_check_excludes_the_appointment_being_updated() {
    let Some(pool) = common::setup_db().await else { return };
    let workspace = common::WorkspaceFixture::default();
    common::insert_workspace(&pool, &workspace).await;
    let client_id = ClientId::new();

    let repo = AppointmentRepository::new(pool.clone());
    let start = datetime!(2025-02-01 09:00 UTC);
    let end = datetime!(2025-02-01 10:00 UTC);
    let appointment = common::insert_appointment(&pool, workspace.id, client_id, start, end, "scheduled", None).await;

    // Rescheduling the same appointment to an overlapping slot must not
    // conflict against itself.
    let conflicts = repo.find_conflicts(workspace.id, start, end, Some(appointment)).await.unwrap();
    assert!(conflicts.is_empty());

    // A different appointment at the same slot still conflicts.
    let conflicts = repo.find_conflicts(workspace.id, start, end, None).await.unwrap();
    assert_eq!(conflicts.len(), 1);
}
