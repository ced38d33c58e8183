//! Session (SOAP clinical note) lifecycle engine. This is the most stateful component in the core: every mutating
//! operation goes through optimistic concurrency (the `version` counter,
//! ordering contract 1) and, past finalization, every edit
//! snapshots the pre-edit payload before applying the new one.

pub mod version;

use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use crate::appointments::AppointmentRepository;
use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::crypto::KeyRing;
use crate::db::scope::found_or_404;
use crate::error::{Error, Result};
use crate::ids::{AppointmentId, ClientId, SessionId, UserId, WorkspaceId};
use crate::ratelimit::{limits, OnStoreError, RateLimiter};
use crate::sessions::version::{SessionVersionRepository, SoapSnapshot};

#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub workspace_id: WorkspaceId,
    pub client_id: ClientId,
    pub appointment_id: Option<AppointmentId>,
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
    pub is_draft: bool,
    pub version: i32,
    pub created_at: OffsetDateTime,
    pub finalized_at: Option<OffsetDateTime>,
    pub amended_at: Option<OffsetDateTime>,
    pub amendment_count: i32,
    pub draft_last_saved_at: Option<OffsetDateTime>,
    pub deleted_at: Option<OffsetDateTime>,
    pub permanent_delete_after: Option<OffsetDateTime>,
    pub deleted_by_user_id: Option<UserId>,
    pub deleted_reason: Option<String>,
}

impl Session {
    /// Amended sessions cannot be deleted by a cascading appointment
    /// deletion; the direct
    /// soft-delete route has no such restriction.
    pub fn cascade_delete_allowed(&self) -> bool {
        self.amendment_count == 0
    }

    fn any_soap_field_non_empty(subjective: &str, objective: &str, assessment: &str, plan: &str) -> bool {
        [subjective, objective, assessment, plan].iter().any(|f| !f.trim().is_empty())
    }
}

/// A sparse patch: only fields present here are changed. Distinguishing
/// "absent" from "set to empty" is why this is a struct of `Option<String>`
/// rather than a `Session` with defaults.
#[derive(Debug, Default, Clone)]
pub struct SoapPatch {
    pub subjective: Option<String>,
    pub objective: Option<String>,
    pub assessment: Option<String>,
    pub plan: Option<String>,
}

impl SoapPatch {
    fn sections_changed(&self) -> Vec<&'static str> {
        let mut sections = Vec::new();
        if self.subjective.is_some() {
            sections.push("subjective");
        }
        if self.objective.is_some() {
            sections.push("objective");
        }
        if self.assessment.is_some() {
            sections.push("assessment");
        }
        if self.plan.is_some() {
            sections.push("plan");
        }
        sections
    }

    fn apply(&self, session: &mut Session) {
        if let Some(v) = &self.subjective {
            session.subjective = v.clone();
        }
        if let Some(v) = &self.objective {
            session.objective = v.clone();
        }
        if let Some(v) = &self.assessment {
            session.assessment = v.clone();
        }
        if let Some(v) = &self.plan {
            session.plan = v.clone();
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: uuid::Uuid,
    workspace_id: uuid::Uuid,
    client_id: uuid::Uuid,
    appointment_id: Option<uuid::Uuid>,
    subjective_enc: String,
    objective_enc: String,
    assessment_enc: String,
    plan_enc: String,
    is_draft: bool,
    version: i32,
    created_at: OffsetDateTime,
    finalized_at: Option<OffsetDateTime>,
    amended_at: Option<OffsetDateTime>,
    amendment_count: i32,
    draft_last_saved_at: Option<OffsetDateTime>,
    deleted_at: Option<OffsetDateTime>,
    permanent_delete_after: Option<OffsetDateTime>,
    deleted_by_user_id: Option<uuid::Uuid>,
    deleted_reason: Option<String>,
}

pub struct SessionRepository {
    keyring: KeyRing,
}

impl SessionRepository {
    pub fn new(keyring: KeyRing) -> Self {
        Self { keyring }
    }

    fn aad(session_id: SessionId, field: &str) -> Vec<u8> {
        format!("session:{session_id}:{field}").into_bytes()
    }

    async fn hydrate(&self, row: SessionRow) -> Result<Session> {
        let id = SessionId(row.id);
        Ok(Session {
            id,
            workspace_id: WorkspaceId(row.workspace_id),
            client_id: ClientId(row.client_id),
            appointment_id: row.appointment_id.map(AppointmentId),
            subjective: crate::crypto::decrypt_field(&self.keyring, &row.subjective_enc, &Self::aad(id, "subjective")).await?,
            objective: crate::crypto::decrypt_field(&self.keyring, &row.objective_enc, &Self::aad(id, "objective")).await?,
            assessment: crate::crypto::decrypt_field(&self.keyring, &row.assessment_enc, &Self::aad(id, "assessment")).await?,
            plan: crate::crypto::decrypt_field(&self.keyring, &row.plan_enc, &Self::aad(id, "plan")).await?,
            is_draft: row.is_draft,
            version: row.version,
            created_at: row.created_at,
            finalized_at: row.finalized_at,
            amended_at: row.amended_at,
            amendment_count: row.amendment_count,
            draft_last_saved_at: row.draft_last_saved_at,
            deleted_at: row.deleted_at,
            permanent_delete_after: row.permanent_delete_after,
            deleted_by_user_id: row.deleted_by_user_id.map(UserId),
            deleted_reason: row.deleted_reason,
        })
    }

    pub async fn find<'c, E>(&self, executor: E, workspace_id: WorkspaceId, id: SessionId) -> Result<Session>
    where
        E: PgExecutor<'c>,
    {
        let row: Option<SessionRow> = sqlx::query_as("SELECT * FROM sessions WHERE id = $1 AND workspace_id = $2")
            .bind(id.0)
            .bind(workspace_id.0)
            .fetch_optional(executor)
            .await?;
        let row = found_or_404(row, "session")?;
        self.hydrate(row).await
    }

    /// Batch fetch for hydrating RAG retrieval results.
    pub async fn find_many<'c, E>(&self, executor: E, workspace_id: WorkspaceId, ids: &[SessionId]) -> Result<Vec<Session>>
    where
        E: PgExecutor<'c>,
    {
        let uuids: Vec<uuid::Uuid> = ids.iter().map(|id| id.0).collect();
        let rows: Vec<SessionRow> = sqlx::query_as("SELECT * FROM sessions WHERE workspace_id = $1 AND id = ANY($2)")
            .bind(workspace_id.0)
            .bind(uuids)
            .fetch_all(executor)
            .await?;
        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(self.hydrate(row).await?);
        }
        Ok(sessions)
    }

    /// Locks the row for the duration of the enclosing transaction so a
    /// concurrent amendment can't interleave between the version check and
    /// the write.
    pub async fn find_for_update(&self, tx: &mut Transaction<'_, Postgres>, workspace_id: WorkspaceId, id: SessionId) -> Result<Session> {
        let row: Option<SessionRow> =
            sqlx::query_as("SELECT * FROM sessions WHERE id = $1 AND workspace_id = $2 FOR UPDATE")
                .bind(id.0)
                .bind(workspace_id.0)
                .fetch_optional(&mut **tx)
                .await?;
        let row = found_or_404(row, "session")?;
        self.hydrate(row).await
    }

    pub async fn insert(&self, tx: &mut Transaction<'_, Postgres>, session: &Session) -> Result<()> {
        let id = session.id;
        sqlx::query(
            "INSERT INTO sessions \
             (id, workspace_id, client_id, appointment_id, subjective_enc, objective_enc, assessment_enc, plan_enc, \
              is_draft, version, created_at, finalized_at, amended_at, amendment_count, draft_last_saved_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)",
        )
        .bind(id.0)
        .bind(session.workspace_id.0)
        .bind(session.client_id.0)
        .bind(session.appointment_id.map(|a| a.0))
        .bind(crate::crypto::encrypt_field(&self.keyring, &session.subjective, &Self::aad(id, "subjective")).await?)
        .bind(crate::crypto::encrypt_field(&self.keyring, &session.objective, &Self::aad(id, "objective")).await?)
        .bind(crate::crypto::encrypt_field(&self.keyring, &session.assessment, &Self::aad(id, "assessment")).await?)
        .bind(crate::crypto::encrypt_field(&self.keyring, &session.plan, &Self::aad(id, "plan")).await?)
        .bind(session.is_draft)
        .bind(session.version)
        .bind(session.created_at)
        .bind(session.finalized_at)
        .bind(session.amended_at)
        .bind(session.amendment_count)
        .bind(session.draft_last_saved_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Writes every mutable column plus a `version` compare-and-set
    /// predicate (`WHERE version = $expected`). Zero rows affected means a
    /// concurrent writer won the race.
    pub async fn save(&self, tx: &mut Transaction<'_, Postgres>, session: &Session, expected_version: i32) -> Result<()> {
        let id = session.id;
        let result = sqlx::query(
            "UPDATE sessions SET \
               subjective_enc = $1, objective_enc = $2, assessment_enc = $3, plan_enc = $4, \
               is_draft = $5, version = $6, finalized_at = $7, amended_at = $8, amendment_count = $9, \
               draft_last_saved_at = $10, deleted_at = $11, permanent_delete_after = $12, \
               deleted_by_user_id = $13, deleted_reason = $14 \
             WHERE id = $15 AND workspace_id = $16 AND version = $17",
        )
        .bind(crate::crypto::encrypt_field(&self.keyring, &session.subjective, &Self::aad(id, "subjective")).await?)
        .bind(crate::crypto::encrypt_field(&self.keyring, &session.objective, &Self::aad(id, "objective")).await?)
        .bind(crate::crypto::encrypt_field(&self.keyring, &session.assessment, &Self::aad(id, "assessment")).await?)
        .bind(crate::crypto::encrypt_field(&self.keyring, &session.plan, &Self::aad(id, "plan")).await?)
        .bind(session.is_draft)
        .bind(session.version)
        .bind(session.finalized_at)
        .bind(session.amended_at)
        .bind(session.amendment_count)
        .bind(session.draft_last_saved_at)
        .bind(session.deleted_at)
        .bind(session.permanent_delete_after)
        .bind(session.deleted_by_user_id.map(|u| u.0))
        .bind(&session.deleted_reason)
        .bind(id.0)
        .bind(session.workspace_id.0)
        .bind(expected_version)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::VersionConflict { expected: expected_version, actual: session.version });
        }
        Ok(())
    }

    pub async fn permanent_delete(&self, tx: &mut Transaction<'_, Postgres>, workspace_id: WorkspaceId, id: SessionId) -> Result<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1 AND workspace_id = $2 AND deleted_at IS NOT NULL")
            .bind(id.0)
            .bind(workspace_id.0)
            .execute(&mut **tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("session"));
        }
        Ok(())
    }

    /// Most recent non-deleted sessions in the workspace, optionally scoped
    /// to one client, newest first. Used both
    /// for plain pagination and, with `limit` pinned to 1000, as the
    /// candidate set for the decrypt-and-scan search path.
    pub async fn list<'c, E>(
        &self,
        executor: E,
        workspace_id: WorkspaceId,
        client_id: Option<ClientId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Session>>
    where
        E: PgExecutor<'c>,
    {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT * FROM sessions \
             WHERE workspace_id = $1 AND ($2::uuid IS NULL OR client_id = $2) AND deleted_at IS NULL \
             ORDER BY created_at DESC \
             LIMIT $3 OFFSET $4",
        )
        .bind(workspace_id.0)
        .bind(client_id.map(|c| c.0))
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;
        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(self.hydrate(row).await?);
        }
        Ok(sessions)
    }

    /// Sessions past their grace period, for the purge worker.
    pub async fn find_expired_for_purge<'c, E>(&self, executor: E, now: OffsetDateTime) -> Result<Vec<Session>>
    where
        E: PgExecutor<'c>,
    {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT * FROM sessions WHERE deleted_at IS NOT NULL AND permanent_delete_after <= $1",
        )
        .bind(now)
        .fetch_all(executor)
        .await?;
        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(self.hydrate(row).await?);
        }
        Ok(sessions)
    }
}

/// Case-insensitive substring match across all four SOAP fields, used by
/// `GET /sessions?search=` after the repository has decrypted the candidate
/// set.
pub fn matches_search(session: &Session, query: &str) -> bool {
    let query = query.to_lowercase();
    [&session.subjective, &session.objective, &session.assessment, &session.plan]
        .iter()
        .any(|field| field.to_lowercase().contains(&query))
}

/// Orchestrates the lifecycle transitions, wrapping the repository with
/// rate limiting, version snapshots, appointment propagation, and audit
/// emission. One method per transition named in
pub struct SessionService {
    pool: PgPool,
    repo: SessionRepository,
    versions: SessionVersionRepository,
    appointments: AppointmentRepository,
    audit: AuditSink,
    limiter: RateLimiter,
}

impl SessionService {
    pub fn new(
        pool: PgPool,
        repo: SessionRepository,
        versions: SessionVersionRepository,
        appointments: AppointmentRepository,
        audit: AuditSink,
        limiter: RateLimiter,
    ) -> Self {
        Self { pool, repo, versions, appointments, audit, limiter }
    }

    pub async fn create(
        &self,
        workspace_id: WorkspaceId,
        client_id: ClientId,
        appointment_id: Option<AppointmentId>,
        initial: SoapPatch,
        actor: UserId,
    ) -> Result<Session> {
        let mut session = Session {
            id: SessionId::new(),
            workspace_id,
            client_id,
            appointment_id,
            subjective: initial.subjective.unwrap_or_default(),
            objective: initial.objective.unwrap_or_default(),
            assessment: initial.assessment.unwrap_or_default(),
            plan: initial.plan.unwrap_or_default(),
            is_draft: true,
            version: 1,
            created_at: crate::time_util::now(),
            finalized_at: None,
            amended_at: None,
            amendment_count: 0,
            draft_last_saved_at: None,
            deleted_at: None,
            permanent_delete_after: None,
            deleted_by_user_id: None,
            deleted_reason: None,
        };

        let mut tx = self.pool.begin().await?;
        self.repo.insert(&mut tx, &session).await?;
        if let Some(appointment_id) = appointment_id {
            self.appointments.complete_if_scheduled(&mut tx, workspace_id, appointment_id).await?;
        }
        tx.commit().await?;

        self.audit
            .emit(AuditEvent {
                actor: Some(actor),
                workspace_id,
                action: AuditAction::Create,
                resource_type: "session",
                resource_id: Some(session.id.to_string()),
                metadata: serde_json::json!({}),
                ip_address: None,
            })
            .await;

        Ok(session)
    }

    /// Draft autosave. Rate-limited to 60/minute per
    /// `(user_id, session_id)`; fails `RateLimited` over the limit rather
    /// than silently dropping the write.
    pub async fn draft_update(
        &self,
        workspace_id: WorkspaceId,
        session_id: SessionId,
        actor: UserId,
        patch: SoapPatch,
        expected_version: i32,
    ) -> Result<Session> {
        let key = format!("session_draft:{actor}:{session_id}");
        self.limiter.check(&key, limits::SESSION_DRAFT_AUTOSAVE, OnStoreError::FailOpen).await?;

        let mut tx = self.pool.begin().await?;
        let mut session = self.repo.find_for_update(&mut tx, workspace_id, session_id).await?;
        if session.version != expected_version {
            return Err(Error::VersionConflict { expected: expected_version, actual: session.version });
        }

        patch.apply(&mut session);
        session.draft_last_saved_at = Some(crate::time_util::now());
        session.version += 1;
        if session.finalized_at.is_none() {
            session.is_draft = true;
        }

        self.repo.save(&mut tx, &session, expected_version).await?;
        tx.commit().await?;
        Ok(session)
    }

    /// Finalize. Requires at least one non-empty SOAP field;
    /// snapshots the just-finalized payload as `SessionVersion(v=1)`.
    pub async fn finalize(
        &self,
        workspace_id: WorkspaceId,
        session_id: SessionId,
        actor: UserId,
        expected_version: i32,
    ) -> Result<Session> {
        let mut tx = self.pool.begin().await?;
        let mut session = self.repo.find_for_update(&mut tx, workspace_id, session_id).await?;
        if session.version != expected_version {
            return Err(Error::VersionConflict { expected: expected_version, actual: session.version });
        }
        if session.finalized_at.is_some() {
            return Err(Error::AlreadyFinalized);
        }
        if !Session::any_soap_field_non_empty(&session.subjective, &session.objective, &session.assessment, &session.plan) {
            return Err(Error::unprocessable("cannot finalize a session with no SOAP content"));
        }

        session.finalized_at = Some(crate::time_util::now());
        session.is_draft = false;
        session.version += 1;

        self.repo.save(&mut tx, &session, expected_version).await?;
        self.versions
            .create(
                &mut tx,
                session_id,
                1,
                SoapSnapshot {
                    subjective: session.subjective.clone(),
                    objective: session.objective.clone(),
                    assessment: session.assessment.clone(),
                    plan: session.plan.clone(),
                },
            )
            .await?;
        tx.commit().await?;

        self.audit
            .emit(AuditEvent {
                actor: Some(actor),
                workspace_id,
                action: AuditAction::Update,
                resource_type: "session",
                resource_id: Some(session_id.to_string()),
                metadata: serde_json::json!({ "transition": "finalize" }),
                ip_address: None,
            })
            .await;

        Ok(session)
    }

    /// Update after finalize: amends, snapshotting the pre-edit payload as
    /// `SessionVersion(v = amendment_count + 2)` before applying the patch.
    pub async fn amend(
        &self,
        workspace_id: WorkspaceId,
        session_id: SessionId,
        actor: UserId,
        patch: SoapPatch,
        expected_version: i32,
    ) -> Result<Session> {
        let mut tx = self.pool.begin().await?;
        let mut session = self.repo.find_for_update(&mut tx, workspace_id, session_id).await?;
        if session.version != expected_version {
            return Err(Error::VersionConflict { expected: expected_version, actual: session.version });
        }
        if session.finalized_at.is_none() {
            return Err(Error::unprocessable("session is not finalized, use draft_update"));
        }

        let sections_changed = patch.sections_changed();
        let snapshot_version = session.amendment_count + 2;
        self.versions
            .create(
                &mut tx,
                session_id,
                snapshot_version,
                SoapSnapshot {
                    subjective: session.subjective.clone(),
                    objective: session.objective.clone(),
                    assessment: session.assessment.clone(),
                    plan: session.plan.clone(),
                },
            )
            .await?;

        patch.apply(&mut session);
        session.amended_at = Some(crate::time_util::now());
        session.amendment_count += 1;
        session.version += 1;

        self.repo.save(&mut tx, &session, expected_version).await?;
        tx.commit().await?;

        self.audit
            .emit(AuditEvent {
                actor: Some(actor),
                workspace_id,
                action: AuditAction::Update,
                resource_type: "session",
                resource_id: Some(session_id.to_string()),
                metadata: serde_json::json!({ "transition": "amend", "sections_changed": sections_changed }),
                ip_address: None,
            })
            .await;

        Ok(session)
    }

    /// Unfinalize: deletes all versions, resets amendment
    /// tracking, returns the session to `draft`.
    pub async fn unfinalize(&self, workspace_id: WorkspaceId, session_id: SessionId, expected_version: i32) -> Result<Session> {
        let mut tx = self.pool.begin().await?;
        let mut session = self.repo.find_for_update(&mut tx, workspace_id, session_id).await?;
        if session.version != expected_version {
            return Err(Error::VersionConflict { expected: expected_version, actual: session.version });
        }
        if session.finalized_at.is_none() {
            return Err(Error::AlreadyDraft);
        }

        self.versions.delete_all_for(&mut tx, session_id).await?;
        session.amendment_count = 0;
        session.amended_at = None;
        session.finalized_at = None;
        session.is_draft = true;
        session.version += 1;

        self.repo.save(&mut tx, &session, expected_version).await?;
        tx.commit().await?;
        Ok(session)
    }

    pub async fn soft_delete(
        &self,
        workspace_id: WorkspaceId,
        session_id: SessionId,
        actor: UserId,
        reason: String,
        expected_version: i32,
    ) -> Result<Session> {
        let mut tx = self.pool.begin().await?;
        let mut session = self.repo.find_for_update(&mut tx, workspace_id, session_id).await?;
        if session.version != expected_version {
            return Err(Error::VersionConflict { expected: expected_version, actual: session.version });
        }

        let now = crate::time_util::now();
        session.deleted_at = Some(now);
        session.permanent_delete_after = Some(crate::time_util::add_days(now, 30));
        session.deleted_by_user_id = Some(actor);
        session.deleted_reason = Some(reason);
        session.version += 1;

        self.repo.save(&mut tx, &session, expected_version).await?;
        tx.commit().await?;

        self.audit
            .emit(AuditEvent {
                actor: Some(actor),
                workspace_id,
                action: AuditAction::Delete,
                resource_type: "session",
                resource_id: Some(session_id.to_string()),
                metadata: serde_json::json!({ "transition": "soft_delete" }),
                ip_address: None,
            })
            .await;

        Ok(session)
    }

    /// Restore within the grace period; fails `Gone` after
    /// `permanent_delete_after` has passed.
    pub async fn restore(&self, workspace_id: WorkspaceId, session_id: SessionId, expected_version: i32) -> Result<Session> {
        let mut tx = self.pool.begin().await?;
        let mut session = self.repo.find_for_update(&mut tx, workspace_id, session_id).await?;
        if session.version != expected_version {
            return Err(Error::VersionConflict { expected: expected_version, actual: session.version });
        }

        let Some(permanent_delete_after) = session.permanent_delete_after else {
            return Err(Error::unprocessable("session is not soft-deleted"));
        };
        if crate::time_util::now() >= permanent_delete_after {
            return Err(Error::gone("grace period has expired"));
        }

        session.deleted_at = None;
        session.permanent_delete_after = None;
        session.deleted_by_user_id = None;
        session.deleted_reason = None;
        session.version += 1;

        self.repo.save(&mut tx, &session, expected_version).await?;
        tx.commit().await?;
        Ok(session)
    }

    pub async fn permanent_delete(&self, workspace_id: WorkspaceId, session_id: SessionId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.repo.permanent_delete(&mut tx, workspace_id, session_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Runs in the purge worker: hard-deletes every session past its grace
    /// period.
    pub async fn purge_expired(&self) -> Result<u64> {
        let now = crate::time_util::now();
        let expired = self.repo.find_expired_for_purge(&self.pool, now).await?;
        let mut purged = 0u64;
        for session in expired {
            let mut tx = self.pool.begin().await?;
            if self.repo.permanent_delete(&mut tx, session.workspace_id, session.id).await.is_ok() {
                tx.commit().await?;
                purged += 1;
            }
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_soap_fields_are_rejected() {
        assert!(!Session::any_soap_field_non_empty("", "  ", "\t", ""));
        assert!(Session::any_soap_field_non_empty("pain", "", "", ""));
    }

    #[test]
    fn amended_sessions_block_cascade_delete() {
        let mut session = sample_session();
        assert!(session.cascade_delete_allowed());
        session.amendment_count = 1;
        assert!(!session.cascade_delete_allowed());
    }

    #[test]
    fn patch_reports_only_changed_sections() {
        let patch = SoapPatch { subjective: Some("severe pain".into()), ..Default::default() };
        assert_eq!(patch.sections_changed(), vec!["subjective"]);
    }

    fn sample_session() -> Session {
        Session {
            id: SessionId::new(),
            workspace_id: WorkspaceId::new(),
            client_id: ClientId::new(),
            appointment_id: None,
            subjective: "pain".into(),
            objective: String::new(),
            assessment: String::new(),
            plan: String::new(),
            is_draft: false,
            version: 2,
            created_at: crate::time_util::now(),
            finalized_at: Some(crate::time_util::now()),
            amended_at: None,
            amendment_count: 0,
            draft_last_saved_at: None,
            deleted_at: None,
            permanent_delete_after: None,
            deleted_by_user_id: None,
            deleted_reason: None,
        }
    }
}
