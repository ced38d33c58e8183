//! Immutable `SessionVersion` snapshots:
//! `(session_id, version_number)` uniquely identifies a snapshot; rows are
//! created by finalize (v1) and each amendment (vN, N>=2), and never
//! updated.

use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use crate::error::Result;
use crate::ids::{SessionId, SessionVersionId};

#[derive(Debug, Clone)]
pub struct SessionVersion {
    pub id: SessionVersionId,
    pub session_id: SessionId,
    pub version_number: i32,
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
    pub created_at: OffsetDateTime,
}

pub struct SoapSnapshot {
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
}

pub struct SessionVersionRepository {
    pool: PgPool,
}

impl SessionVersionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs in the caller's transaction: a version snapshot and the session
    /// row it snapshots (or un-snapshots) must commit or roll back together,
    /// or the version count could drift from the amendment history.
    pub async fn create(&self, tx: &mut Transaction<'_, Postgres>, session_id: SessionId, version_number: i32, snapshot: SoapSnapshot) -> Result<()> {
        sqlx::query(
            "INSERT INTO session_versions \
             (id, session_id, version_number, subjective, objective, assessment, plan, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(SessionVersionId::new().0)
        .bind(session_id.0)
        .bind(version_number)
        .bind(snapshot.subjective)
        .bind(snapshot.objective)
        .bind(snapshot.assessment)
        .bind(snapshot.plan)
        .bind(crate::time_util::now())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn count_for(&self, session_id: SessionId) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM session_versions WHERE session_id = $1")
            .bind(session_id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Deletes all versions for a session, in the caller's transaction (see
    /// `create`).
    pub async fn delete_all_for(&self, tx: &mut Transaction<'_, Postgres>, session_id: SessionId) -> Result<()> {
        sqlx::query("DELETE FROM session_versions WHERE session_id = $1")
            .bind(session_id.0)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
