//! Append-only audit log. Writes are
//! best-effort: a failure here logs and the primary operation is not rolled
//! back, because the business action and its audit record are not
//! transactionally coupled in this design.

use serde_json::Value;
use sqlx::PgPool;

use crate::ids::{AuditEventId, UserId, WorkspaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Read,
    Update,
    Delete,
}

impl AuditAction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

pub struct AuditEvent {
    pub actor: Option<UserId>,
    pub workspace_id: WorkspaceId,
    pub action: AuditAction,
    pub resource_type: &'static str,
    pub resource_id: Option<String>,
    pub metadata: Value,
    pub ip_address: Option<String>,
}

pub struct AuditSink {
    pool: PgPool,
}

impl AuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Emits `event`. Never returns an error to the caller — a failed audit
    /// write is logged at `error` level and swallowed, keeping the primary
    /// operation's success independent of the audit trail. PHI must never
    /// appear in `event.metadata`; callers
    /// are responsible for hashing/redacting before constructing the event
    /// (see `rag::cache` for the query-hash convention).
    pub async fn emit(&self, event: AuditEvent) {
        let result = sqlx::query(
            "INSERT INTO audit_events \
             (id, actor_user_id, workspace_id, action, resource_type, resource_id, metadata, ip_address, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(AuditEventId::new().0)
        .bind(event.actor.map(|u| u.0))
        .bind(event.workspace_id.0)
        .bind(event.action.as_str())
        .bind(event.resource_type)
        .bind(event.resource_id)
        .bind(event.metadata)
        .bind(event.ip_address)
        .bind(crate::time_util::now())
        .execute(&self.pool)
        .await;

        if let Err(error) = result {
            tracing::error!(%error, resource_type = event.resource_type, "audit write failed, continuing without rollback");
        }
    }
}
