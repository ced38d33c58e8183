//! User entity: `id`, `workspace_id`, `email`,
//! `is_active`, `totp_enabled`. A user belongs to exactly one workspace;
//! authentication fails unless that workspace is `active`.

use sqlx::PgPool;

use crate::db::scope::found_or_404;
use crate::error::Result;
use crate::ids::{UserId, WorkspaceId};

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub workspace_id: WorkspaceId,
    pub email: String,
    pub is_active: bool,
    pub totp_enabled: bool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: uuid::Uuid,
    workspace_id: uuid::Uuid,
    email: String,
    is_active: bool,
    totp_enabled: bool,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId(row.id),
            workspace_id: WorkspaceId(row.workspace_id),
            email: row.email,
            is_active: row.is_active,
            totp_enabled: row.totp_enabled,
        }
    }
}

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, id: UserId) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(id.0).fetch_optional(&self.pool).await?;
        found_or_404(row, "user").map(Into::into)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT * FROM users WHERE email = $1").bind(email).fetch_optional(&self.pool).await?;
        Ok(row.map(Into::into))
    }
}
