//! Client (patient) entity. PHI fields are encrypted transparently at the
//! repository boundary; service code only ever sees plaintext `Client`
//! values. First/last name, email, phone, address, medical history, and
//! emergency contact/notes are PHI; date of birth, consent flag, is_active,
//! and tags stay plaintext. Encrypted columns cannot be indexed or filtered
//! on by the database, so lookups by name/email happen after decryption in
//! application code, never in SQL.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::Date;

use crate::crypto::KeyRing;
use crate::db::scope::found_or_404;
use crate::error::Result;
use crate::ids::{ClientId, WorkspaceId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub workspace_id: WorkspaceId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
    pub emergency_contact: Option<String>,
    pub notes: Option<String>,
    pub date_of_birth: Option<Date>,
    pub consent_given: bool,
    pub is_active: bool,
    pub tags: Vec<String>,
}

impl Client {
    /// `"J.D."`-style initials with a trailing dot per initial, falling back
    /// to `"?"` for an unnamed client — used by the appointment-conflicts
    /// route, which must never leak a full name.
    pub fn initials(&self) -> String {
        let first = self.first_name.trim().chars().next();
        let last = self.last_name.trim().chars().next();
        match (first, last) {
            (Some(f), Some(l)) => format!("{}.{}.", f.to_ascii_uppercase(), l.to_ascii_uppercase()),
            (Some(f), None) => format!("{}.", f.to_ascii_uppercase()),
            _ => "?".to_string(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ClientRow {
    id: uuid::Uuid,
    workspace_id: uuid::Uuid,
    first_name_enc: String,
    last_name_enc: String,
    email_enc: Option<String>,
    phone_enc: Option<String>,
    address_enc: Option<String>,
    medical_history_enc: Option<String>,
    emergency_contact_enc: Option<String>,
    notes_enc: Option<String>,
    date_of_birth: Option<Date>,
    consent_given: bool,
    is_active: bool,
    tags: Vec<String>,
}

pub struct ClientRepository {
    pool: PgPool,
    keyring: KeyRing,
}

impl ClientRepository {
    pub fn new(pool: PgPool, keyring: KeyRing) -> Self {
        Self { pool, keyring }
    }

    fn aad(workspace_id: WorkspaceId, client_id: ClientId, field: &str) -> Vec<u8> {
        format!("client:{workspace_id}:{client_id}:{field}").into_bytes()
    }

    async fn decrypt_optional(&self, workspace_id: WorkspaceId, client_id: ClientId, field: &str, value: Option<String>) -> Result<Option<String>> {
        match value {
            Some(ciphertext) => {
                let aad = Self::aad(workspace_id, client_id, field);
                Ok(Some(crate::crypto::decrypt_field(&self.keyring, &ciphertext, &aad).await?))
            }
            None => Ok(None),
        }
    }

    async fn hydrate(&self, row: ClientRow) -> Result<Client> {
        let workspace_id = WorkspaceId(row.workspace_id);
        let client_id = ClientId(row.id);

        let first_name = crate::crypto::decrypt_field(
            &self.keyring,
            &row.first_name_enc,
            &Self::aad(workspace_id, client_id, "first_name"),
        )
        .await?;
        let last_name = crate::crypto::decrypt_field(
            &self.keyring,
            &row.last_name_enc,
            &Self::aad(workspace_id, client_id, "last_name"),
        )
        .await?;

        Ok(Client {
            id: client_id,
            workspace_id,
            first_name,
            last_name,
            email: self.decrypt_optional(workspace_id, client_id, "email", row.email_enc).await?,
            phone: self.decrypt_optional(workspace_id, client_id, "phone", row.phone_enc).await?,
            address: self.decrypt_optional(workspace_id, client_id, "address", row.address_enc).await?,
            medical_history: self
                .decrypt_optional(workspace_id, client_id, "medical_history", row.medical_history_enc)
                .await?,
            emergency_contact: self
                .decrypt_optional(workspace_id, client_id, "emergency_contact", row.emergency_contact_enc)
                .await?,
            notes: self.decrypt_optional(workspace_id, client_id, "notes", row.notes_enc).await?,
            date_of_birth: row.date_of_birth,
            consent_given: row.consent_given,
            is_active: row.is_active,
            tags: row.tags,
        })
    }

    pub async fn find(&self, workspace_id: WorkspaceId, id: ClientId) -> Result<Client> {
        let row: Option<ClientRow> = sqlx::query_as("SELECT * FROM clients WHERE id = $1 AND workspace_id = $2")
            .bind(id.0)
            .bind(workspace_id.0)
            .fetch_optional(&self.pool)
            .await?;
        let row = found_or_404(row, "client")?;
        self.hydrate(row).await
    }

    pub async fn find_many(&self, workspace_id: WorkspaceId, ids: &[ClientId]) -> Result<Vec<Client>> {
        let uuids: Vec<uuid::Uuid> = ids.iter().map(|id| id.0).collect();
        let rows: Vec<ClientRow> = sqlx::query_as("SELECT * FROM clients WHERE workspace_id = $1 AND id = ANY($2)")
            .bind(workspace_id.0)
            .bind(uuids)
            .fetch_all(&self.pool)
            .await?;
        let mut clients = Vec::with_capacity(rows.len());
        for row in rows {
            clients.push(self.hydrate(row).await?);
        }
        Ok(clients)
    }

    /// Soft-deletion: sets `is_active = false`; hard deletion (cascading to
    /// appointments and vectors) is a separate, deliberately rarer operation
    /// not exposed by this repository.
    pub async fn soft_delete(&self, workspace_id: WorkspaceId, id: ClientId) -> Result<()> {
        let result = sqlx::query("UPDATE clients SET is_active = false WHERE id = $1 AND workspace_id = $2")
            .bind(id.0)
            .bind(workspace_id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(crate::error::Error::not_found("client"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(first: &str, last: &str) -> Client {
        Client {
            id: ClientId::new(),
            workspace_id: WorkspaceId::new(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: None,
            phone: None,
            address: None,
            medical_history: None,
            emergency_contact: None,
            notes: None,
            date_of_birth: None,
            consent_given: true,
            is_active: true,
            tags: vec![],
        }
    }

    #[test]
    fn initials_from_first_and_last_name() {
        assert_eq!(client("Jane", "Doe").initials(), "J.D.");
    }

    #[test]
    fn initials_fall_back_to_question_mark() {
        assert_eq!(client("", "").initials(), "?");
    }
}
