//! Appointment entity and conflict detection.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use crate::db::scope::found_or_404;
use crate::error::Result;
use crate::ids::{AppointmentId, ClientId, WorkspaceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    Clinic,
    Home,
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Attended,
    Cancelled,
    NoShow,
    Completed,
}

impl AppointmentStatus {
    /// Only `scheduled` and `attended` appointments participate in conflict
    /// checks.
    pub fn participates_in_conflicts(self) -> bool {
        matches!(self, Self::Scheduled | Self::Attended)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    NotPaid,
    PaymentSent,
    Pending,
    Paid,
    PartiallyPaid,
    Refunded,
    Failed,
    Waived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub workspace_id: WorkspaceId,
    pub client_id: ClientId,
    pub scheduled_start: OffsetDateTime,
    pub scheduled_end: OffsetDateTime,
    pub location_type: LocationType,
    pub status: AppointmentStatus,
    pub payment_price: Option<rust_decimal::Decimal>,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub paid_at: Option<OffsetDateTime>,
    pub edit_count: i32,
}

/// Two half-open intervals `[a_start, a_end)` and `[b_start, b_end)`
/// overlap iff they strictly intersect; exact adjacency (`a.end == b.start`)
/// is not a conflict.
pub fn intervals_overlap(
    a_start: OffsetDateTime,
    a_end: OffsetDateTime,
    b_start: OffsetDateTime,
    b_end: OffsetDateTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictingAppointment {
    pub id: AppointmentId,
    pub scheduled_start: OffsetDateTime,
    pub scheduled_end: OffsetDateTime,
    pub client_initials: String,
    pub location_type: LocationType,
    pub status: AppointmentStatus,
}

#[derive(sqlx::FromRow)]
struct AppointmentRow {
    id: uuid::Uuid,
    workspace_id: uuid::Uuid,
    client_id: uuid::Uuid,
    scheduled_start: OffsetDateTime,
    scheduled_end: OffsetDateTime,
    location_type: String,
    status: String,
    payment_price: Option<rust_decimal::Decimal>,
    payment_status: String,
    payment_method: Option<String>,
    paid_at: Option<OffsetDateTime>,
    edit_count: i32,
}

impl From<AppointmentRow> for Appointment {
    fn from(row: AppointmentRow) -> Self {
        Appointment {
            id: AppointmentId(row.id),
            workspace_id: WorkspaceId(row.workspace_id),
            client_id: ClientId(row.client_id),
            scheduled_start: row.scheduled_start,
            scheduled_end: row.scheduled_end,
            location_type: parse_location(&row.location_type),
            status: parse_status(&row.status),
            payment_price: row.payment_price,
            payment_status: parse_payment_status(&row.payment_status),
            payment_method: row.payment_method,
            paid_at: row.paid_at,
            edit_count: row.edit_count,
        }
    }
}

fn parse_location(s: &str) -> LocationType {
    match s {
        "home" => LocationType::Home,
        "online" => LocationType::Online,
        _ => LocationType::Clinic,
    }
}

fn parse_status(s: &str) -> AppointmentStatus {
    match s {
        "attended" => AppointmentStatus::Attended,
        "cancelled" => AppointmentStatus::Cancelled,
        "no_show" => AppointmentStatus::NoShow,
        "completed" => AppointmentStatus::Completed,
        _ => AppointmentStatus::Scheduled,
    }
}

fn parse_payment_status(s: &str) -> PaymentStatus {
    match s {
        "not_paid" => PaymentStatus::NotPaid,
        "payment_sent" => PaymentStatus::PaymentSent,
        "pending" => PaymentStatus::Pending,
        "paid" => PaymentStatus::Paid,
        "partially_paid" => PaymentStatus::PartiallyPaid,
        "refunded" => PaymentStatus::Refunded,
        "failed" => PaymentStatus::Failed,
        "waived" => PaymentStatus::Waived,
        _ => PaymentStatus::Unpaid,
    }
}

pub struct AppointmentRepository {
    pool: PgPool,
}

impl AppointmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a new scheduled appointment. Conflict checking is the caller's responsibility via
    /// `find_conflicts` — this method only persists.
    pub async fn create(
        &self,
        workspace_id: WorkspaceId,
        client_id: ClientId,
        scheduled_start: OffsetDateTime,
        scheduled_end: OffsetDateTime,
        location_type: LocationType,
        payment_price: Option<rust_decimal::Decimal>,
    ) -> Result<Appointment> {
        let appointment = Appointment {
            id: AppointmentId::new(),
            workspace_id,
            client_id,
            scheduled_start,
            scheduled_end,
            location_type,
            status: AppointmentStatus::Scheduled,
            payment_price,
            payment_status: PaymentStatus::Unpaid,
            payment_method: None,
            paid_at: None,
            edit_count: 0,
        };

        sqlx::query(
            "INSERT INTO appointments \
             (id, workspace_id, client_id, scheduled_start, scheduled_end, location_type, \
              status, payment_price, payment_status, payment_method, paid_at, edit_count) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(appointment.id.0)
        .bind(appointment.workspace_id.0)
        .bind(appointment.client_id.0)
        .bind(appointment.scheduled_start)
        .bind(appointment.scheduled_end)
        .bind(location_type_str(appointment.location_type))
        .bind(status_str(appointment.status))
        .bind(appointment.payment_price)
        .bind(payment_status_str(appointment.payment_status))
        .bind(&appointment.payment_method)
        .bind(appointment.paid_at)
        .bind(appointment.edit_count)
        .execute(&self.pool)
        .await?;

        Ok(appointment)
    }

    pub async fn find(&self, workspace_id: WorkspaceId, id: AppointmentId) -> Result<Appointment> {
        let row: Option<AppointmentRow> =
            sqlx::query_as("SELECT * FROM appointments WHERE id = $1 AND workspace_id = $2")
                .bind(id.0)
                .bind(workspace_id.0)
                .fetch_optional(&self.pool)
                .await?;
        found_or_404(row, "appointment").map(Into::into)
    }

    /// Lists appointments in the workspace whose status participates in
    /// conflict checks and whose interval overlaps `[start, end)`,
    /// optionally excluding one appointment (the one being updated).
    pub async fn find_conflicts(
        &self,
        workspace_id: WorkspaceId,
        start: OffsetDateTime,
        end: OffsetDateTime,
        exclude: Option<AppointmentId>,
    ) -> Result<Vec<Appointment>> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(
            "SELECT * FROM appointments \
             WHERE workspace_id = $1 \
               AND status IN ('scheduled', 'attended') \
               AND scheduled_start < $3 AND $2 < scheduled_end \
               AND ($4::uuid IS NULL OR id != $4)",
        )
        .bind(workspace_id.0)
        .bind(start)
        .bind(end)
        .bind(exclude.map(|id| id.0))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Takes the caller's open transaction so the appointment update commits
    /// atomically with whatever else the transaction is writing (the
    /// transaction insert, the session row, ...) rather than auto-committing
    /// on its own connection.
    pub async fn set_payment_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        workspace_id: WorkspaceId,
        id: AppointmentId,
        status: PaymentStatus,
        paid_at: Option<OffsetDateTime>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE appointments SET payment_status = $1, paid_at = $2 WHERE id = $3 AND workspace_id = $4",
        )
        .bind(payment_status_str(status))
        .bind(paid_at)
        .bind(id.0)
        .bind(workspace_id.0)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Auto-completes a scheduled appointment when a session is created
    /// against it, within the caller's transaction.
    pub async fn complete_if_scheduled(&self, tx: &mut Transaction<'_, Postgres>, workspace_id: WorkspaceId, id: AppointmentId) -> Result<()> {
        sqlx::query(
            "UPDATE appointments SET status = 'completed' \
             WHERE id = $1 AND workspace_id = $2 AND status = 'scheduled'",
        )
        .bind(id.0)
        .bind(workspace_id.0)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

fn location_type_str(location: LocationType) -> &'static str {
    match location {
        LocationType::Clinic => "clinic",
        LocationType::Home => "home",
        LocationType::Online => "online",
    }
}

fn status_str(status: AppointmentStatus) -> &'static str {
    match status {
        AppointmentStatus::Scheduled => "scheduled",
        AppointmentStatus::Attended => "attended",
        AppointmentStatus::Cancelled => "cancelled",
        AppointmentStatus::NoShow => "no_show",
        AppointmentStatus::Completed => "completed",
    }
}

fn payment_status_str(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Unpaid => "unpaid",
        PaymentStatus::NotPaid => "not_paid",
        PaymentStatus::PaymentSent => "payment_sent",
        PaymentStatus::Pending => "pending",
        PaymentStatus::Paid => "paid",
        PaymentStatus::PartiallyPaid => "partially_paid",
        PaymentStatus::Refunded => "refunded",
        PaymentStatus::Failed => "failed",
        PaymentStatus::Waived => "waived",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn back_to_back_appointments_do_not_conflict() {
        let a_start = datetime!(2025-01-10 10:00 UTC);
        let a_end = datetime!(2025-01-10 11:00 UTC);
        assert!(!intervals_overlap(a_start, a_end, a_end, datetime!(2025-01-10 12:00 UTC)));
    }

    #[test]
    fn overlapping_appointments_conflict() {
        let a_start = datetime!(2025-01-10 10:00 UTC);
        let a_end = datetime!(2025-01-10 11:00 UTC);
        assert!(intervals_overlap(a_start, a_end, datetime!(2025-01-10 10:30 UTC), datetime!(2025-01-10 11:30 UTC)));
    }

    #[test]
    fn non_conflicting_statuses_are_excluded_from_participation() {
        assert!(!AppointmentStatus::Cancelled.participates_in_conflicts());
        assert!(!AppointmentStatus::NoShow.participates_in_conflicts());
        assert!(AppointmentStatus::Scheduled.participates_in_conflicts());
        assert!(AppointmentStatus::Attended.participates_in_conflicts());
    }
}
