//! Repository for the `appointments` table.
//!
//! The schema enforces one live appointment per ticket and no overlapping
//! live appointments per technician; inserts and reschedules that race past
//! the application-level check fail with a constraint violation.

use servicedesk_core::appointment::{AppointmentStatus, Slot};
use servicedesk_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::appointment::{Appointment, CreateAppointment, RescheduleProposal};

/// Column list for `appointments` queries.
const COLUMNS: &str = "\
    id, ticket_id, it_support_id, scheduled_at, scheduled_end, status, note, \
    new_date, reschedule_reason, reschedule_initiator, external_event_id, \
    created_at, updated_at";

/// Provides CRUD and workflow operations for appointments.
pub struct AppointmentRepo;

impl AppointmentRepo {
    /// Insert a new `scheduled` appointment.
    pub async fn create(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        input: &CreateAppointment,
    ) -> Result<Appointment, sqlx::Error> {
        let query = format!(
            "INSERT INTO appointments \
                (ticket_id, it_support_id, scheduled_at, scheduled_end, status, note) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Appointment>(&query)
            .bind(input.ticket_id)
            .bind(input.it_support_id)
            .bind(input.slot.start)
            .bind(input.slot.end)
            .bind(AppointmentStatus::Scheduled.as_str())
            .bind(&input.note)
            .fetch_one(&mut **tx)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Appointment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM appointments WHERE id = $1");
        sqlx::query_as::<_, Appointment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The ticket's non-cancelled appointment, if any.
    pub async fn find_active_for_ticket(
        pool: &PgPool,
        ticket_id: DbId,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM appointments \
             WHERE ticket_id = $1 AND status <> 'cancelled'"
        );
        sqlx::query_as::<_, Appointment>(&query)
            .bind(ticket_id)
            .fetch_optional(pool)
            .await
    }

    /// Non-cancelled appointments of a technician overlapping `slot`.
    pub async fn list_active_overlapping(
        pool: &PgPool,
        it_support_id: DbId,
        slot: &Slot,
    ) -> Result<Vec<Appointment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM appointments \
             WHERE it_support_id = $1 \
               AND status <> 'cancelled' \
               AND scheduled_at < $3 \
               AND scheduled_end > $2 \
             ORDER BY scheduled_at"
        );
        sqlx::query_as::<_, Appointment>(&query)
            .bind(it_support_id)
            .bind(slot.start)
            .bind(slot.end)
            .fetch_all(pool)
            .await
    }

    /// All appointments of a technician starting in `[from, to)`.
    pub async fn list_for_technician(
        pool: &PgPool,
        it_support_id: DbId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<Appointment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM appointments \
             WHERE it_support_id = $1 AND scheduled_at >= $2 AND scheduled_at < $3 \
             ORDER BY scheduled_at"
        );
        sqlx::query_as::<_, Appointment>(&query)
            .bind(it_support_id)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
    }

    /// Stage a proposal. Returns `None` if the appointment is missing or
    /// was cancelled in the meantime.
    pub async fn request_reschedule(
        pool: &PgPool,
        id: DbId,
        proposal: &RescheduleProposal,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        let query = format!(
            "UPDATE appointments SET \
                status = $1, \
                new_date = $2, \
                reschedule_reason = $3, \
                reschedule_initiator = $4, \
                updated_at = NOW() \
             WHERE id = $5 AND status <> 'cancelled' \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Appointment>(&query)
            .bind(AppointmentStatus::RescheduleRequested.as_str())
            .bind(proposal.new_date)
            .bind(&proposal.reason)
            .bind(&proposal.initiator)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Move the appointment into the proposed slot and clear the staging
    /// fields. Only applies while that exact proposal is still pending.
    pub async fn commit_reschedule(
        pool: &PgPool,
        id: DbId,
        proposed: &Slot,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        let query = format!(
            "UPDATE appointments SET \
                scheduled_at = $1, \
                scheduled_end = $2, \
                status = $3, \
                new_date = NULL, \
                reschedule_reason = NULL, \
                reschedule_initiator = NULL, \
                updated_at = NOW() \
             WHERE id = $4 AND status = $5 AND new_date = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Appointment>(&query)
            .bind(proposed.start)
            .bind(proposed.end)
            .bind(AppointmentStatus::Scheduled.as_str())
            .bind(id)
            .bind(AppointmentStatus::RescheduleRequested.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Drop a pending proposal, keeping the original time.
    pub async fn discard_reschedule(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<Appointment>, sqlx::Error> {
        let query = format!(
            "UPDATE appointments SET \
                status = $1, \
                new_date = NULL, \
                reschedule_reason = NULL, \
                reschedule_initiator = NULL, \
                updated_at = NOW() \
             WHERE id = $2 AND status = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Appointment>(&query)
            .bind(AppointmentStatus::Scheduled.as_str())
            .bind(id)
            .bind(AppointmentStatus::RescheduleRequested.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Cancel an appointment, releasing its slot. Staging fields are cleared.
    pub async fn cancel(pool: &PgPool, id: DbId) -> Result<Option<Appointment>, sqlx::Error> {
        let query = format!(
            "UPDATE appointments SET \
                status = $1, \
                new_date = NULL, \
                reschedule_reason = NULL, \
                reschedule_initiator = NULL, \
                updated_at = NOW() \
             WHERE id = $2 AND status <> $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Appointment>(&query)
            .bind(AppointmentStatus::Cancelled.as_str())
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Remember the id of the mirrored external calendar event.
    pub async fn set_external_event_id(
        pool: &PgPool,
        id: DbId,
        external_event_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE appointments SET external_event_id = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(external_event_id)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
