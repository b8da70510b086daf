//! Orchestration of the ticket lifecycle, appointment scheduling, and
//! calendar reconciliation.
//!
//! Each operation loads current state, asks `servicedesk_core` for a
//! decision, applies it through the repositories (inside one transaction
//! where several writes belong together), and then performs best-effort side
//! effects: notifications and calendar mirroring. A failed side effect is
//! logged and never undoes the primary write.

pub mod reconciler;
pub mod scheduler;
pub mod tickets;

use servicedesk_core::error::CoreError;
use servicedesk_core::types::DbId;
use servicedesk_db::models::appointment::Appointment;
use servicedesk_db::models::ticket::Ticket;
use servicedesk_db::repositories::{AppointmentRepo, TicketRepo};
use servicedesk_db::DbPool;

use crate::error::AppResult;

pub(crate) async fn load_ticket(pool: &DbPool, id: DbId) -> AppResult<Ticket> {
    TicketRepo::find_by_id(pool, id)
        .await?
        .ok_or_else(|| CoreError::NotFound { entity: "Ticket", id }.into())
}

pub(crate) async fn load_appointment(pool: &DbPool, id: DbId) -> AppResult<Appointment> {
    AppointmentRepo::find_by_id(pool, id)
        .await?
        .ok_or_else(|| CoreError::NotFound { entity: "Appointment", id }.into())
}

/// A conditional write matched no row because another writer got there first.
pub(crate) fn modified_concurrently(entity: &str) -> CoreError {
    CoreError::Conflict(format!(
        "{entity} was modified concurrently; reload and retry"
    ))
}
