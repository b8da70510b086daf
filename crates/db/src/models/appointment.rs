//! Appointment entity models and DTOs.

use serde::Serialize;
use servicedesk_core::appointment::{AppointmentStatus, BookedSlot, Slot};
use servicedesk_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `appointments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Appointment {
    pub id: DbId,
    pub ticket_id: DbId,
    pub it_support_id: DbId,
    pub scheduled_at: Timestamp,
    pub scheduled_end: Timestamp,
    pub status: String,
    pub note: Option<String>,
    pub new_date: Option<Timestamp>,
    pub reschedule_reason: Option<String>,
    pub reschedule_initiator: Option<String>,
    pub external_event_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Appointment {
    /// Parsed status. The column is constrained, so unknown values only
    /// appear if the schema drifts; they are treated as cancelled.
    pub fn status(&self) -> AppointmentStatus {
        AppointmentStatus::parse(&self.status).unwrap_or(AppointmentStatus::Cancelled)
    }

    pub fn slot(&self) -> Slot {
        Slot {
            start: self.scheduled_at,
            end: self.scheduled_end,
        }
    }

    pub fn booked_slot(&self) -> BookedSlot {
        BookedSlot {
            appointment_id: self.id,
            scheduled_at: self.scheduled_at,
        }
    }
}

/// DTO for inserting an appointment.
#[derive(Debug, Clone)]
pub struct CreateAppointment {
    pub ticket_id: DbId,
    pub it_support_id: DbId,
    pub slot: Slot,
    pub note: Option<String>,
}

/// A staged reschedule proposal.
#[derive(Debug, Clone)]
pub struct RescheduleProposal {
    pub new_date: Timestamp,
    pub reason: Option<String>,
    pub initiator: String,
}
