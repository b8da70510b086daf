//! Ticket entity models and DTOs.

use serde::{Deserialize, Serialize, Serializer};
use servicedesk_core::sus::CreditedRating;
use servicedesk_core::ticket_lifecycle::TicketSnapshot;
use servicedesk_core::ticket_status::{self, TicketStatus};
use servicedesk_core::types::{DbId, Timestamp};
use servicedesk_core::urgency::Urgency;
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `tickets` table.
///
/// `status` holds the stored spelling, which may be a legacy synonym. Use
/// [`Ticket::status`] for the canonical value; serialization always emits
/// the canonical spelling.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Ticket {
    pub id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub urgency: i16,
    #[sqlx(rename = "status")]
    #[serde(rename = "status", serialize_with = "serialize_canonical_status")]
    pub raw_status: String,
    pub created_by_id: DbId,
    pub assigned_to_id: Option<DbId>,
    pub accepted_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub response_time_minutes: Option<i32>,
    pub resolution_time_minutes: Option<i32>,
    pub rejection_reason: Option<String>,
    pub resolution_note: Option<String>,
    pub close_checklist: Option<serde_json::Value>,
    pub rating: Option<i16>,
    pub sus_raw_answers: Option<Vec<i16>>,
    pub feedback_comment: Option<String>,
    #[serde(skip)]
    pub rating_credited_to: Option<DbId>,
    #[serde(skip)]
    pub resolution_credited: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

fn serialize_canonical_status<T, S>(raw: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<str>,
    S: Serializer,
{
    serializer.serialize_str(ticket_status::normalize(raw.as_ref()).as_str())
}

impl Ticket {
    /// Canonical status of the stored spelling.
    pub fn status(&self) -> TicketStatus {
        ticket_status::normalize(&self.raw_status)
    }

    pub fn urgency(&self) -> Urgency {
        Urgency::from_id(self.urgency).unwrap_or_default()
    }

    /// The fields the guard table needs.
    pub fn snapshot(&self) -> TicketSnapshot {
        TicketSnapshot {
            status: self.status(),
            created_by_id: self.created_by_id,
            assigned_to_id: self.assigned_to_id,
            created_at: self.created_at,
            accepted_at: self.accepted_at,
            response_time_minutes: self.response_time_minutes,
            resolution_credited: self.resolution_credited,
        }
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for creating a ticket. The requester comes from the acting principal.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTicket {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub urgency: Urgency,
}

/// Non-status fields an administrator may change. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTicketDetails {
    pub title: Option<String>,
    pub description: Option<String>,
    pub urgency: Option<Urgency>,
    pub assigned_to_id: Option<DbId>,
}

/// Free-text fields written alongside a status transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionNotes {
    pub rejection_reason: Option<String>,
    pub resolution_note: Option<String>,
    pub close_checklist: Option<serde_json::Value>,
}

/// Feedback fields written on submission.
#[derive(Debug, Clone)]
pub struct TicketFeedback {
    pub rating: i16,
    pub sus_raw_answers: Vec<i16>,
    pub comment: Option<String>,
    /// Technician whose totals now hold `rating`.
    pub credited_to: Option<DbId>,
}

/// Rating state read under the ticket's row lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingLock {
    /// The rating currently counted in some technician's totals.
    pub prior: Option<CreditedRating>,
    pub assigned_to_id: Option<DbId>,
}

/// Filter parameters for listing tickets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub assigned_to_id: Option<DbId>,
    pub created_by_id: Option<DbId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
