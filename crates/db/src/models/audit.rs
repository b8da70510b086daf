//! Ticket audit trail models. Entries are immutable (no `updated_at`).

use serde::Serialize;
use servicedesk_core::ticket_lifecycle::TicketAction;
use servicedesk_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `ticket_audit_logs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TicketAuditLog {
    pub id: DbId,
    pub ticket_id: DbId,
    pub actor_id: DbId,
    pub action: String,
    pub from_status: Option<String>,
    pub to_status: Option<String>,
    pub detail: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for appending an audit entry.
#[derive(Debug, Clone)]
pub struct NewTicketAudit {
    pub ticket_id: DbId,
    pub actor_id: DbId,
    pub action: TicketAction,
    pub from_status: Option<String>,
    pub to_status: Option<String>,
    pub detail: Option<String>,
}

impl NewTicketAudit {
    pub fn new(ticket_id: DbId, actor_id: DbId, action: TicketAction) -> Self {
        Self {
            ticket_id,
            actor_id,
            action,
            from_status: None,
            to_status: None,
            detail: None,
        }
    }

    pub fn with_transition(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from_status = Some(from.into());
        self.to_status = Some(to.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
