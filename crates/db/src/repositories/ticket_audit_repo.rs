//! Repository for the append-only `ticket_audit_logs` table.

use servicedesk_core::types::DbId;
use sqlx::PgPool;

use crate::models::audit::{NewTicketAudit, TicketAuditLog};

const COLUMNS: &str =
    "id, ticket_id, actor_id, action, from_status, to_status, detail, created_at";

/// Append and read ticket audit entries. There is no update or delete.
pub struct TicketAuditRepo;

impl TicketAuditRepo {
    /// Append an entry inside the transaction that made the change.
    pub async fn append(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        entry: &NewTicketAudit,
    ) -> Result<TicketAuditLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO ticket_audit_logs \
                (ticket_id, actor_id, action, from_status, to_status, detail) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TicketAuditLog>(&query)
            .bind(entry.ticket_id)
            .bind(entry.actor_id)
            .bind(entry.action.as_str())
            .bind(&entry.from_status)
            .bind(&entry.to_status)
            .bind(&entry.detail)
            .fetch_one(&mut **tx)
            .await
    }

    /// The audit trail of one ticket, oldest first.
    pub async fn list_for_ticket(
        pool: &PgPool,
        ticket_id: DbId,
    ) -> Result<Vec<TicketAuditLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM ticket_audit_logs \
             WHERE ticket_id = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, TicketAuditLog>(&query)
            .bind(ticket_id)
            .fetch_all(pool)
            .await
    }
}
