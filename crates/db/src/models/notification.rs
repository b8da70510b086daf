//! Notification entity models and DTOs.

use serde::Serialize;
use servicedesk_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `notifications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: DbId,
    pub user_id: DbId,
    pub ticket_id: Option<DbId>,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub is_read: bool,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// DTO for inserting a notification.
#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub user_id: DbId,
    pub ticket_id: Option<DbId>,
    pub title: String,
    pub message: String,
    pub notification_type: String,
}
