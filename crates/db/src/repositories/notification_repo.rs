//! Per-user notification inbox.

use servicedesk_core::types::DbId;
use sqlx::PgPool;

use crate::models::notification::{CreateNotification, Notification};

const COLUMNS: &str =
    "id, user_id, ticket_id, title, message, notification_type, is_read, read_at, created_at";

pub struct NotificationRepo;

impl NotificationRepo {
    pub async fn create(pool: &PgPool, input: &CreateNotification) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO notifications (user_id, ticket_id, title, message, notification_type) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(input.user_id)
        .bind(input.ticket_id)
        .bind(&input.title)
        .bind(&input.message)
        .bind(&input.notification_type)
        .fetch_one(pool)
        .await
    }

    /// Newest first. With `unread_only`, read entries are left out.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE user_id = $1 AND (NOT $2 OR NOT is_read) \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(user_id)
            .bind(unread_only)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Whether `notification_id` exists in `user_id`'s inbox. Marking an
    /// already-read entry again keeps its first `read_at`.
    pub async fn mark_read(
        pool: &PgPool,
        notification_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let updated: Option<DbId> = sqlx::query_scalar(
            "UPDATE notifications \
             SET is_read = true, read_at = COALESCE(read_at, NOW()) \
             WHERE id = $1 AND user_id = $2 RETURNING id",
        )
        .bind(notification_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(updated.is_some())
    }
}
