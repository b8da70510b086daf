//! Repository for the `technician_stats` table.
//!
//! Rows are created lazily by upsert the first time a counter moves.

use servicedesk_core::sus::RatingAggregate;
use servicedesk_core::types::DbId;
use sqlx::PgPool;

use crate::models::technician_stats::TechnicianStats;

const COLUMNS: &str = "user_id, resolved_count, rating_sum, rating_count, updated_at";

pub struct TechnicianStatsRepo;

impl TechnicianStatsRepo {
    pub async fn find(pool: &PgPool, user_id: DbId) -> Result<Option<TechnicianStats>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM technician_stats WHERE user_id = $1");
        sqlx::query_as::<_, TechnicianStats>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Add one to the technician's lifetime resolved count.
    pub async fn increment_resolved(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO technician_stats (user_id, resolved_count) VALUES ($1, 1) \
             ON CONFLICT (user_id) DO UPDATE SET \
                resolved_count = technician_stats.resolved_count + 1, \
                updated_at = NOW()",
        )
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Apply a rating delta (see [`RatingAggregate::apply`] on an empty
    /// aggregate) to the technician's running totals.
    pub async fn apply_rating_delta(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: DbId,
        delta: RatingAggregate,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO technician_stats (user_id, rating_sum, rating_count) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE SET \
                rating_sum = technician_stats.rating_sum + EXCLUDED.rating_sum, \
                rating_count = technician_stats.rating_count + EXCLUDED.rating_count, \
                updated_at = NOW()",
        )
        .bind(user_id)
        .bind(delta.rating_sum)
        .bind(delta.rating_count)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
