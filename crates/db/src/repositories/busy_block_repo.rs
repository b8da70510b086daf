//! Repository for the `busy_blocks` table.

use chrono::NaiveDate;
use servicedesk_core::appointment::Slot;
use servicedesk_core::busy_block::{BusyBlockDraft, BusySource};
use servicedesk_core::types::DbId;
use sqlx::PgPool;

use crate::models::busy_block::BusyBlock;

/// Column list for `busy_blocks` SELECT queries.
const COLUMNS: &str = "\
    id, user_id, title, description, date, start_time, end_time, color, \
    is_completed, source, created_at, updated_at";

/// Column list for INSERT (excludes generated `id` and timestamps).
const INSERT_COLUMNS: &str =
    "user_id, title, description, date, start_time, end_time, color, is_completed, source";

const INSERT_COLUMN_COUNT: usize = 9;

/// Rows per multi-row INSERT; keeps bind parameters well under the
/// Postgres limit of 65535.
const INSERT_CHUNK: usize = 1000;

/// Provides query, insert, and reconciliation operations for busy blocks.
pub struct BusyBlockRepo;

impl BusyBlockRepo {
    /// Insert a single block.
    pub async fn create(pool: &PgPool, draft: &BusyBlockDraft) -> Result<BusyBlock, sqlx::Error> {
        let query = format!(
            "INSERT INTO busy_blocks ({INSERT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BusyBlock>(&query)
            .bind(draft.user_id)
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(draft.date)
            .bind(draft.start_time)
            .bind(draft.end_time)
            .bind(&draft.color)
            .bind(draft.is_completed)
            .bind(draft.source.as_str())
            .fetch_one(pool)
            .await
    }

    /// A user's blocks dated within `[from, to]`, of any source.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BusyBlock>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM busy_blocks \
             WHERE user_id = $1 AND date >= $2 AND date <= $3 \
             ORDER BY date, start_time NULLS FIRST, id"
        );
        sqlx::query_as::<_, BusyBlock>(&query)
            .bind(user_id)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
    }

    /// Blocks that might conflict with `slot`: timed blocks overlapping it,
    /// plus every block dated on one of `dates`.
    pub async fn list_candidates(
        pool: &PgPool,
        user_id: DbId,
        slot: &Slot,
        dates: &[NaiveDate],
    ) -> Result<Vec<BusyBlock>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM busy_blocks \
             WHERE user_id = $1 \
               AND (date = ANY($2) OR (start_time < $4 AND end_time > $3))"
        );
        sqlx::query_as::<_, BusyBlock>(&query)
            .bind(user_id)
            .bind(dates)
            .bind(slot.start)
            .bind(slot.end)
            .fetch_all(pool)
            .await
    }

    /// Count a user's blocks of one source.
    pub async fn count_by_source(
        pool: &PgPool,
        user_id: DbId,
        source: BusySource,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)::BIGINT FROM busy_blocks WHERE user_id = $1 AND source = $2",
        )
        .bind(user_id)
        .bind(source.as_str())
        .fetch_one(pool)
        .await
    }

    /// Replace a user's imported blocks dated on or after `from_date` with
    /// `drafts`, as one transaction.
    ///
    /// Manual blocks are never touched. If any insert fails the delete is
    /// rolled back and the previous imported set stays as it was. An empty
    /// `drafts` only deletes. Returns the number of rows inserted.
    pub async fn replace_imported(
        pool: &PgPool,
        user_id: DbId,
        from_date: NaiveDate,
        drafts: &[BusyBlockDraft],
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let deleted = sqlx::query(
            "DELETE FROM busy_blocks WHERE user_id = $1 AND source = $2 AND date >= $3",
        )
        .bind(user_id)
        .bind(BusySource::ExternalCalendar.as_str())
        .bind(from_date)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let mut inserted = 0u64;
        for chunk in drafts.chunks(INSERT_CHUNK) {
            inserted += Self::insert_batch(&mut tx, chunk).await?;
        }

        tx.commit().await?;
        tracing::debug!(user_id, deleted, inserted, "Replaced imported busy blocks");
        Ok(inserted)
    }

    /// Multi-row INSERT of `drafts` within an existing transaction.
    async fn insert_batch(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        drafts: &[BusyBlockDraft],
    ) -> Result<u64, sqlx::Error> {
        if drafts.is_empty() {
            return Ok(0);
        }

        let mut query = format!("INSERT INTO busy_blocks ({INSERT_COLUMNS}) VALUES ");
        let mut param_idx = 1usize;
        for row in 0..drafts.len() {
            if row > 0 {
                query.push_str(", ");
            }
            query.push('(');
            for col in 0..INSERT_COLUMN_COUNT {
                if col > 0 {
                    query.push_str(", ");
                }
                query.push_str(&format!("${param_idx}"));
                param_idx += 1;
            }
            query.push(')');
        }

        let mut q = sqlx::query(&query);
        for draft in drafts {
            q = q
                .bind(draft.user_id)
                .bind(&draft.title)
                .bind(&draft.description)
                .bind(draft.date)
                .bind(draft.start_time)
                .bind(draft.end_time)
                .bind(&draft.color)
                .bind(draft.is_completed)
                .bind(draft.source.as_str());
        }
        Ok(q.execute(&mut **tx).await?.rows_affected())
    }
}
