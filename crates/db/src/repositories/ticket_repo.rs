//! Repository for the `tickets` table.
//!
//! Status transitions are conditional updates keyed on the stored status
//! spelling and the expected assignee. A concurrent writer makes the update
//! match zero rows, which callers surface as a conflict.

use servicedesk_core::sus::CreditedRating;
use servicedesk_core::ticket_lifecycle::TransitionPlan;
use servicedesk_core::ticket_status::{variants_for, TicketStatus};
use servicedesk_core::types::DbId;
use sqlx::PgPool;

use crate::models::ticket::{
    CreateTicket, RatingLock, Ticket, TicketFeedback, TicketFilter, TransitionNotes,
    UpdateTicketDetails,
};

/// Column list for `tickets` queries.
const COLUMNS: &str = "\
    id, title, description, urgency, status, created_by_id, assigned_to_id, \
    accepted_at, completed_at, response_time_minutes, resolution_time_minutes, \
    rejection_reason, resolution_note, close_checklist, rating, sus_raw_answers, \
    feedback_comment, rating_credited_to, resolution_credited, created_at, updated_at";

/// `status` folded the same way the normalizer folds its input.
const FOLDED_STATUS: &str = "lower(translate(btrim(status), ' -', '__'))";

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// Provides CRUD and transition operations for tickets.
pub struct TicketRepo;

impl TicketRepo {
    /// Insert a new ticket in `not_start`.
    pub async fn create(
        pool: &PgPool,
        created_by_id: DbId,
        input: &CreateTicket,
    ) -> Result<Ticket, sqlx::Error> {
        let query = format!(
            "INSERT INTO tickets (title, description, urgency, status, created_by_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Ticket>(&query)
            .bind(input.title.trim())
            .bind(&input.description)
            .bind(input.urgency.id())
            .bind(TicketStatus::NotStart.as_str())
            .bind(created_by_id)
            .fetch_one(pool)
            .await
    }

    /// Find a ticket by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Ticket>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tickets WHERE id = $1");
        sqlx::query_as::<_, Ticket>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List tickets, most urgent first, then oldest first.
    ///
    /// A status filter matches every historical spelling of that status.
    /// Unrecognized spellings read as `not_start`, so that filter matches
    /// everything that is not a spelling of another status.
    pub async fn list(pool: &PgPool, filter: &TicketFilter) -> Result<Vec<Ticket>, sqlx::Error> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = filter.offset.unwrap_or(0).max(0);

        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx = 1u32;
        if let Some(status) = filter.status {
            conditions.push(if status == TicketStatus::NotStart {
                format!("NOT ({FOLDED_STATUS} = ANY(${bind_idx}))")
            } else {
                format!("{FOLDED_STATUS} = ANY(${bind_idx})")
            });
            bind_idx += 1;
        }
        if filter.assigned_to_id.is_some() {
            conditions.push(format!("assigned_to_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.created_by_id.is_some() {
            conditions.push(format!("created_by_id = ${bind_idx}"));
            bind_idx += 1;
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM tickets {where_clause} \
             ORDER BY urgency DESC, created_at ASC, id ASC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1
        );

        let mut q = sqlx::query_as::<_, Ticket>(&query);
        if let Some(status) = filter.status {
            q = q.bind(filter_spellings(status));
        }
        if let Some(assignee) = filter.assigned_to_id {
            q = q.bind(assignee);
        }
        if let Some(creator) = filter.created_by_id {
            q = q.bind(creator);
        }
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Apply a planned transition if the row still matches the snapshot it
    /// was planned from. Returns `None` when it no longer does.
    ///
    /// First-acceptance fields are written with `COALESCE`, so a value that
    /// is already set is never overwritten. Completion stamps are cleared
    /// when the plan leaves `completed`.
    pub async fn apply_transition(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: DbId,
        expected_raw_status: &str,
        plan: &TransitionPlan,
        notes: &TransitionNotes,
    ) -> Result<Option<Ticket>, sqlx::Error> {
        let query = format!(
            "UPDATE tickets SET \
                status = $1, \
                assigned_to_id = $2, \
                accepted_at = COALESCE(accepted_at, $3), \
                response_time_minutes = COALESCE(response_time_minutes, $4), \
                completed_at = CASE WHEN $13 THEN NULL \
                    ELSE COALESCE($5, completed_at) END, \
                resolution_time_minutes = CASE WHEN $13 THEN NULL \
                    ELSE COALESCE($6, resolution_time_minutes) END, \
                resolution_credited = resolution_credited OR $14, \
                rejection_reason = COALESCE($7, rejection_reason), \
                resolution_note = COALESCE($8, resolution_note), \
                close_checklist = COALESCE($9, close_checklist), \
                updated_at = NOW() \
             WHERE id = $10 \
               AND status = $11 \
               AND assigned_to_id IS NOT DISTINCT FROM $12 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Ticket>(&query)
            .bind(plan.to.as_str())
            .bind(plan.assigned_to_id)
            .bind(plan.accepted_at)
            .bind(plan.response_time_minutes)
            .bind(plan.completed_at)
            .bind(plan.resolution_time_minutes)
            .bind(&notes.rejection_reason)
            .bind(&notes.resolution_note)
            .bind(&notes.close_checklist)
            .bind(id)
            .bind(expected_raw_status)
            .bind(plan.expected_assignee)
            .bind(plan.clear_completion)
            .bind(plan.credit_resolution_to.is_some())
            .fetch_optional(&mut **tx)
            .await
    }

    /// Update non-status fields. Returns `None` if the ticket does not exist.
    pub async fn update_details(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: DbId,
        input: &UpdateTicketDetails,
    ) -> Result<Option<Ticket>, sqlx::Error> {
        let query = format!(
            "UPDATE tickets SET \
                title = COALESCE($1, title), \
                description = COALESCE($2, description), \
                urgency = COALESCE($3, urgency), \
                assigned_to_id = COALESCE($4, assigned_to_id), \
                updated_at = NOW() \
             WHERE id = $5 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Ticket>(&query)
            .bind(input.title.as_deref().map(str::trim))
            .bind(&input.description)
            .bind(input.urgency.map(|u| u.id()))
            .bind(input.assigned_to_id)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Lock the ticket row for a rating change. `None` when the ticket does
    /// not exist.
    pub async fn lock_rating(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: DbId,
    ) -> Result<Option<RatingLock>, sqlx::Error> {
        let row: Option<(Option<i16>, Option<DbId>, Option<DbId>)> = sqlx::query_as(
            "SELECT rating, rating_credited_to, assigned_to_id \
             FROM tickets WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(|(rating, credited_to, assigned_to_id)| RatingLock {
            prior: rating
                .zip(credited_to)
                .map(|(rating, technician)| CreditedRating { rating, technician }),
            assigned_to_id,
        }))
    }

    /// Store feedback on a ticket whose row is already locked.
    pub async fn record_feedback(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: DbId,
        feedback: &TicketFeedback,
    ) -> Result<Ticket, sqlx::Error> {
        let query = format!(
            "UPDATE tickets SET \
                rating = $1, \
                sus_raw_answers = $2, \
                feedback_comment = $3, \
                rating_credited_to = $4, \
                updated_at = NOW() \
             WHERE id = $5 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Ticket>(&query)
            .bind(feedback.rating)
            .bind(&feedback.sus_raw_answers)
            .bind(&feedback.comment)
            .bind(feedback.credited_to)
            .bind(id)
            .fetch_one(&mut **tx)
            .await
    }
}

/// Spellings bound for a status filter: those of `status` itself, or for
/// `not_start` those of every other status (the condition is negated).
fn filter_spellings(status: TicketStatus) -> Vec<String> {
    let statuses: Vec<TicketStatus> = if status == TicketStatus::NotStart {
        TicketStatus::ALL
            .into_iter()
            .filter(|s| *s != TicketStatus::NotStart)
            .collect()
    } else {
        vec![status]
    };
    statuses
        .into_iter()
        .flat_map(|s| variants_for(s).iter().map(|v| v.to_string()))
        .collect()
}
