//! Ticket lifecycle: creation, the guarded accept/reject/close transitions,
//! feedback, and the privileged update path.

use serde::Deserialize;
use servicedesk_core::error::CoreError;
use servicedesk_core::sus;
use servicedesk_core::ticket_lifecycle::{self, TicketAction, TransitionPlan};
use servicedesk_core::ticket_status::{self, TicketStatus};
use servicedesk_core::types::DbId;
use servicedesk_db::models::audit::{NewTicketAudit, TicketAuditLog};
use servicedesk_db::models::ticket::{
    CreateTicket, RatingLock, Ticket, TicketFeedback, TicketFilter, TransitionNotes,
    UpdateTicketDetails,
};
use servicedesk_db::repositories::{TechnicianStatsRepo, TicketAuditRepo, TicketRepo};
use servicedesk_db::DbPool;
use servicedesk_events::{notify, Notice, NotificationKind};

use super::{load_ticket, modified_concurrently};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Privileged changes to a ticket. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminTicketUpdate {
    #[serde(flatten)]
    pub details: UpdateTicketDetails,
    /// Target status; any recognized spelling.
    pub status: Option<String>,
    /// Allow a status change the state machine would refuse.
    #[serde(default, alias = "override")]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

pub async fn get_ticket(pool: &DbPool, id: DbId) -> AppResult<Ticket> {
    load_ticket(pool, id).await
}

pub async fn list_tickets(pool: &DbPool, filter: &TicketFilter) -> AppResult<Vec<Ticket>> {
    Ok(TicketRepo::list(pool, filter).await?)
}

pub async fn list_audit(pool: &DbPool, id: DbId) -> AppResult<Vec<TicketAuditLog>> {
    load_ticket(pool, id).await?;
    Ok(TicketAuditRepo::list_for_ticket(pool, id).await?)
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

pub async fn create_ticket(
    state: &AppState,
    actor: &AuthUser,
    input: &CreateTicket,
) -> AppResult<Ticket> {
    ticket_lifecycle::validate_title(&input.title).map_err(CoreError::Validation)?;

    let ticket = TicketRepo::create(&state.pool, actor.user_id, input).await?;
    tracing::info!(
        ticket_id = ticket.id,
        created_by = actor.user_id,
        urgency = ticket.urgency().as_str(),
        "Ticket created"
    );
    Ok(ticket)
}

// ---------------------------------------------------------------------------
// Guarded transitions
// ---------------------------------------------------------------------------

/// Apply `plan` to `ticket` with its audit entry and any resolution credit,
/// all in one transaction. Fails with a conflict if the row changed since
/// `ticket` was read.
async fn apply_plan(
    state: &AppState,
    ticket: &Ticket,
    plan: &TransitionPlan,
    notes: &TransitionNotes,
    audit: NewTicketAudit,
) -> AppResult<Ticket> {
    let mut tx = state.pool.begin().await?;

    let updated = TicketRepo::apply_transition(&mut tx, ticket.id, &ticket.raw_status, plan, notes)
        .await?
        .ok_or_else(|| modified_concurrently("Ticket"))?;

    TicketAuditRepo::append(
        &mut tx,
        &audit.with_transition(plan.from.as_str(), plan.to.as_str()),
    )
    .await?;

    if let Some(technician) = plan.credit_resolution_to {
        TechnicianStatsRepo::increment_resolved(&mut tx, technician).await?;
    }

    tx.commit().await?;
    Ok(updated)
}

fn notify_requester(
    state: &AppState,
    ticket: &Ticket,
    kind: NotificationKind,
    title: &str,
    message: String,
) {
    notify(
        &state.event_bus,
        Notice::new(ticket.created_by_id, Some(ticket.id), kind, title, message),
    );
}

pub async fn accept_ticket(state: &AppState, actor: &AuthUser, id: DbId) -> AppResult<Ticket> {
    let ticket = load_ticket(&state.pool, id).await?;
    let plan =
        ticket_lifecycle::plan_accept(&ticket.snapshot(), actor.user_id, state.clock.now())?;

    let audit = NewTicketAudit::new(id, actor.user_id, TicketAction::Accept);
    let updated = apply_plan(state, &ticket, &plan, &TransitionNotes::default(), audit).await?;

    tracing::info!(
        ticket_id = id,
        actor_id = actor.user_id,
        response_time_minutes = updated.response_time_minutes,
        "Ticket accepted"
    );
    notify_requester(
        state,
        &updated,
        NotificationKind::TicketAccepted,
        "Ticket accepted",
        format!("A technician is now working on \"{}\".", updated.title),
    );
    Ok(updated)
}

pub async fn reject_ticket(
    state: &AppState,
    actor: &AuthUser,
    id: DbId,
    reason: &str,
) -> AppResult<Ticket> {
    let ticket = load_ticket(&state.pool, id).await?;
    let plan =
        ticket_lifecycle::plan_reject(&ticket.snapshot(), actor.user_id, actor.is_admin(), reason)?;

    let reason = reason.trim();
    let notes = TransitionNotes {
        rejection_reason: Some(reason.to_string()),
        ..Default::default()
    };
    let audit = NewTicketAudit::new(id, actor.user_id, TicketAction::Reject).with_detail(reason);
    let updated = apply_plan(state, &ticket, &plan, &notes, audit).await?;

    tracing::info!(ticket_id = id, actor_id = actor.user_id, "Ticket rejected");
    notify_requester(
        state,
        &updated,
        NotificationKind::TicketRejected,
        "Ticket rejected",
        format!("\"{}\" was rejected: {reason}", updated.title),
    );
    Ok(updated)
}

pub async fn close_ticket(
    state: &AppState,
    actor: &AuthUser,
    id: DbId,
    note: &str,
    checklist: Option<serde_json::Value>,
) -> AppResult<Ticket> {
    let ticket = load_ticket(&state.pool, id).await?;
    let plan = ticket_lifecycle::plan_close(
        &ticket.snapshot(),
        actor.user_id,
        actor.is_admin(),
        note,
        state.clock.now(),
    )?;

    let note = note.trim();
    let notes = TransitionNotes {
        resolution_note: Some(note.to_string()),
        close_checklist: checklist,
        ..Default::default()
    };
    let audit = NewTicketAudit::new(id, actor.user_id, TicketAction::Close).with_detail(note);
    let updated = apply_plan(state, &ticket, &plan, &notes, audit).await?;

    tracing::info!(
        ticket_id = id,
        actor_id = actor.user_id,
        resolution_time_minutes = updated.resolution_time_minutes,
        "Ticket closed"
    );
    notify_requester(
        state,
        &updated,
        NotificationKind::TicketClosed,
        "Ticket resolved",
        format!("\"{}\" has been resolved. Please rate the service.", updated.title),
    );
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

/// Store SUS feedback and fold the rating into the assigned technician's
/// average. Resubmitting replaces the earlier rating in whichever
/// technician's totals it was counted.
pub async fn submit_feedback(
    state: &AppState,
    actor: &AuthUser,
    id: DbId,
    answers: Vec<i16>,
    comment: Option<String>,
) -> AppResult<Ticket> {
    let ticket = load_ticket(&state.pool, id).await?;
    ticket_lifecycle::check_feedback_permission(
        &ticket.snapshot(),
        actor.user_id,
        actor.is_admin(),
    )?;
    let rating = sus::sus_rating(&answers).map_err(CoreError::Validation)?;

    let mut tx = state.pool.begin().await?;
    // The assignee is re-read under the row lock; it may have changed.
    let RatingLock {
        prior,
        assigned_to_id: assignee,
    } = TicketRepo::lock_rating(&mut tx, id)
        .await?
        .ok_or(CoreError::NotFound { entity: "Ticket", id })?;

    let feedback = TicketFeedback {
        rating,
        sus_raw_answers: answers,
        comment: comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        credited_to: assignee,
    };
    let updated = TicketRepo::record_feedback(&mut tx, id, &feedback).await?;

    for (technician, delta) in sus::rating_deltas(prior, assignee, rating) {
        TechnicianStatsRepo::apply_rating_delta(&mut tx, technician, delta).await?;
    }

    TicketAuditRepo::append(
        &mut tx,
        &NewTicketAudit::new(id, actor.user_id, TicketAction::Feedback)
            .with_detail(format!("SUS rating {rating}")),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        ticket_id = id,
        rating,
        credited_to = assignee,
        previously_credited_to = prior.map(|p| p.technician),
        "Feedback recorded"
    );
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Privileged update
// ---------------------------------------------------------------------------

fn has_detail_changes(details: &UpdateTicketDetails) -> bool {
    details.title.is_some()
        || details.description.is_some()
        || details.urgency.is_some()
        || details.assigned_to_id.is_some()
}

/// Administrator write path. Status changes go through the guard table;
/// `force` permits any canonical target and is audited as an override.
pub async fn admin_update_ticket(
    state: &AppState,
    actor: &AuthUser,
    id: DbId,
    update: AdminTicketUpdate,
) -> AppResult<Ticket> {
    let ticket = load_ticket(&state.pool, id).await?;

    if let Some(title) = &update.details.title {
        ticket_lifecycle::validate_title(title).map_err(CoreError::Validation)?;
    }
    let target: Option<TicketStatus> = update
        .status
        .as_deref()
        .map(ticket_status::parse_strict)
        .transpose()
        .map_err(CoreError::Validation)?;

    let plan = match target {
        Some(target) => ticket_lifecycle::plan_admin_update(
            &ticket.snapshot(),
            target,
            update.details.assigned_to_id,
            update.force,
            state.clock.now(),
        )?,
        None => None,
    };

    // The transition already carries the new assignee.
    let details = UpdateTicketDetails {
        assigned_to_id: if plan.is_some() {
            None
        } else {
            update.details.assigned_to_id
        },
        ..update.details
    };

    if plan.is_none() && !has_detail_changes(&details) {
        return Ok(ticket);
    }

    let action = if update.force && plan.is_some() {
        TicketAction::AdminOverride
    } else {
        TicketAction::AdminUpdate
    };

    let mut tx = state.pool.begin().await?;
    let mut current = ticket.clone();
    let mut audit = NewTicketAudit::new(id, actor.user_id, action);

    if let Some(plan) = &plan {
        current = TicketRepo::apply_transition(
            &mut tx,
            id,
            &ticket.raw_status,
            plan,
            &TransitionNotes::default(),
        )
        .await?
        .ok_or_else(|| modified_concurrently("Ticket"))?;
        if let Some(technician) = plan.credit_resolution_to {
            TechnicianStatsRepo::increment_resolved(&mut tx, technician).await?;
        }
        audit = audit.with_transition(plan.from.as_str(), plan.to.as_str());
    }

    if has_detail_changes(&details) {
        current = TicketRepo::update_details(&mut tx, id, &details)
            .await?
            .ok_or(CoreError::NotFound { entity: "Ticket", id })?;
        let changed: Vec<&str> = [
            ("title", details.title.is_some()),
            ("description", details.description.is_some()),
            ("urgency", details.urgency.is_some()),
            ("assigned_to_id", details.assigned_to_id.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect();
        audit = audit.with_detail(format!("changed: {}", changed.join(", ")));
    }

    TicketAuditRepo::append(&mut tx, &audit).await?;
    tx.commit().await?;

    tracing::info!(
        ticket_id = id,
        actor_id = actor.user_id,
        action = action.as_str(),
        status = current.status().as_str(),
        "Ticket updated by administrator"
    );
    notify_requester(
        state,
        &current,
        NotificationKind::TicketUpdated,
        "Ticket updated",
        format!("\"{}\" was updated by an administrator.", current.title),
    );
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_update_accepts_override_alias() {
        let update: AdminTicketUpdate = serde_json::from_value(serde_json::json!({
            "status": "Done",
            "override": true,
            "title": "Renamed",
        }))
        .unwrap();
        assert!(update.force);
        assert_eq!(update.status.as_deref(), Some("Done"));
        assert_eq!(update.details.title.as_deref(), Some("Renamed"));
    }

    #[test]
    fn empty_details_are_detected() {
        assert!(!has_detail_changes(&UpdateTicketDetails::default()));
        assert!(has_detail_changes(&UpdateTicketDetails {
            urgency: Some(servicedesk_core::urgency::Urgency::High),
            ..Default::default()
        }));
    }
}
