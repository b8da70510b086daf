//! Ticket state machine and guard table.
//!
//! Each guarded operation takes a [`TicketSnapshot`] of the current row and
//! returns a [`TransitionPlan`] describing the writes to perform, or the
//! [`CoreError`] explaining why the transition is not allowed. Planning is
//! pure; the repository applies the plan as a single conditional update keyed
//! on the snapshot's status and assignee, so a concurrent writer causes the
//! update to match zero rows instead of silently overwriting.
//!
//! Privileged writes ([`plan_admin_update`]) go through the same table. Only
//! an explicit `force` lets an administrator leave a terminal state.

use crate::error::CoreError;
use crate::sla;
use crate::ticket_status::TicketStatus;
use crate::types::{DbId, Timestamp};

/// Maximum length of a rejection reason or resolution note.
pub const MAX_NOTE_LEN: usize = 4000;

/// Maximum length of a ticket title.
pub const MAX_TITLE_LEN: usize = 200;

// ---------------------------------------------------------------------------
// Audit actions
// ---------------------------------------------------------------------------

/// Audit action names written to `ticket_audit_logs.action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketAction {
    Accept,
    Reject,
    Close,
    Feedback,
    Schedule,
    AdminUpdate,
    AdminOverride,
}

impl TicketAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketAction::Accept => "accept",
            TicketAction::Reject => "reject",
            TicketAction::Close => "close",
            TicketAction::Feedback => "feedback",
            TicketAction::Schedule => "scheduled",
            TicketAction::AdminUpdate => "admin_update",
            TicketAction::AdminOverride => "admin_override",
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot and plan
// ---------------------------------------------------------------------------

/// The fields of a ticket the guard table looks at.
#[derive(Debug, Clone)]
pub struct TicketSnapshot {
    pub status: TicketStatus,
    pub created_by_id: DbId,
    pub assigned_to_id: Option<DbId>,
    pub created_at: Timestamp,
    pub accepted_at: Option<Timestamp>,
    pub response_time_minutes: Option<i32>,
    /// The resolved count was already incremented for this ticket.
    pub resolution_credited: bool,
}

/// Writes produced by a permitted transition.
///
/// `accepted_at` / `response_time_minutes` are only ever `Some` when the
/// snapshot had none; the repository writes them with `COALESCE` so the
/// first acceptance always wins.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub from: TicketStatus,
    pub to: TicketStatus,
    /// Expected assignee, used as the compare-and-swap guard.
    pub expected_assignee: Option<DbId>,
    pub assigned_to_id: Option<DbId>,
    pub accepted_at: Option<Timestamp>,
    pub response_time_minutes: Option<i32>,
    pub completed_at: Option<Timestamp>,
    pub resolution_time_minutes: Option<i32>,
    /// Leaving `completed`: completion stamps are cleared.
    pub clear_completion: bool,
    /// Technician whose lifetime resolved count is incremented. Only set
    /// the first time a ticket is completed.
    pub credit_resolution_to: Option<DbId>,
}

impl TransitionPlan {
    fn new(snapshot: &TicketSnapshot, to: TicketStatus) -> Self {
        Self {
            from: snapshot.status,
            to,
            expected_assignee: snapshot.assigned_to_id,
            assigned_to_id: snapshot.assigned_to_id,
            accepted_at: None,
            response_time_minutes: None,
            completed_at: None,
            resolution_time_minutes: None,
            clear_completion: snapshot.status == TicketStatus::Completed
                && to != TicketStatus::Completed,
            credit_resolution_to: None,
        }
    }

    /// Stamp first-acceptance timing if the ticket has none yet.
    fn stamp_acceptance(mut self, snapshot: &TicketSnapshot, now: Timestamp) -> Self {
        if snapshot.accepted_at.is_none() {
            self.accepted_at = Some(now);
            self.response_time_minutes = Some(sla::response_time(snapshot.created_at, now));
        }
        self
    }

    /// Stamp completion timing and credit the resolving technician.
    fn stamp_completion(mut self, snapshot: &TicketSnapshot, now: Timestamp) -> Self {
        let started = snapshot.accepted_at.or(self.accepted_at);
        self.completed_at = Some(now);
        self.resolution_time_minutes =
            Some(sla::resolution_time(snapshot.created_at, started, now));
        if !snapshot.resolution_credited {
            self.credit_resolution_to = self.assigned_to_id;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Statuses reachable from `from` without an override.
pub fn valid_transitions(from: TicketStatus) -> &'static [TicketStatus] {
    match from {
        TicketStatus::NotStart => &[
            TicketStatus::InProgress,
            TicketStatus::Completed,
            TicketStatus::Rejected,
        ],
        TicketStatus::InProgress => &[TicketStatus::Completed, TicketStatus::Rejected],
        TicketStatus::Completed | TicketStatus::Rejected => &[],
    }
}

pub fn can_transition(from: TicketStatus, to: TicketStatus) -> bool {
    valid_transitions(from).contains(&to)
}

/// Validate a state transition, returning an error message for invalid ones.
pub fn validate_transition(from: TicketStatus, to: TicketStatus) -> Result<(), String> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(format!("Invalid transition: {from} -> {to}"))
    }
}

fn ensure_open(snapshot: &TicketSnapshot, verb: &str) -> Result<(), CoreError> {
    if snapshot.status.is_terminal() {
        return Err(CoreError::Conflict(format!(
            "Cannot {verb} ticket: it is already {}",
            snapshot.status
        )));
    }
    Ok(())
}

fn ensure_assignee_or_admin(
    snapshot: &TicketSnapshot,
    actor_id: DbId,
    is_admin: bool,
    verb: &str,
) -> Result<(), CoreError> {
    match snapshot.assigned_to_id {
        Some(assignee) if assignee != actor_id && !is_admin => Err(CoreError::Forbidden(format!(
            "Only the assigned technician or an administrator may {verb} this ticket"
        ))),
        _ => Ok(()),
    }
}

/// `Ok(false)` when blank, `Ok(true)` when present, `Err` when too long.
fn note_present(value: &str, what: &str) -> Result<bool, CoreError> {
    let trimmed = value.trim();
    if trimmed.chars().count() > MAX_NOTE_LEN {
        return Err(CoreError::Validation(format!(
            "{what} must be at most {MAX_NOTE_LEN} characters"
        )));
    }
    Ok(!trimmed.is_empty())
}

// ---------------------------------------------------------------------------
// Guarded operations
// ---------------------------------------------------------------------------

/// Accept: `not_start|in_progress`, unassigned or assigned to the actor.
pub fn plan_accept(
    snapshot: &TicketSnapshot,
    actor_id: DbId,
    now: Timestamp,
) -> Result<TransitionPlan, CoreError> {
    ensure_open(snapshot, "accept")?;
    if let Some(assignee) = snapshot.assigned_to_id {
        if assignee != actor_id {
            return Err(CoreError::Conflict(
                "Cannot accept ticket: it is assigned to another technician".into(),
            ));
        }
    }

    let mut plan = TransitionPlan::new(snapshot, TicketStatus::InProgress);
    plan.assigned_to_id = Some(actor_id);
    Ok(plan.stamp_acceptance(snapshot, now))
}

/// Reject: any non-terminal status, with a reason.
pub fn plan_reject(
    snapshot: &TicketSnapshot,
    actor_id: DbId,
    is_admin: bool,
    reason: &str,
) -> Result<TransitionPlan, CoreError> {
    ensure_open(snapshot, "reject")?;
    if !note_present(reason, "Rejection reason")? {
        return Err(CoreError::Validation(
            "A rejection reason is required".into(),
        ));
    }
    ensure_assignee_or_admin(snapshot, actor_id, is_admin, "reject")?;

    let mut plan = TransitionPlan::new(snapshot, TicketStatus::Rejected);
    plan.assigned_to_id = Some(actor_id);
    Ok(plan)
}

/// Close: any non-terminal status, with a resolution note.
///
/// An unassigned ticket is closed by, and credited to, the actor.
pub fn plan_close(
    snapshot: &TicketSnapshot,
    actor_id: DbId,
    is_admin: bool,
    note: &str,
    now: Timestamp,
) -> Result<TransitionPlan, CoreError> {
    ensure_open(snapshot, "close")?;
    if !note_present(note, "Resolution note")? {
        return Err(CoreError::Conflict(format!(
            "Cannot close ticket in status {}: a resolution note is required",
            snapshot.status
        )));
    }
    ensure_assignee_or_admin(snapshot, actor_id, is_admin, "close")?;

    let mut plan = TransitionPlan::new(snapshot, TicketStatus::Completed);
    plan.assigned_to_id = snapshot.assigned_to_id.or(Some(actor_id));
    Ok(plan.stamp_completion(snapshot, now))
}

/// Booking a visit starts work on a ticket that has not started yet,
/// stamping first-acceptance timing. `Ok(None)` when work already started.
pub fn plan_schedule(
    snapshot: &TicketSnapshot,
    now: Timestamp,
) -> Result<Option<TransitionPlan>, CoreError> {
    ensure_open(snapshot, "schedule")?;
    if snapshot.status != TicketStatus::NotStart {
        return Ok(None);
    }
    let plan = TransitionPlan::new(snapshot, TicketStatus::InProgress);
    Ok(Some(plan.stamp_acceptance(snapshot, now)))
}

/// Privileged status write.
///
/// Without `force` the target must be a legal transition. With `force` any
/// canonical target is allowed. Timing fields follow the guarded paths.
/// Returns `Ok(None)` when the status does not change.
pub fn plan_admin_update(
    snapshot: &TicketSnapshot,
    target: TicketStatus,
    new_assignee: Option<DbId>,
    force: bool,
    now: Timestamp,
) -> Result<Option<TransitionPlan>, CoreError> {
    if target == snapshot.status {
        return Ok(None);
    }
    if !force {
        validate_transition(snapshot.status, target).map_err(CoreError::Conflict)?;
    }

    let mut plan = TransitionPlan::new(snapshot, target);
    if new_assignee.is_some() {
        plan.assigned_to_id = new_assignee;
    }
    let plan = match target {
        TicketStatus::InProgress => plan.stamp_acceptance(snapshot, now),
        TicketStatus::Completed => plan.stamp_completion(snapshot, now),
        TicketStatus::NotStart | TicketStatus::Rejected => plan,
    };
    Ok(Some(plan))
}

/// Feedback may be left by the requester or an administrator, in any status.
pub fn check_feedback_permission(
    snapshot: &TicketSnapshot,
    actor_id: DbId,
    is_admin: bool,
) -> Result<(), CoreError> {
    if snapshot.created_by_id == actor_id || is_admin {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            "Only the requester may submit feedback for this ticket".into(),
        ))
    }
}

/// Validate a new ticket's title.
pub fn validate_title(title: &str) -> Result<(), String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err("Title must not be empty".to_string());
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(format!("Title must be at most {MAX_TITLE_LEN} characters"));
    }
    Ok(())
}
