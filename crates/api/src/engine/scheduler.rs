//! Appointment booking, the reschedule workflow, and cancellation.
//!
//! Both conflict checks run here before any write; the database constraints
//! on `appointments` catch whatever races past them. Calendar mirroring is
//! best-effort and bounded by the calendar timeout.

use std::future::Future;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Deserialize;
use servicedesk_calendar::{CalendarError, CalendarProvider, NewCalendarEvent};
use servicedesk_core::appointment::{
    self, BookedSlot, BusyWindow, RescheduleDecision, Slot, RESCHEDULE_INITIATOR_IT,
};
use servicedesk_core::error::CoreError;
use servicedesk_core::ticket_lifecycle::{self, TicketAction};
use servicedesk_core::types::{DbId, Timestamp};
use servicedesk_db::models::appointment::{Appointment, CreateAppointment, RescheduleProposal};
use servicedesk_db::models::audit::NewTicketAudit;
use servicedesk_db::models::busy_block::BusyBlock;
use servicedesk_db::models::ticket::{Ticket, TransitionNotes};
use servicedesk_db::repositories::{AppointmentRepo, BusyBlockRepo, TicketAuditRepo, TicketRepo};
use servicedesk_events::{notify, Notice, NotificationKind};

use super::{load_appointment, load_ticket, modified_concurrently};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Request body for booking an appointment. `date` and `time` are read in
/// the configured scheduling offset.
#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointment {
    pub ticket_id: DbId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub note: Option<String>,
}

/// A technician's proposal to move an appointment.
#[derive(Debug, Clone, Deserialize)]
pub struct ProposeReschedule {
    pub new_date: NaiveDate,
    pub new_time: NaiveTime,
    pub reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

pub async fn get_appointment(state: &AppState, id: DbId) -> AppResult<Appointment> {
    load_appointment(&state.pool, id).await
}

/// A technician's appointments starting on local dates `from..=to`.
pub async fn list_technician_appointments(
    state: &AppState,
    technician_id: DbId,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<Vec<Appointment>> {
    if to < from {
        return Err(AppError::BadRequest(
            "'to' must not be before 'from'".to_string(),
        ));
    }
    let zone = state.config.schedule_offset;
    let start = Slot::from_local(from, NaiveTime::MIN, zone)?.start;
    let end = Slot::from_local(to, NaiveTime::MIN, zone)?.start + Duration::days(1);
    Ok(AppointmentRepo::list_for_technician(&state.pool, technician_id, start, end).await?)
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

/// Run both conflict checks for `technician_id` against `slot`, ignoring
/// `exclude`.
async fn ensure_available(
    state: &AppState,
    technician_id: DbId,
    slot: &Slot,
    exclude: Option<DbId>,
) -> AppResult<()> {
    let zone = state.config.schedule_offset;

    let booked: Vec<BookedSlot> =
        AppointmentRepo::list_active_overlapping(&state.pool, technician_id, slot)
            .await?
            .iter()
            .map(Appointment::booked_slot)
            .collect();

    let dates = slot.local_dates(zone);
    let blocks: Vec<BusyWindow> =
        BusyBlockRepo::list_candidates(&state.pool, technician_id, slot, &dates)
            .await?
            .iter()
            .map(BusyBlock::window)
            .collect();

    appointment::check_availability(slot, zone, &booked, &blocks, exclude)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Calendar mirroring
// ---------------------------------------------------------------------------

/// Provider and calendar id, when mirroring is set up.
fn mirror_target(state: &AppState) -> Option<(Arc<dyn CalendarProvider>, String)> {
    let calendar_id = state
        .config
        .calendar
        .technician_calendar_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())?;
    let provider = state.calendar.provider().ok()?;
    Some((Arc::clone(provider), calendar_id.to_string()))
}

/// Await a calendar call under the calendar timeout. Failures are logged
/// and swallowed.
async fn best_effort<T>(
    state: &AppState,
    appointment_id: DbId,
    operation: &'static str,
    call: impl Future<Output = Result<T, CalendarError>>,
) -> Option<T> {
    let outcome = tokio::time::timeout(state.config.calendar.timeout, call)
        .await
        .unwrap_or(Err(CalendarError::Timeout));
    match outcome {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                appointment_id,
                operation,
                code = e.classify().kind.code(),
                error = %e,
                "Calendar mirroring failed"
            );
            None
        }
    }
}

fn calendar_event(ticket: &Ticket, slot: &Slot, note: Option<&str>) -> NewCalendarEvent {
    let mut description = format!("Ticket #{}", ticket.id);
    if let Some(body) = ticket.description.as_deref().filter(|d| !d.trim().is_empty()) {
        description.push_str("\n\n");
        description.push_str(body.trim());
    }
    if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
        description.push_str("\n\nNote: ");
        description.push_str(note.trim());
    }
    NewCalendarEvent {
        summary: format!("Service appointment: {}", ticket.title),
        description: Some(description),
        start: slot.start,
        end: slot.end,
    }
}

fn format_local(state: &AppState, at: Timestamp) -> String {
    at.with_timezone(&state.config.schedule_offset)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

// ---------------------------------------------------------------------------
// Booking
// ---------------------------------------------------------------------------

/// Book the ticket's assigned technician for one hour at `date` `time`.
pub async fn create_appointment(
    state: &AppState,
    actor: &AuthUser,
    input: &BookAppointment,
) -> AppResult<Appointment> {
    let ticket = load_ticket(&state.pool, input.ticket_id).await?;
    let active = AppointmentRepo::find_active_for_ticket(&state.pool, ticket.id).await?;
    let technician_id =
        appointment::ensure_bookable(ticket.status(), ticket.assigned_to_id, active.is_some())?;

    if technician_id != actor.user_id && !actor.is_admin() {
        return Err(CoreError::Forbidden(
            "Only the assigned technician can book this ticket".into(),
        )
        .into());
    }

    let slot = Slot::from_local(input.date, input.time, state.config.schedule_offset)?;
    ensure_available(state, technician_id, &slot, None).await?;
    let start_work = ticket_lifecycle::plan_schedule(&ticket.snapshot(), state.clock.now())?;

    let mut tx = state.pool.begin().await?;
    if let Some(plan) = &start_work {
        TicketRepo::apply_transition(
            &mut tx,
            ticket.id,
            &ticket.raw_status,
            plan,
            &TransitionNotes::default(),
        )
        .await?
        .ok_or_else(|| modified_concurrently("Ticket"))?;
    }
    let created = AppointmentRepo::create(
        &mut tx,
        &CreateAppointment {
            ticket_id: ticket.id,
            it_support_id: technician_id,
            slot,
            note: input.note.clone(),
        },
    )
    .await?;
    TicketAuditRepo::append(
        &mut tx,
        &NewTicketAudit::new(ticket.id, actor.user_id, TicketAction::Schedule)
            .with_transition(ticket.status().as_str(), TicketAction::Schedule.as_str())
            .with_detail(format!("appointment {} at {}", created.id, slot.start.to_rfc3339())),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        appointment_id = created.id,
        ticket_id = ticket.id,
        technician_id,
        scheduled_at = %created.scheduled_at,
        "Appointment scheduled"
    );

    let mut appointment = created;
    if let Some((provider, calendar_id)) = mirror_target(state) {
        let event = calendar_event(&ticket, &slot, input.note.as_deref());
        let mirrored = best_effort(
            state,
            appointment.id,
            "create",
            provider.create_event(&calendar_id, &event),
        )
        .await;
        if let Some(event_id) = mirrored {
            match AppointmentRepo::set_external_event_id(&state.pool, appointment.id, &event_id)
                .await
            {
                Ok(()) => appointment.external_event_id = Some(event_id),
                Err(e) => tracing::warn!(
                    appointment_id = appointment.id,
                    error = %e,
                    "Failed to store external event id"
                ),
            }
        }
    }

    notify(
        &state.event_bus,
        Notice::new(
            technician_id,
            Some(ticket.id),
            NotificationKind::AppointmentScheduled,
            "Appointment scheduled",
            format!(
                "\"{}\" is booked for {}.",
                ticket.title,
                format_local(state, appointment.scheduled_at)
            ),
        ),
    );
    Ok(appointment)
}

// ---------------------------------------------------------------------------
// Reschedule workflow
// ---------------------------------------------------------------------------

/// Stage a new time for the requester to accept or decline. A pending
/// proposal is replaced.
pub async fn request_reschedule(
    state: &AppState,
    actor: &AuthUser,
    id: DbId,
    input: &ProposeReschedule,
) -> AppResult<Appointment> {
    let current = load_appointment(&state.pool, id).await?;
    if current.it_support_id != actor.user_id && !actor.is_admin() {
        return Err(CoreError::Forbidden(
            "Only the assigned technician can propose a new time".into(),
        )
        .into());
    }
    appointment::ensure_can_request_reschedule(current.status())?;

    let proposed = Slot::from_local(input.new_date, input.new_time, state.config.schedule_offset)?;
    let reason = input
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    let updated = AppointmentRepo::request_reschedule(
        &state.pool,
        id,
        &RescheduleProposal {
            new_date: proposed.start,
            reason: reason.clone(),
            initiator: RESCHEDULE_INITIATOR_IT.to_string(),
        },
    )
    .await?
    .ok_or_else(|| modified_concurrently("Appointment"))?;

    tracing::info!(
        appointment_id = id,
        actor_id = actor.user_id,
        new_date = %proposed.start,
        "Reschedule requested"
    );

    let ticket = load_ticket(&state.pool, updated.ticket_id).await?;
    let mut message = format!(
        "A new time was proposed for \"{}\": {}.",
        ticket.title,
        format_local(state, proposed.start)
    );
    if let Some(reason) = reason {
        message.push_str(&format!(" Reason: {reason}"));
    }
    notify(
        &state.event_bus,
        Notice::new(
            ticket.created_by_id,
            Some(ticket.id),
            NotificationKind::RescheduleRequested,
            "Reschedule requested",
            message,
        ),
    );
    Ok(updated)
}

/// Accept or decline a pending proposal. Accepting re-checks the proposed
/// slot against the technician's current calendar.
pub async fn respond_reschedule(
    state: &AppState,
    actor: &AuthUser,
    id: DbId,
    decision: RescheduleDecision,
) -> AppResult<Appointment> {
    let current = load_appointment(&state.pool, id).await?;
    let ticket = load_ticket(&state.pool, current.ticket_id).await?;
    if ticket.created_by_id != actor.user_id && !actor.is_admin() {
        return Err(CoreError::Forbidden(
            "Only the requester can respond to a reschedule".into(),
        )
        .into());
    }
    let proposed = appointment::ensure_reschedule_pending(current.status(), current.new_date)?;

    let (updated, kind, title, message) = match decision {
        RescheduleDecision::Accept => {
            let slot = Slot::starting_at(proposed);
            ensure_available(state, current.it_support_id, &slot, Some(id)).await?;

            let updated = AppointmentRepo::commit_reschedule(&state.pool, id, &slot)
                .await?
                .ok_or_else(|| modified_concurrently("Appointment"))?;

            if let (Some(event_id), Some((provider, calendar_id))) =
                (updated.external_event_id.as_deref(), mirror_target(state))
            {
                let event = calendar_event(&ticket, &slot, updated.note.as_deref());
                best_effort(
                    state,
                    id,
                    "update",
                    provider.update_event(&calendar_id, event_id, &event),
                )
                .await;
            }

            let message = format!(
                "The new time for \"{}\" was accepted: {}.",
                ticket.title,
                format_local(state, slot.start)
            );
            (
                updated,
                NotificationKind::RescheduleAccepted,
                "Reschedule accepted",
                message,
            )
        }
        RescheduleDecision::Reject => {
            let updated = AppointmentRepo::discard_reschedule(&state.pool, id)
                .await?
                .ok_or_else(|| modified_concurrently("Appointment"))?;
            let message = format!(
                "The proposed time for \"{}\" was declined; the original time stands.",
                ticket.title
            );
            (
                updated,
                NotificationKind::RescheduleDeclined,
                "Reschedule declined",
                message,
            )
        }
    };

    tracing::info!(
        appointment_id = id,
        actor_id = actor.user_id,
        decision = ?decision,
        "Reschedule answered"
    );
    notify(
        &state.event_bus,
        Notice::new(updated.it_support_id, Some(ticket.id), kind, title, message),
    );
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// Cancel an appointment, releasing its slot and the ticket's booking.
pub async fn cancel_appointment(
    state: &AppState,
    actor: &AuthUser,
    id: DbId,
) -> AppResult<Appointment> {
    let current = load_appointment(&state.pool, id).await?;
    let ticket = load_ticket(&state.pool, current.ticket_id).await?;
    let involved = current.it_support_id == actor.user_id || ticket.created_by_id == actor.user_id;
    if !involved && !actor.is_admin() {
        return Err(CoreError::Forbidden(
            "Only the technician, the requester, or an admin can cancel".into(),
        )
        .into());
    }
    appointment::ensure_can_cancel(current.status())?;

    let cancelled = AppointmentRepo::cancel(&state.pool, id)
        .await?
        .ok_or_else(|| modified_concurrently("Appointment"))?;

    tracing::info!(appointment_id = id, actor_id = actor.user_id, "Appointment cancelled");

    if let (Some(event_id), Some((provider, calendar_id))) =
        (cancelled.external_event_id.as_deref(), mirror_target(state))
    {
        best_effort(
            state,
            id,
            "delete",
            provider.delete_event(&calendar_id, event_id),
        )
        .await;
    }

    notify(
        &state.event_bus,
        Notice::new(
            ticket.created_by_id,
            Some(ticket.id),
            NotificationKind::AppointmentCancelled,
            "Appointment cancelled",
            format!(
                "The appointment for \"{}\" on {} was cancelled.",
                ticket.title,
                format_local(state, cancelled.scheduled_at)
            ),
        ),
    );
    Ok(cancelled)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn booking_body_reads_plain_date_and_time() {
        let body: BookAppointment = serde_json::from_str(
            r#"{"ticket_id": 4, "date": "2026-06-15", "time": "09:30:00", "note": null}"#,
        )
        .unwrap();
        assert_eq!(body.ticket_id, 4);
        assert_eq!(body.date, NaiveDate::from_ymd_opt(2026, 6, 15).unwrap());
        assert_eq!(body.time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
    }

    #[test]
    fn calendar_event_spans_the_slot_and_names_the_ticket() {
        let ticket = Ticket {
            id: 12,
            title: "Printer jam".into(),
            description: Some("  Third floor  ".into()),
            urgency: 2,
            raw_status: "in_progress".into(),
            created_by_id: 1,
            assigned_to_id: Some(2),
            accepted_at: None,
            completed_at: None,
            response_time_minutes: None,
            resolution_time_minutes: None,
            rejection_reason: None,
            resolution_note: None,
            close_checklist: None,
            rating: None,
            sus_raw_answers: None,
            feedback_comment: None,
            rating_credited_to: None,
            resolution_credited: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let slot = Slot::starting_at(Utc.with_ymd_and_hms(2026, 6, 15, 9, 0, 0).unwrap());

        let event = calendar_event(&ticket, &slot, Some("bring toner"));

        assert_eq!(event.summary, "Service appointment: Printer jam");
        assert_eq!(event.start, slot.start);
        assert_eq!(event.end, slot.end);
        assert_eq!(
            event.description.as_deref(),
            Some("Ticket #12\n\nThird floor\n\nNote: bring toner")
        );
    }
}
