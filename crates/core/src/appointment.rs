//! Appointment slots, availability checks, and the reschedule workflow.
//!
//! Every appointment occupies a fixed 60-minute half-open interval
//! `[scheduled_at, scheduled_at + 60min)`. Two intervals conflict when
//! `a.start < b.end && a.end > b.start`, so back-to-back bookings are allowed.

use chrono::{Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ticket_status::TicketStatus;
use crate::types::{DbId, Timestamp};

/// Length of every appointment.
pub const APPOINTMENT_DURATION_MINUTES: i64 = 60;

/// Initiator recorded when a technician proposes a new time.
pub const RESCHEDULE_INITIATOR_IT: &str = "IT";

/// Conflict message for an overlapping appointment.
pub const BUSY_APPOINTMENT: &str = "busy: appointment overlap";

/// Conflict message for an overlapping personal or imported busy block.
pub const BUSY_PERSONAL_TASK: &str = "busy: personal task";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    RescheduleRequested,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::RescheduleRequested => "reschedule_requested",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "scheduled" => Some(AppointmentStatus::Scheduled),
            "reschedule_requested" => Some(AppointmentStatus::RescheduleRequested),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// A half-open time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Slot {
    /// The appointment-length slot beginning at `start`.
    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            start,
            end: start + Duration::minutes(APPOINTMENT_DURATION_MINUTES),
        }
    }

    /// Combine a local date and time in the scheduling zone.
    pub fn from_local(
        date: NaiveDate,
        time: NaiveTime,
        zone: FixedOffset,
    ) -> Result<Self, CoreError> {
        let start = zone
            .from_local_datetime(&date.and_time(time))
            .single()
            .ok_or_else(|| CoreError::Validation(format!("Invalid local time {date} {time}")))?;
        Ok(Self::starting_at(start.to_utc()))
    }

    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Local dates touched by this slot (one, or two when it crosses midnight).
    pub fn local_dates(&self, zone: FixedOffset) -> Vec<NaiveDate> {
        let first = self.start.with_timezone(&zone).date_naive();
        let last = (self.end - Duration::nanoseconds(1))
            .with_timezone(&zone)
            .date_naive();
        if first == last {
            vec![first]
        } else {
            vec![first, last]
        }
    }
}

/// An existing booking considered by the overlap check.
#[derive(Debug, Clone, Copy)]
pub struct BookedSlot {
    pub appointment_id: DbId,
    pub scheduled_at: Timestamp,
}

/// A busy block considered by the overlap check. Missing start or end means
/// the whole `date` is busy.
#[derive(Debug, Clone, Copy)]
pub struct BusyWindow {
    pub date: NaiveDate,
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
}

impl BusyWindow {
    fn conflicts_with(&self, slot: &Slot, slot_dates: &[NaiveDate]) -> bool {
        match (self.start, self.end) {
            (Some(start), Some(end)) => slot.overlaps(&Slot { start, end }),
            _ => slot_dates.contains(&self.date),
        }
    }
}

/// Check `slot` against a technician's bookings and busy blocks.
///
/// `exclude` skips one appointment, so a reschedule is not blocked by the
/// booking it is moving.
pub fn check_availability(
    slot: &Slot,
    zone: FixedOffset,
    booked: &[BookedSlot],
    blocks: &[BusyWindow],
    exclude: Option<DbId>,
) -> Result<(), CoreError> {
    let appointment_clash = booked
        .iter()
        .filter(|b| Some(b.appointment_id) != exclude)
        .any(|b| slot.overlaps(&Slot::starting_at(b.scheduled_at)));
    if appointment_clash {
        return Err(CoreError::Conflict(BUSY_APPOINTMENT.into()));
    }

    let dates = slot.local_dates(zone);
    if blocks.iter().any(|b| b.conflicts_with(slot, &dates)) {
        return Err(CoreError::Conflict(BUSY_PERSONAL_TASK.into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Booking guards
// ---------------------------------------------------------------------------

/// A ticket can be booked once it is assigned, still open, and has no
/// active appointment. Returns the technician to book.
pub fn ensure_bookable(
    status: TicketStatus,
    assigned_to_id: Option<DbId>,
    has_active_appointment: bool,
) -> Result<DbId, CoreError> {
    if has_active_appointment {
        return Err(CoreError::Conflict(
            "Ticket already has an appointment".into(),
        ));
    }
    if status.is_terminal() {
        return Err(CoreError::Conflict(format!(
            "Cannot book an appointment for a {status} ticket"
        )));
    }
    assigned_to_id.ok_or_else(|| {
        CoreError::Conflict("Ticket has no assigned technician".into())
    })
}

// ---------------------------------------------------------------------------
// Reschedule workflow
// ---------------------------------------------------------------------------

/// Requester's answer to a proposed new time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescheduleDecision {
    Accept,
    Reject,
}

impl RescheduleDecision {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(RescheduleDecision::Accept),
            "reject" => Ok(RescheduleDecision::Reject),
            other => Err(CoreError::Validation(format!(
                "Invalid reschedule action '{other}'. Must be one of: accept, reject"
            ))),
        }
    }
}

/// A reschedule may be proposed for any appointment that is not cancelled.
/// A pending proposal is replaced.
pub fn ensure_can_request_reschedule(status: AppointmentStatus) -> Result<(), CoreError> {
    if status == AppointmentStatus::Cancelled {
        return Err(CoreError::Conflict(
            "Cannot reschedule a cancelled appointment".into(),
        ));
    }
    Ok(())
}

/// A response needs a pending proposal.
pub fn ensure_reschedule_pending(
    status: AppointmentStatus,
    new_date: Option<Timestamp>,
) -> Result<Timestamp, CoreError> {
    match (status, new_date) {
        (AppointmentStatus::RescheduleRequested, Some(proposed)) => Ok(proposed),
        _ => Err(CoreError::Conflict(format!(
            "No pending reschedule request (appointment is {})",
            status.as_str()
        ))),
    }
}

pub fn ensure_can_cancel(status: AppointmentStatus) -> Result<(), CoreError> {
    if status == AppointmentStatus::Cancelled {
        return Err(CoreError::Conflict("Appointment is already cancelled".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()
    }

    fn at(h: u32, m: u32) -> Slot {
        Slot::from_local(day(), NaiveTime::from_hms_opt(h, m, 0).unwrap(), utc()).unwrap()
    }

    fn booked(id: DbId, h: u32, m: u32) -> BookedSlot {
        BookedSlot {
            appointment_id: id,
            scheduled_at: at(h, m).start,
        }
    }

    fn timed_block(from: (u32, u32), to: (u32, u32)) -> BusyWindow {
        BusyWindow {
            date: day(),
            start: Some(at(from.0, from.1).start),
            end: Some(at(to.0, to.1).start),
        }
    }

    fn all_day(date: NaiveDate) -> BusyWindow {
        BusyWindow {
            date,
            start: None,
            end: None,
        }
    }

    // -----------------------------------------------------------------------
    // Appointment overlap
    // -----------------------------------------------------------------------

    #[test]
    fn half_hour_into_existing_booking_is_busy() {
        let err = check_availability(&at(10, 30), utc(), &[booked(1, 10, 0)], &[], None)
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(msg) if msg == BUSY_APPOINTMENT);
    }

    #[test]
    fn back_to_back_booking_is_free() {
        assert!(check_availability(&at(11, 0), utc(), &[booked(1, 10, 0)], &[], None).is_ok());
        assert!(check_availability(&at(9, 0), utc(), &[booked(1, 10, 0)], &[], None).is_ok());
    }

    #[test]
    fn booking_that_started_earlier_is_detected() {
        // Existing 09:45-10:45 starts before the new window but runs into it.
        assert!(check_availability(&at(10, 0), utc(), &[booked(1, 9, 45)], &[], None).is_err());
    }

    #[test]
    fn excluded_booking_is_ignored() {
        assert!(check_availability(&at(10, 30), utc(), &[booked(7, 10, 0)], &[], Some(7)).is_ok());
    }

    // -----------------------------------------------------------------------
    // Busy blocks
    // -----------------------------------------------------------------------

    #[test]
    fn overlapping_timed_block_is_busy() {
        let err = check_availability(&at(14, 0), utc(), &[], &[timed_block((14, 30), (16, 0))], None)
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(msg) if msg == BUSY_PERSONAL_TASK);
    }

    #[test]
    fn adjacent_timed_block_is_free() {
        assert!(
            check_availability(&at(13, 0), utc(), &[], &[timed_block((14, 0), (15, 0))], None)
                .is_ok()
        );
    }

    #[test]
    fn all_day_block_rejects_every_time() {
        for h in [0, 6, 12, 18, 22] {
            assert!(
                check_availability(&at(h, 0), utc(), &[], &[all_day(day())], None).is_err(),
                "{h}:00 should be busy"
            );
        }
    }

    #[test]
    fn all_day_block_on_other_date_is_ignored() {
        let tomorrow = day().succ_opt().unwrap();
        assert!(check_availability(&at(10, 0), utc(), &[], &[all_day(tomorrow)], None).is_ok());
    }

    #[test]
    fn slot_crossing_midnight_touches_both_dates() {
        let slot = at(23, 30);
        let dates = slot.local_dates(utc());
        assert_eq!(dates, vec![day(), day().succ_opt().unwrap()]);
        let tomorrow = day().succ_opt().unwrap();
        assert!(check_availability(&slot, utc(), &[], &[all_day(tomorrow)], None).is_err());
    }

    #[test]
    fn local_time_respects_offset() {
        let zone = FixedOffset::east_opt(7 * 3600).unwrap();
        let slot =
            Slot::from_local(day(), NaiveTime::from_hms_opt(9, 0, 0).unwrap(), zone).unwrap();
        assert_eq!(slot.start, Utc.with_ymd_and_hms(2026, 6, 15, 2, 0, 0).unwrap());
        assert_eq!(slot.local_dates(zone), vec![day()]);
    }

    // -----------------------------------------------------------------------
    // Guards
    // -----------------------------------------------------------------------

    #[test]
    fn bookable_returns_technician() {
        assert_eq!(ensure_bookable(TicketStatus::InProgress, Some(5), false).unwrap(), 5);
    }

    #[test]
    fn unassigned_ticket_is_not_bookable() {
        assert_matches!(
            ensure_bookable(TicketStatus::NotStart, None, false),
            Err(CoreError::Conflict(_))
        );
    }

    #[test]
    fn double_booking_a_ticket_conflicts() {
        assert_matches!(
            ensure_bookable(TicketStatus::InProgress, Some(5), true),
            Err(CoreError::Conflict(msg)) if msg.contains("already has")
        );
    }

    #[test]
    fn closed_ticket_is_not_bookable() {
        assert!(ensure_bookable(TicketStatus::Completed, Some(5), false).is_err());
    }

    #[test]
    fn reschedule_decision_parsing() {
        assert_eq!(RescheduleDecision::parse("Accept").unwrap(), RescheduleDecision::Accept);
        assert_eq!(RescheduleDecision::parse("reject").unwrap(), RescheduleDecision::Reject);
        assert_matches!(RescheduleDecision::parse("maybe"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn respond_requires_pending_request() {
        let proposed = at(15, 0).start;
        assert_eq!(
            ensure_reschedule_pending(AppointmentStatus::RescheduleRequested, Some(proposed))
                .unwrap(),
            proposed
        );
        assert!(ensure_reschedule_pending(AppointmentStatus::Scheduled, None).is_err());
        assert!(ensure_reschedule_pending(AppointmentStatus::RescheduleRequested, None).is_err());
    }

    #[test]
    fn cancelled_appointments_cannot_be_rescheduled_or_cancelled() {
        assert!(ensure_can_request_reschedule(AppointmentStatus::Cancelled).is_err());
        assert!(ensure_can_request_reschedule(AppointmentStatus::RescheduleRequested).is_ok());
        assert!(ensure_can_cancel(AppointmentStatus::Cancelled).is_err());
    }

    #[test]
    fn status_strings_round_trip() {
        for s in [
            AppointmentStatus::Scheduled,
            AppointmentStatus::RescheduleRequested,
            AppointmentStatus::Cancelled,
        ] {
            assert_eq!(AppointmentStatus::parse(s.as_str()), Some(s));
        }
    }
}
