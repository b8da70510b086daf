//! Calendar reconciliation: sync window, event transform, and cooldown.
//!
//! The reconciler mirrors a technician's external calendar into
//! `busy_blocks` rows with source `external_calendar`. This module holds the
//! pure parts; the transport lives in `servicedesk-calendar` and the atomic
//! replace in the busy block repository.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveTime};

use crate::busy_block::{BusyBlockDraft, BusySource};
use crate::clock::{Clock, SystemClock};
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Whole calendar months mirrored before the current month.
pub const SYNC_MONTHS_BACK: u32 = 3;

/// Days mirrored ahead of now.
pub const SYNC_DAYS_AHEAD: i64 = 90;

/// Upper bound on events requested per page.
pub const MAX_EVENTS_PER_PAGE: u32 = 2500;

/// Default manual-sync cooldown.
pub const DEFAULT_SYNC_COOLDOWN_SECS: u64 = 300;

/// Fallback length for timed events without a usable end.
pub const DEFAULT_EVENT_MINUTES: i64 = 60;

/// Provenance line prefixed to imported descriptions.
pub const IMPORTED_MARKER: &str = "Imported from Google Calendar";

/// Color of imported timed events.
pub const TIMED_EVENT_COLOR: &str = "#3b82f6";

/// Color of imported all-day events.
pub const ALL_DAY_EVENT_COLOR: &str = "#f59e0b";

/// Title used when an event has no summary.
pub const UNTITLED_EVENT: &str = "Busy";

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// The span of time a sync mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: Timestamp,
    pub end: Timestamp,
    /// Local date of `start`; imported blocks on or after it are replaced.
    pub start_date: NaiveDate,
}

/// From local midnight on day 1 of the month three months before the current
/// one, through 90 days after `now`.
pub fn sync_window(now: Timestamp, zone: FixedOffset) -> SyncWindow {
    let local_today = now.with_timezone(&zone).date_naive();
    let month_start = local_today.with_day(1).unwrap_or(local_today);
    let start_date = month_start
        .checked_sub_months(Months::new(SYNC_MONTHS_BACK))
        .unwrap_or(month_start);
    SyncWindow {
        start: local_midnight(start_date, zone),
        end: now + Duration::days(SYNC_DAYS_AHEAD),
        start_date,
    }
}

fn local_midnight(date: NaiveDate, zone: FixedOffset) -> Timestamp {
    (date.and_time(NaiveTime::MIN) - Duration::seconds(i64::from(zone.local_minus_utc())))
        .and_utc()
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Start or end of an external event: a date for all-day events, an
/// RFC 3339 instant otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTime {
    pub date: Option<String>,
    pub date_time: Option<String>,
}

/// An event as returned by the external calendar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalEvent {
    pub id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
}

/// Result of transforming a batch of events.
#[derive(Debug, Default)]
pub struct TransformOutcome {
    pub blocks: Vec<BusyBlockDraft>,
    pub skipped: usize,
}

fn parse_instant(raw: &str) -> Option<Timestamp> {
    chrono::DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.to_utc())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn imported_description(event: &ExternalEvent) -> String {
    let mut description = IMPORTED_MARKER.to_string();
    if let Some(location) = non_blank(&event.location) {
        description.push_str("\nLocation: ");
        description.push_str(location);
    }
    if let Some(body) = non_blank(&event.description) {
        description.push_str("\n\n");
        description.push_str(body);
    }
    description
}

/// Convert one external event to a busy block.
///
/// Returns `None` when the start is missing or malformed.
pub fn to_busy_block(
    event: &ExternalEvent,
    user_id: DbId,
    zone: FixedOffset,
) -> Option<BusyBlockDraft> {
    let (date, start, end, color) = if let Some(raw) = non_blank(&event.start.date_time) {
        let start = parse_instant(raw)?;
        let end = non_blank(&event.end.date_time)
            .and_then(parse_instant)
            .filter(|end| *end > start)
            .unwrap_or(start + Duration::minutes(DEFAULT_EVENT_MINUTES));
        let date = start.with_timezone(&zone).date_naive();
        (date, start, end, TIMED_EVENT_COLOR)
    } else if let Some(raw) = non_blank(&event.start.date) {
        let date = parse_date(raw)?;
        // All-day end dates are exclusive.
        let end_date = non_blank(&event.end.date)
            .and_then(parse_date)
            .filter(|end| *end > date)
            .or_else(|| date.succ_opt())
            .unwrap_or(date);
        (
            date,
            local_midnight(date, zone),
            local_midnight(end_date, zone),
            ALL_DAY_EVENT_COLOR,
        )
    } else {
        return None;
    };

    let title = non_blank(&event.summary).unwrap_or(UNTITLED_EVENT);
    Some(BusyBlockDraft {
        user_id,
        title: title.chars().take(crate::busy_block::MAX_BLOCK_TITLE_LEN).collect(),
        description: Some(imported_description(event)),
        date,
        start_time: Some(start),
        end_time: Some(end),
        color: color.to_string(),
        is_completed: false,
        source: BusySource::ExternalCalendar,
    })
}

/// Transform a batch, counting events that had to be skipped.
pub fn transform_events(
    events: &[ExternalEvent],
    user_id: DbId,
    zone: FixedOffset,
) -> TransformOutcome {
    let mut outcome = TransformOutcome::default();
    for event in events {
        match to_busy_block(event, user_id, zone) {
            Some(block) => outcome.blocks.push(block),
            None => outcome.skipped += 1,
        }
    }
    outcome
}

// ---------------------------------------------------------------------------
// Cooldown
// ---------------------------------------------------------------------------

/// Per-user throttle for manual sync triggers.
///
/// State is process-local: it resets on restart and is not shared between
/// instances. The mark is taken when an attempt starts.
pub struct SyncCooldown {
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    last_run: Mutex<HashMap<DbId, Timestamp>>,
}

impl SyncCooldown {
    pub fn new(cooldown: std::time::Duration) -> Self {
        Self::with_clock(cooldown, Arc::new(SystemClock))
    }

    pub fn with_clock(cooldown: std::time::Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            cooldown: Duration::from_std(cooldown).unwrap_or(Duration::zero()),
            clock,
            last_run: Mutex::new(HashMap::new()),
        }
    }

    /// Record an attempt for `user_id`, or fail with `RateLimited` if the
    /// previous attempt is within the cooldown. `force` always proceeds.
    pub fn try_acquire(&self, user_id: DbId, force: bool) -> Result<(), CoreError> {
        let now = self.clock.now();
        let mut last_run = self.last_run.lock().unwrap_or_else(|e| e.into_inner());

        if !force {
            if let Some(previous) = last_run.get(&user_id) {
                let next_allowed = *previous + self.cooldown;
                if now < next_allowed {
                    let remaining_ms = (next_allowed - now).num_milliseconds();
                    let retry_after_secs = u64::try_from((remaining_ms + 999) / 1000).unwrap_or(1);
                    return Err(CoreError::RateLimited { retry_after_secs });
                }
            }
        }

        last_run.insert(user_id, now);
        Ok(())
    }

    /// Last recorded attempt for `user_id`.
    pub fn last_run(&self, user_id: DbId) -> Option<Timestamp> {
        self.last_run
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&user_id)
            .copied()
    }
}

impl Default for SyncCooldown {
    fn default() -> Self {
        Self::new(std::time::Duration::from_secs(DEFAULT_SYNC_COOLDOWN_SECS))
    }
}
