//! Mirror a user's external calendar into their busy blocks.

use serde::Serialize;
use servicedesk_calendar::{fetch_window, CalendarError};
use servicedesk_core::calendar_sync::{sync_window, transform_events};
use servicedesk_core::types::DbId;
use servicedesk_db::repositories::BusyBlockRepo;

use crate::error::AppResult;
use crate::state::AppState;

/// What one sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// Busy blocks inserted.
    pub synced_count: u64,
    /// Events dropped for a missing or malformed start.
    pub skipped: usize,
    /// Events returned by the calendar.
    pub fetched: usize,
}

/// Replace `user_id`'s imported busy blocks with the events of
/// `calendar_id` over the sync window.
///
/// Throttled per user unless `force` is set. Any calendar failure is
/// classified and returned; the previous imported set is left intact.
pub async fn sync_user_calendar(
    state: &AppState,
    user_id: DbId,
    calendar_id: &str,
    force: bool,
) -> AppResult<SyncOutcome> {
    let calendar_id = calendar_id.trim();
    if calendar_id.is_empty() {
        return Err(CalendarError::MissingCalendarId.classify().into());
    }

    state.sync_cooldown.try_acquire(user_id, force)?;
    let provider = state.calendar.provider()?;

    let zone = state.config.schedule_offset;
    let window = sync_window(state.clock.now(), zone);
    let cancel = state.shutdown.child_token();

    let events = fetch_window(
        provider.as_ref(),
        calendar_id,
        &window,
        state.config.calendar.timeout,
        &cancel,
    )
    .await
    .map_err(|e| {
        let classified = e.classify();
        tracing::warn!(
            user_id,
            calendar_id,
            code = classified.kind.code(),
            error = %e,
            "Calendar fetch failed"
        );
        classified
    })?;

    let outcome = transform_events(&events, user_id, zone);
    if outcome.skipped > 0 {
        tracing::warn!(
            user_id,
            skipped = outcome.skipped,
            "Skipped calendar events without a usable start"
        );
    }

    let synced_count =
        BusyBlockRepo::replace_imported(&state.pool, user_id, window.start_date, &outcome.blocks)
            .await?;

    tracing::info!(
        user_id,
        calendar_id,
        fetched = events.len(),
        synced_count,
        window_start = %window.start,
        window_end = %window.end,
        "Calendar synced"
    );

    Ok(SyncOutcome {
        synced_count,
        skipped: outcome.skipped,
        fetched: events.len(),
    })
}
