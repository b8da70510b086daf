//! Paged event retrieval under a deadline.

use std::time::Duration;

use servicedesk_core::calendar_sync::{ExternalEvent, SyncWindow};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CalendarError;
use crate::provider::CalendarProvider;

/// Fetch every event in `window`, following continuation tokens until the
/// listing is exhausted.
///
/// The whole fetch must finish within `timeout`; exceeding it yields
/// [`CalendarError::Timeout`]. Cancelling `cancel` aborts the in-flight
/// page with [`CalendarError::Cancelled`]. Nothing is retried.
pub async fn fetch_window(
    provider: &dyn CalendarProvider,
    calendar_id: &str,
    window: &SyncWindow,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<ExternalEvent>, CalendarError> {
    if calendar_id.trim().is_empty() {
        return Err(CalendarError::MissingCalendarId);
    }

    let deadline = Instant::now() + timeout;
    let mut events = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let request = provider.list_events_page(
            calendar_id,
            window.start,
            window.end,
            page_token.as_deref(),
        );

        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CalendarError::Cancelled),
            result = tokio::time::timeout_at(deadline, request) => match result {
                Ok(page) => page?,
                Err(_) => return Err(CalendarError::Timeout),
            },
        };

        pages += 1;
        events.extend(page.events);
        match page.next_page_token {
            Some(next) if page_token.as_deref() != Some(next.as_str()) => page_token = Some(next),
            _ => break,
        }
    }

    tracing::debug!(calendar_id, pages, events = events.len(), "Fetched calendar window");
    Ok(events)
}
