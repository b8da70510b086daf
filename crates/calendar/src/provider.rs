//! The calendar collaborator seam.

use async_trait::async_trait;
use servicedesk_core::calendar_sync::ExternalEvent;
use servicedesk_core::types::Timestamp;

use crate::error::CalendarError;

/// One page of an event listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventsPage {
    pub events: Vec<ExternalEvent>,
    /// Continuation token; `None` on the last page.
    pub next_page_token: Option<String>,
}

/// A timed event to create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCalendarEvent {
    pub summary: String,
    pub description: Option<String>,
    pub start: Timestamp,
    pub end: Timestamp,
}

/// Operations the engines need from an external calendar.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// List single (expanded) events in `[time_min, time_max)`, one page at a time.
    async fn list_events_page(
        &self,
        calendar_id: &str,
        time_min: Timestamp,
        time_max: Timestamp,
        page_token: Option<&str>,
    ) -> Result<EventsPage, CalendarError>;

    /// Create an event, returning its id.
    async fn create_event(
        &self,
        calendar_id: &str,
        event: &NewCalendarEvent,
    ) -> Result<String, CalendarError>;

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &NewCalendarEvent,
    ) -> Result<(), CalendarError>;

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError>;
}
