use std::sync::Arc;
use std::time::Duration;

use servicedesk_calendar::{CalendarConfig, CalendarProvider, GoogleCalendarApi};
use servicedesk_core::calendar_sync::SyncCooldown;
use servicedesk_core::clock::{Clock, SystemClock};
use servicedesk_core::sync_error::ClassifiedSyncError;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: servicedesk_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Centralized event bus; notifications travel over it.
    pub event_bus: Arc<servicedesk_events::EventBus>,
    pub calendar: CalendarAccess,
    /// Per-user throttle for manual calendar syncs.
    pub sync_cooldown: Arc<SyncCooldown>,
    pub clock: Arc<dyn Clock>,
    /// Cancelled at shutdown; in-flight calendar fetches use child tokens.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire up state from configuration, building the calendar client and
    /// the sync cooldown.
    pub fn new(
        pool: servicedesk_db::DbPool,
        config: ServerConfig,
        event_bus: Arc<servicedesk_events::EventBus>,
    ) -> Self {
        let calendar = CalendarAccess::from_config(&config.calendar);
        let sync_cooldown = Arc::new(SyncCooldown::new(Duration::from_secs(
            config.sync_cooldown_secs,
        )));
        Self {
            pool,
            config: Arc::new(config),
            event_bus,
            calendar,
            sync_cooldown,
            clock: Arc::new(SystemClock),
            shutdown: CancellationToken::new(),
        }
    }
}

/// The calendar provider, or the reason there is none.
#[derive(Clone)]
pub enum CalendarAccess {
    Ready(Arc<dyn CalendarProvider>),
    Unavailable(ClassifiedSyncError),
}

impl CalendarAccess {
    pub fn from_config(config: &CalendarConfig) -> Self {
        match GoogleCalendarApi::from_config(config) {
            Ok(api) => CalendarAccess::Ready(Arc::new(api)),
            Err(e) => {
                let classified = e.classify();
                tracing::warn!(
                    error = %e,
                    code = classified.kind.code(),
                    "Calendar integration unavailable"
                );
                CalendarAccess::Unavailable(classified)
            }
        }
    }

    pub fn provider(&self) -> Result<&Arc<dyn CalendarProvider>, ClassifiedSyncError> {
        match self {
            CalendarAccess::Ready(provider) => Ok(provider),
            CalendarAccess::Unavailable(reason) => Err(reason.clone()),
        }
    }
}
