#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use chrono::FixedOffset;
use http_body_util::BodyExt;
use servicedesk_api::app::build_router;
use servicedesk_api::config::ServerConfig;
use servicedesk_api::middleware::auth::{USER_ID_HEADER, USER_ROLE_HEADER};
use servicedesk_api::state::{AppState, CalendarAccess};
use servicedesk_calendar::{
    CalendarConfig, CalendarError, CalendarProvider, EventsPage, NewCalendarEvent,
};
use servicedesk_core::calendar_sync::ExternalEvent;
use servicedesk_core::types::{DbId, Timestamp};
use servicedesk_events::EventBus;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults and no calendar identity.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        sync_cooldown_secs: 300,
        schedule_offset: FixedOffset::east_opt(0).unwrap(),
        calendar: CalendarConfig {
            timeout: Duration::from_secs(5),
            ..Default::default()
        },
    }
}

pub fn test_state(pool: PgPool) -> AppState {
    AppState::new(pool, test_config(), Arc::new(EventBus::default()))
}

/// A pool that never connects. Fine for requests rejected before any query.
pub fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy("postgres://servicedesk@127.0.0.1:1/unused")
        .unwrap()
}

/// The application router over `state`, with the production middleware.
pub fn build_app(state: AppState) -> Router {
    build_router(state)
}

pub fn build_test_app(pool: PgPool) -> Router {
    build_app(test_state(pool))
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Send a request as `user` (id and role). `None` sends no principal headers.
pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    user: Option<(DbId, &str)>,
    body: Option<serde_json::Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, role)) = user {
        builder = builder
            .header(USER_ID_HEADER, id.to_string())
            .header(USER_ROLE_HEADER, role);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Fake calendar
// ---------------------------------------------------------------------------

/// In-memory calendar. Serves `events` as one page, or fails every call
/// with `fail_status`.
#[derive(Default)]
pub struct FakeCalendar {
    pub events: Mutex<Vec<ExternalEvent>>,
    pub fail_status: Option<u16>,
    pub created: Mutex<Vec<NewCalendarEvent>>,
    pub updated: Mutex<Vec<(String, NewCalendarEvent)>>,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeCalendar {
    pub fn with_events(events: Vec<ExternalEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            ..Default::default()
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Default::default()
        }
    }

    fn check(&self) -> Result<(), CalendarError> {
        match self.fail_status {
            Some(status) => Err(CalendarError::Api {
                status,
                code: None,
                message: format!("fake failure {status}"),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CalendarProvider for FakeCalendar {
    async fn list_events_page(
        &self,
        _calendar_id: &str,
        _time_min: Timestamp,
        _time_max: Timestamp,
        _page_token: Option<&str>,
    ) -> Result<EventsPage, CalendarError> {
        self.check()?;
        Ok(EventsPage {
            events: self.events.lock().unwrap().clone(),
            next_page_token: None,
        })
    }

    async fn create_event(
        &self,
        _calendar_id: &str,
        event: &NewCalendarEvent,
    ) -> Result<String, CalendarError> {
        self.check()?;
        let mut created = self.created.lock().unwrap();
        created.push(event.clone());
        Ok(format!("evt-{}", created.len()))
    }

    async fn update_event(
        &self,
        _calendar_id: &str,
        event_id: &str,
        event: &NewCalendarEvent,
    ) -> Result<(), CalendarError> {
        self.check()?;
        self.updated
            .lock()
            .unwrap()
            .push((event_id.to_string(), event.clone()));
        Ok(())
    }

    async fn delete_event(&self, _calendar_id: &str, event_id: &str) -> Result<(), CalendarError> {
        self.check()?;
        self.deleted.lock().unwrap().push(event_id.to_string());
        Ok(())
    }
}

/// Swap the calendar in `state` for `fake`.
pub fn with_calendar(mut state: AppState, fake: Arc<FakeCalendar>) -> AppState {
    state.calendar = CalendarAccess::Ready(fake);
    state
}
