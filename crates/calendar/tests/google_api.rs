//! Exercises the REST client against a local stand-in for the calendar API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch};
use axum::{Json, Router};
use chrono::TimeZone;
use serde_json::{json, Value};
use servicedesk_calendar::{
    fetch_window, CalendarError, CalendarProvider, GoogleCalendarApi, NewCalendarEvent,
    StaticToken,
};
use servicedesk_core::calendar_sync::{sync_window, transform_events};
use servicedesk_core::sync_error::SyncErrorKind;
use tokio_util::sync::CancellationToken;

const TOKEN: &str = "test-token";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

async fn list_events(
    Path(calendar_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "Invalid Credentials", "errors": [{"reason": "authError"}]}})),
        );
    }
    if calendar_id != "team@example.com" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"code": 404, "message": "Not Found", "errors": [{"reason": "notFound"}]}})),
        );
    }
    assert_eq!(query.get("singleEvents").map(String::as_str), Some("true"));

    let body = match query.get("pageToken").map(String::as_str) {
        None => json!({
            "items": [
                {"id": "a", "summary": "Standup",
                 "start": {"dateTime": "2026-05-20T09:00:00Z"},
                 "end": {"dateTime": "2026-05-20T09:15:00Z"}},
                {"id": "b", "summary": "Broken", "start": {}, "end": {}}
            ],
            "nextPageToken": "page-2"
        }),
        Some("page-2") => json!({
            "items": [
                {"id": "c", "summary": "Holiday",
                 "start": {"date": "2026-05-25"}, "end": {"date": "2026-05-26"}}
            ]
        }),
        Some(_) => json!({"items": []}),
    };
    (StatusCode::OK, Json(body))
}

async fn create_event(Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(body["start"]["dateTime"], "2026-05-20T09:00:00Z");
    Json(json!({"id": "created-1", "summary": body["summary"]}))
}

async fn update_event(Path((_calendar, event_id)): Path<(String, String)>) -> StatusCode {
    if event_id == "created-1" {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn spawn_server() -> String {
    let app = Router::new()
        .route(
            "/calendar/v3/calendars/{calendar_id}/events",
            get(list_events).post(create_event),
        )
        .route(
            "/calendar/v3/calendars/{calendar_id}/events/{event_id}",
            patch(update_event).delete(update_event),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/calendar/v3")
}

fn client(base: String, token: &str) -> GoogleCalendarApi {
    GoogleCalendarApi::new(
        reqwest::Client::new(),
        base,
        Arc::new(StaticToken(token.to_string())),
    )
}

fn utc() -> chrono::FixedOffset {
    chrono::FixedOffset::east_opt(0).unwrap()
}

#[tokio::test]
async fn pages_through_window_and_transforms() {
    let api = client(spawn_server().await, TOKEN);
    let now = chrono::Utc.with_ymd_and_hms(2026, 5, 17, 12, 0, 0).unwrap();
    let window = sync_window(now, utc());

    let events = fetch_window(
        &api,
        "team@example.com",
        &window,
        Duration::from_secs(5),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(events.len(), 3);

    let outcome = transform_events(&events, 7, utc());
    assert_eq!(outcome.blocks.len(), 2);
    assert_eq!(outcome.skipped, 1);
}

#[tokio::test]
async fn unknown_calendar_classifies_as_not_found() {
    let api = client(spawn_server().await, TOKEN);
    let now = chrono::Utc::now();
    let err = fetch_window(
        &api,
        "someone-else@example.com",
        &sync_window(now, utc()),
        Duration::from_secs(5),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert_matches!(&err, CalendarError::Api { status: 404, code: Some(code), .. } if code == "notFound");
    assert_eq!(err.classify().kind, SyncErrorKind::CalendarNotFound);
}

#[tokio::test]
async fn rejected_token_classifies_as_credentials() {
    let api = client(spawn_server().await, "stale");
    let err = api
        .list_events_page("team@example.com", chrono::Utc::now(), chrono::Utc::now(), None)
        .await
        .unwrap_err();
    assert_eq!(err.classify().kind, SyncErrorKind::InvalidCredentials);
}

#[tokio::test]
async fn create_then_update_event() {
    let api = client(spawn_server().await, TOKEN);
    let event = NewCalendarEvent {
        summary: "Repair visit".into(),
        description: Some("Ticket #4".into()),
        start: chrono::Utc.with_ymd_and_hms(2026, 5, 20, 9, 0, 0).unwrap(),
        end: chrono::Utc.with_ymd_and_hms(2026, 5, 20, 10, 0, 0).unwrap(),
    };

    let id = api.create_event("team@example.com", &event).await.unwrap();
    assert_eq!(id, "created-1");
    api.update_event("team@example.com", &id, &event).await.unwrap();

    assert_matches!(
        api.delete_event("team@example.com", "missing").await,
        Err(CalendarError::Api { status: 404, .. })
    );
}

#[tokio::test]
async fn unreachable_host_classifies_as_network() {
    // Port 9 (discard) on localhost is closed in test environments.
    let api = client("http://127.0.0.1:9/calendar/v3".into(), TOKEN);
    let err = api
        .list_events_page("team@example.com", chrono::Utc::now(), chrono::Utc::now(), None)
        .await
        .unwrap_err();
    assert_matches!(err, CalendarError::Request(_));
    assert_eq!(err.classify().kind, SyncErrorKind::Network);
}
