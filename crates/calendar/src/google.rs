//! REST client for a Google-Calendar-compatible events API.
//!
//! Wraps the `events` collection (list, insert, patch, delete) using
//! [`reqwest`] with a bearer token from a [`TokenSource`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use servicedesk_core::calendar_sync::{EventTime, ExternalEvent, MAX_EVENTS_PER_PAGE};
use servicedesk_core::types::Timestamp;

use crate::auth::{ServiceAccountTokenSource, TokenSource};
use crate::config::CalendarConfig;
use crate::error::CalendarError;
use crate::provider::{CalendarProvider, EventsPage, NewCalendarEvent};

/// HTTP client for one calendar API endpoint.
pub struct GoogleCalendarApi {
    client: reqwest::Client,
    api_url: String,
    tokens: Arc<dyn TokenSource>,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireEventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    start: Option<WireEventTime>,
    #[serde(default)]
    end: Option<WireEventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEventList {
    #[serde(default)]
    items: Vec<WireEvent>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireEventBody<'a> {
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    start: WireEventTime,
    end: WireEventTime,
}

#[derive(Debug, Deserialize)]
struct WireCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireErrorEnvelope {
    error: WireError,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    errors: Vec<WireErrorItem>,
}

#[derive(Debug, Deserialize)]
struct WireErrorItem {
    #[serde(default)]
    reason: Option<String>,
}

/// A missing `start`/`end` becomes an empty time, which the transform skips.
fn event_time(wire: Option<WireEventTime>) -> EventTime {
    let wire = wire.unwrap_or_default();
    EventTime {
        date: wire.date,
        date_time: wire.date_time,
    }
}

impl From<WireEvent> for ExternalEvent {
    fn from(wire: WireEvent) -> Self {
        ExternalEvent {
            id: wire.id,
            summary: wire.summary,
            description: wire.description,
            location: wire.location,
            start: event_time(wire.start),
            end: event_time(wire.end),
        }
    }
}

impl<'a> From<&'a NewCalendarEvent> for WireEventBody<'a> {
    fn from(event: &'a NewCalendarEvent) -> Self {
        WireEventBody {
            summary: &event.summary,
            description: event.description.as_deref(),
            start: WireEventTime {
                date: None,
                date_time: Some(rfc3339(event.start)),
            },
            end: WireEventTime {
                date: None,
                date_time: Some(rfc3339(event.end)),
            },
        }
    }
}

fn rfc3339(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

impl GoogleCalendarApi {
    /// Create a client for `api_url`, e.g. `https://www.googleapis.com/calendar/v3`.
    pub fn new(client: reqwest::Client, api_url: String, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Build a client authenticated as the configured service account.
    ///
    /// Fails with `NotConfigured` when the service identity is absent and
    /// `Credentials` when the key is unusable.
    pub fn from_config(config: &CalendarConfig) -> Result<Self, CalendarError> {
        let (email, key) = config.credentials()?;
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let tokens = ServiceAccountTokenSource::new(
            client.clone(),
            config.token_url.clone(),
            email,
            key,
        )?;
        Ok(Self::new(client, config.api_url.clone(), Arc::new(tokens)))
    }

    /// `{api_url}/calendars/{calendar_id}/events[/{event_id}]` with each
    /// segment percent-encoded.
    fn events_url(&self, calendar_id: &str, event_id: Option<&str>) -> Result<Url, CalendarError> {
        if calendar_id.trim().is_empty() {
            return Err(CalendarError::MissingCalendarId);
        }
        let mut url = Url::parse(&self.api_url).map_err(|e| {
            CalendarError::NotConfigured(format!("invalid calendar API URL {}: {e}", self.api_url))
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                CalendarError::NotConfigured(format!(
                    "calendar API URL cannot be a base: {}",
                    self.api_url
                ))
            })?;
            segments.pop_if_empty();
            segments.extend(["calendars", calendar_id.trim(), "events"]);
            if let Some(event_id) = event_id {
                segments.push(event_id);
            }
        }
        Ok(url)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. On failure the
    /// service's error envelope is unpacked into [`CalendarError::Api`].
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, CalendarError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(Self::api_error(status.as_u16(), body))
    }

    fn api_error(status: u16, body: String) -> CalendarError {
        match serde_json::from_str::<WireErrorEnvelope>(&body) {
            Ok(envelope) => {
                let code = envelope
                    .error
                    .errors
                    .into_iter()
                    .find_map(|item| item.reason)
                    .or(envelope.error.status);
                CalendarError::Api {
                    status,
                    code,
                    message: envelope.error.message.unwrap_or(body),
                }
            }
            Err(_) => CalendarError::Api {
                status,
                code: None,
                message: body,
            },
        }
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CalendarError> {
        let response = Self::ensure_success(response).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| CalendarError::Decode(e.to_string()))
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), CalendarError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarApi {
    async fn list_events_page(
        &self,
        calendar_id: &str,
        time_min: Timestamp,
        time_max: Timestamp,
        page_token: Option<&str>,
    ) -> Result<EventsPage, CalendarError> {
        let url = self.events_url(calendar_id, None)?;
        let token = self.tokens.access_token().await?;

        let mut query = vec![
            ("timeMin", rfc3339(time_min)),
            ("timeMax", rfc3339(time_max)),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("maxResults", MAX_EVENTS_PER_PAGE.to_string()),
        ];
        if let Some(page_token) = page_token {
            query.push(("pageToken", page_token.to_string()));
        }

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;

        let list: WireEventList = Self::parse_response(response).await?;
        Ok(EventsPage {
            events: list.items.into_iter().map(ExternalEvent::from).collect(),
            next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn create_event(
        &self,
        calendar_id: &str,
        event: &NewCalendarEvent,
    ) -> Result<String, CalendarError> {
        let url = self.events_url(calendar_id, None)?;
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&WireEventBody::from(event))
            .send()
            .await?;

        let created: WireCreated = Self::parse_response(response).await?;
        Ok(created.id)
    }

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        event: &NewCalendarEvent,
    ) -> Result<(), CalendarError> {
        let url = self.events_url(calendar_id, Some(event_id))?;
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .patch(url)
            .bearer_auth(token)
            .json(&WireEventBody::from(event))
            .send()
            .await?;

        Self::check_status(response).await
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError> {
        let url = self.events_url(calendar_id, Some(event_id))?;
        let token = self.tokens.access_token().await?;

        let response = self.client.delete(url).bearer_auth(token).send().await?;

        Self::check_status(response).await
    }
}
