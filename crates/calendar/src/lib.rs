//! External calendar collaborator.
//!
//! [`CalendarProvider`] is the seam the engines talk to.
//! [`GoogleCalendarApi`] implements it against a Google-Calendar-compatible
//! REST API, and [`fetch_window`] pages through a sync window under a
//! deadline and a cancellation token.

pub mod auth;
pub mod config;
pub mod error;
pub mod fetch;
pub mod google;
pub mod provider;

pub use auth::{ServiceAccountTokenSource, StaticToken, TokenSource};
pub use config::CalendarConfig;
pub use error::CalendarError;
pub use fetch::fetch_window;
pub use google::GoogleCalendarApi;
pub use provider::{CalendarProvider, EventsPage, NewCalendarEvent};
