//! Errors from the calendar transport layer.
//!
//! Every variant can be described as a [`SyncFailure`] so callers classify
//! it the same way regardless of where it came from.

use servicedesk_core::sync_error::{classify, ClassifiedSyncError, SyncFailure};

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    /// Service identity or endpoint settings are absent.
    #[error("Calendar service account not configured: {0}")]
    NotConfigured(String),

    #[error("Missing calendar ID")]
    MissingCalendarId,

    /// The service identity could not be turned into an access token.
    #[error("Invalid credentials: {0}")]
    Credentials(String),

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {}", error_chain(.0))]
    Request(#[from] reqwest::Error),

    /// The calendar service returned a non-2xx status.
    #[error("Calendar API error ({status}): {message}")]
    Api {
        status: u16,
        /// Machine reason reported by the service (`notFound`, `invalid_grant`).
        code: Option<String>,
        message: String,
    },

    #[error("Calendar request timed out")]
    Timeout,

    #[error("Calendar request cancelled")]
    Cancelled,

    /// A 2xx response whose body could not be understood.
    #[error("Unexpected calendar response: {0}")]
    Decode(String),
}

/// Display an error and every source beneath it, joined by `": "`.
///
/// reqwest keeps the useful detail (DNS failure, certificate problem) in the
/// source chain rather than the top-level message.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let part = inner.to_string();
        if !text.contains(&part) {
            text.push_str(": ");
            text.push_str(&part);
        }
        source = inner.source();
    }
    text
}

impl CalendarError {
    /// Describe this error for the sync error classifier.
    pub fn to_sync_failure(&self) -> SyncFailure {
        let failure = SyncFailure::new(self.to_string());
        match self {
            CalendarError::Api { status, code, .. } => {
                let failure = failure.with_status(*status);
                match code {
                    Some(code) => failure.with_code(code.clone()),
                    None => failure,
                }
            }
            CalendarError::Request(e) => match e.status() {
                Some(status) => failure.with_status(status.as_u16()),
                None => failure,
            },
            _ => failure,
        }
    }

    pub fn classify(&self) -> ClassifiedSyncError {
        classify(&self.to_sync_failure())
    }
}
