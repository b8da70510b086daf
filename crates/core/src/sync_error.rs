//! Classification of external calendar failures.
//!
//! Turns an opaque upstream failure into a stable category with an HTTP
//! status, a user-facing message, and a retry hint. Rules are checked in
//! order against the lowercased message and the upstream status; the first
//! match wins. Pure: performs no I/O.

use serde::Serialize;

use crate::error::CoreError;

/// A raw failure reported by the calendar collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncFailure {
    pub message: String,
    /// Upstream HTTP status, when the failure came from a response.
    pub status: Option<u16>,
    /// Upstream or transport error code (e.g. `ECONNRESET`, `invalid_grant`).
    pub code: Option<String>,
}

impl SyncFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            code: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    MissingConfiguration,
    InvalidCalendarId,
    CalendarNotFound,
    PermissionDenied,
    InvalidCredentials,
    TlsInterception,
    Network,
    UpstreamClient,
    UpstreamUnavailable,
}

impl SyncErrorKind {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            SyncErrorKind::MissingConfiguration => "CALENDAR_CONFIG_MISSING",
            SyncErrorKind::InvalidCalendarId => "CALENDAR_ID_INVALID",
            SyncErrorKind::CalendarNotFound => "CALENDAR_NOT_FOUND",
            SyncErrorKind::PermissionDenied => "CALENDAR_PERMISSION_DENIED",
            SyncErrorKind::InvalidCredentials => "CALENDAR_CREDENTIALS_INVALID",
            SyncErrorKind::TlsInterception => "CALENDAR_TLS_INTERCEPTED",
            SyncErrorKind::Network => "CALENDAR_NETWORK",
            SyncErrorKind::UpstreamClient => "CALENDAR_CLIENT_ERROR",
            SyncErrorKind::UpstreamUnavailable => "CALENDAR_UPSTREAM_ERROR",
        }
    }

    fn http_status(self) -> u16 {
        match self {
            SyncErrorKind::MissingConfiguration | SyncErrorKind::InvalidCredentials => 500,
            SyncErrorKind::InvalidCalendarId | SyncErrorKind::UpstreamClient => 400,
            SyncErrorKind::CalendarNotFound => 404,
            SyncErrorKind::PermissionDenied => 403,
            SyncErrorKind::TlsInterception => 502,
            SyncErrorKind::Network => 503,
            SyncErrorKind::UpstreamUnavailable => 502,
        }
    }

    fn retryable(self) -> bool {
        matches!(
            self,
            SyncErrorKind::Network | SyncErrorKind::UpstreamUnavailable
        )
    }

    fn user_message(self) -> &'static str {
        match self {
            SyncErrorKind::MissingConfiguration => {
                "Calendar integration is not configured on the server. Contact an administrator."
            }
            SyncErrorKind::InvalidCalendarId => {
                "The calendar ID is missing or invalid. Check the calendar ID and try again."
            }
            SyncErrorKind::CalendarNotFound => {
                "The calendar was not found. Check that the calendar ID is correct."
            }
            SyncErrorKind::PermissionDenied => {
                "The calendar is not shared with the service account. Share it and try again."
            }
            SyncErrorKind::InvalidCredentials => {
                "The server's calendar credentials are invalid or expired. Contact an administrator."
            }
            SyncErrorKind::TlsInterception => {
                "A secure connection to the calendar service could not be verified. \
                 A proxy or firewall may be intercepting TLS traffic."
            }
            SyncErrorKind::Network => {
                "Could not reach the calendar service. Check the network and try again."
            }
            SyncErrorKind::UpstreamClient => "The calendar service rejected the request.",
            SyncErrorKind::UpstreamUnavailable => {
                "The calendar service is temporarily unavailable. Try again later."
            }
        }
    }
}

/// The caller-facing classification of a sync failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedSyncError {
    pub kind: SyncErrorKind,
    pub http_status: u16,
    pub user_message: &'static str,
    pub retryable: bool,
}

impl ClassifiedSyncError {
    fn of(kind: SyncErrorKind) -> Self {
        Self {
            kind,
            http_status: kind.http_status(),
            user_message: kind.user_message(),
            retryable: kind.retryable(),
        }
    }
}

impl From<ClassifiedSyncError> for CoreError {
    fn from(err: ClassifiedSyncError) -> Self {
        match err.kind {
            SyncErrorKind::MissingConfiguration | SyncErrorKind::InvalidCredentials => {
                CoreError::Configuration(err.user_message.to_string())
            }
            kind => CoreError::ExternalService {
                http_status: err.http_status,
                code: kind.code(),
                message: err.user_message.to_string(),
                retryable: err.retryable,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

const CONFIG_MARKERS: &[&str] = &[
    "not configured",
    "missing service account",
    "missing private key",
    "missing client email",
    "credentials file not found",
];

const CALENDAR_ID_MARKERS: &[&str] = &[
    "invalid calendar id",
    "missing calendar id",
    "calendar id is required",
    "calendarid",
];

const NOT_FOUND_MARKERS: &[&str] = &["not found"];

/// Google's reason code. Compared whole: `ENOTFOUND` is a DNS failure.
const NOT_FOUND_REASON: &str = "notfound";

const PERMISSION_MARKERS: &[&str] = &[
    "forbidden",
    "permission denied",
    "insufficient permission",
    "insufficientpermissions",
    "does not have access",
    "requiredaccesslevel",
];

const CREDENTIAL_MARKERS: &[&str] = &[
    "invalid_grant",
    "invalid_client",
    "unauthorized_client",
    "invalid jwt",
    "invalid signature",
    "invalid credentials",
    "token has been expired",
];

const TLS_MARKERS: &[&str] = &[
    "self signed certificate",
    "self-signed certificate",
    "unable to verify the first certificate",
    "unable to get local issuer certificate",
    "certificate verify failed",
    "invalid peer certificate",
    "unknownissuer",
    "certificate",
];

const NETWORK_MARKERS: &[&str] = &[
    "timed out",
    "timeout",
    "deadline",
    "econnreset",
    "econnrefused",
    "enotfound",
    "eai_again",
    "connection refused",
    "connection reset",
    "dns error",
    "error trying to connect",
    "network",
    "cancelled",
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Classify a raw sync failure. The same input always yields the same output.
pub fn classify(failure: &SyncFailure) -> ClassifiedSyncError {
    let mut text = failure.message.to_lowercase();
    if let Some(code) = &failure.code {
        text.push(' ');
        text.push_str(&code.to_lowercase());
    }
    let status = failure.status;
    let not_found_reason = failure
        .code
        .as_deref()
        .is_some_and(|code| code.eq_ignore_ascii_case(NOT_FOUND_REASON));

    let kind = if contains_any(&text, CONFIG_MARKERS) {
        SyncErrorKind::MissingConfiguration
    } else if contains_any(&text, CALENDAR_ID_MARKERS) {
        SyncErrorKind::InvalidCalendarId
    } else if status == Some(404) || not_found_reason || contains_any(&text, NOT_FOUND_MARKERS) {
        SyncErrorKind::CalendarNotFound
    } else if status == Some(403) || contains_any(&text, PERMISSION_MARKERS) {
        SyncErrorKind::PermissionDenied
    } else if status == Some(401) || contains_any(&text, CREDENTIAL_MARKERS) {
        SyncErrorKind::InvalidCredentials
    } else if contains_any(&text, TLS_MARKERS) {
        SyncErrorKind::TlsInterception
    } else if contains_any(&text, NETWORK_MARKERS) {
        SyncErrorKind::Network
    } else {
        match status {
            Some(s) if (400..500).contains(&s) => SyncErrorKind::UpstreamClient,
            _ => SyncErrorKind::UpstreamUnavailable,
        }
    };

    ClassifiedSyncError::of(kind)
}
