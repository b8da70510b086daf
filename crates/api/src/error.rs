use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use servicedesk_core::appointment::BUSY_APPOINTMENT;
use servicedesk_core::error::CoreError;
use servicedesk_core::sync_error::ClassifiedSyncError;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

/// Everything a handler can fail with. Rendered as `{ "error", "code" }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Calendar failure, already classified into a stable code.
    #[error("Calendar sync failed: {}", .0.user_message)]
    Sync(ClassifiedSyncError),

    /// Malformed query or body that never reached the domain layer.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<ClassifiedSyncError> for AppError {
    fn from(err: ClassifiedSyncError) -> Self {
        AppError::Sync(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

/// Status, code, and client message for one error.
struct Rendered {
    status: StatusCode,
    code: &'static str,
    message: String,
    retry_after: Option<u64>,
}

impl Rendered {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retry_after: None,
        }
    }

    fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            INTERNAL_MESSAGE,
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let rendered = match &self {
            AppError::Core(core) => render_core(core),
            AppError::Sync(classified) => render_sync(classified),
            AppError::Database(err) => render_database(err),
            AppError::BadRequest(msg) => Rendered::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                Rendered::internal()
            }
        };

        let body = ErrorBody {
            error: rendered.message,
            code: rendered.code,
        };
        let mut response = (rendered.status, Json(body)).into_response();
        if let Some(secs) = rendered.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

fn render_core(err: &CoreError) -> Rendered {
    match err {
        CoreError::NotFound { entity, id } => Rendered::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => {
            Rendered::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg)
        }
        CoreError::Conflict(msg) => Rendered::new(StatusCode::CONFLICT, "CONFLICT", msg),
        CoreError::Unauthorized(msg) => {
            Rendered::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
        }
        CoreError::Forbidden(msg) => Rendered::new(StatusCode::FORBIDDEN, "FORBIDDEN", msg),
        CoreError::Configuration(msg) => {
            tracing::error!(error = %msg, "Server configuration error");
            Rendered::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIGURATION_ERROR",
                msg,
            )
        }
        CoreError::ExternalService {
            http_status,
            code,
            message,
            retryable,
        } => {
            tracing::warn!(code, retryable, error = %message, "Upstream service error");
            Rendered::new(
                StatusCode::from_u16(*http_status).unwrap_or(StatusCode::BAD_GATEWAY),
                *code,
                message,
            )
        }
        CoreError::RateLimited { retry_after_secs } => Rendered {
            retry_after: Some(*retry_after_secs),
            ..Rendered::new(
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Too many requests, retry in {retry_after_secs}s"),
            )
        },
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            Rendered::internal()
        }
    }
}

/// Retryable failures are expected noise; the rest need an operator.
fn render_sync(classified: &ClassifiedSyncError) -> Rendered {
    let code = classified.kind.code();
    if classified.retryable {
        tracing::warn!(code, "Calendar sync failed");
    } else {
        tracing::error!(code, "Calendar sync failed");
    }
    Rendered::new(
        StatusCode::from_u16(classified.http_status).unwrap_or(StatusCode::BAD_GATEWAY),
        code,
        classified.user_message,
    )
}

/// `RowNotFound` is a 404. Violations of the scheduling constraints
/// (`uq_*` unique, `ex_*` exclusion) lose a race against another booking
/// and come back as 409. Anything else is a sanitized 500.
fn render_database(err: &sqlx::Error) -> Rendered {
    let sqlx::Error::Database(db_err) = err else {
        if matches!(err, sqlx::Error::RowNotFound) {
            return Rendered::new(StatusCode::NOT_FOUND, "NOT_FOUND", "Resource not found");
        }
        tracing::error!(error = %err, "Database error");
        return Rendered::internal();
    };

    let constraint = db_err.constraint().unwrap_or_default();
    match (db_err.code().as_deref(), constraint) {
        (Some("23505"), "uq_appointments_active_ticket") => Rendered::new(
            StatusCode::CONFLICT,
            "CONFLICT",
            "Ticket already has an active appointment",
        ),
        (Some("23505"), c) if c.starts_with("uq_") => Rendered::new(
            StatusCode::CONFLICT,
            "CONFLICT",
            format!("Duplicate value violates unique constraint: {c}"),
        ),
        (Some("23P01"), c) if c.starts_with("ex_") => {
            Rendered::new(StatusCode::CONFLICT, "CONFLICT", BUSY_APPOINTMENT)
        }
        _ => {
            tracing::error!(error = %db_err, "Database error");
            Rendered::internal()
        }
    }
}
