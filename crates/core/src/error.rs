use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Server-side integration prerequisites are missing. Not the caller's fault.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A classified failure from an upstream collaborator.
    #[error("External service error ({http_status}): {message}")]
    ExternalService {
        http_status: u16,
        code: &'static str,
        message: String,
        retryable: bool,
    },

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}
