//! Route definitions for `/appointments` and technician schedules.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{appointments, technicians};
use crate::state::AppState;

/// Routes mounted at `/appointments`.
///
/// ```text
/// POST   /                          -> create (technician)
/// GET    /{id}                      -> get_by_id
/// POST   /{id}/reschedule           -> request_reschedule (technician)
/// POST   /{id}/reschedule/respond   -> respond_reschedule
/// POST   /{id}/cancel               -> cancel
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(appointments::create))
        .route("/{id}", get(appointments::get_by_id))
        .route("/{id}/reschedule", post(appointments::request_reschedule))
        .route(
            "/{id}/reschedule/respond",
            post(appointments::respond_reschedule),
        )
        .route("/{id}/cancel", post(appointments::cancel))
}

/// Routes mounted at `/technicians`.
///
/// ```text
/// GET    /{id}/appointments?from&to -> list_for_technician
/// GET    /{id}/stats                -> stats
/// ```
pub fn technician_router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}/appointments",
            get(appointments::list_for_technician),
        )
        .route("/{id}/stats", get(technicians::stats))
}
