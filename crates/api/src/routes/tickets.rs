//! Route definitions for the `/tickets` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::tickets;
use crate::state::AppState;

/// Routes mounted at `/tickets`.
///
/// ```text
/// GET    /                 -> list
/// POST   /                 -> create
/// GET    /{id}             -> get_by_id
/// PUT    /{id}             -> admin_update (admin)
/// POST   /{id}/accept      -> accept (technician)
/// POST   /{id}/reject      -> reject (technician)
/// POST   /{id}/close       -> close (technician)
/// POST   /{id}/feedback    -> feedback
/// GET    /{id}/audit       -> audit
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(tickets::list).post(tickets::create))
        .route("/{id}", get(tickets::get_by_id).put(tickets::admin_update))
        .route("/{id}/accept", post(tickets::accept))
        .route("/{id}/reject", post(tickets::reject))
        .route("/{id}/close", post(tickets::close))
        .route("/{id}/feedback", post(tickets::feedback))
        .route("/{id}/audit", get(tickets::audit))
}
