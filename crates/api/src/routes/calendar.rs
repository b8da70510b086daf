use axum::routing::post;
use axum::Router;

use crate::handlers::calendar;
use crate::state::AppState;

/// Routes mounted at `/calendar`.
///
/// ```text
/// POST   /sync   -> sync
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/sync", post(calendar::sync))
}
