use axum::routing::get;
use axum::Router;

use crate::handlers::busy_blocks;
use crate::state::AppState;

/// Routes mounted at `/busy-blocks`.
///
/// ```text
/// GET    /?from&to   -> list
/// POST   /           -> create
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(busy_blocks::list).post(busy_blocks::create))
}
