//! Handler for manual calendar syncs.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::engine::reconciler::{self, SyncOutcome};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub calendar_id: String,
    /// Skip the per-user cooldown.
    #[serde(default)]
    pub force: bool,
}

/// POST /api/v1/calendar/sync
///
/// Syncs the caller's own busy blocks.
pub async fn sync(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<SyncRequest>,
) -> AppResult<Json<DataResponse<SyncOutcome>>> {
    let outcome =
        reconciler::sync_user_calendar(&state, auth.user_id, &input.calendar_id, input.force)
            .await?;
    Ok(Json(DataResponse { data: outcome }))
}
