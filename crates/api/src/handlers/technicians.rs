//! Handlers for per-technician summaries.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use servicedesk_core::error::CoreError;
use servicedesk_core::types::DbId;
use servicedesk_db::models::technician_stats::TechnicianStats;
use servicedesk_db::repositories::TechnicianStatsRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TechnicianSummary {
    #[serde(flatten)]
    pub stats: TechnicianStats,
    /// Mean SUS rating; `null` before the first feedback.
    pub average_rating: Option<f64>,
}

/// GET /api/v1/technicians/{id}/stats
pub async fn stats(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(technician_id): Path<DbId>,
) -> AppResult<Json<DataResponse<TechnicianSummary>>> {
    let stats = TechnicianStatsRepo::find(&state.pool, technician_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "TechnicianStats",
            id: technician_id,
        }))?;
    let average_rating = stats.average_rating();
    Ok(Json(DataResponse {
        data: TechnicianSummary {
            stats,
            average_rating,
        },
    }))
}
