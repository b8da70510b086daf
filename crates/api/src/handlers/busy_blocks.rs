//! Handlers for the caller's own `/busy-blocks`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use servicedesk_core::busy_block::{
    validate_manual_block, BusyBlockDraft, BusySource, DEFAULT_BLOCK_COLOR,
};
use servicedesk_core::error::CoreError;
use servicedesk_core::types::Timestamp;
use servicedesk_db::models::busy_block::BusyBlock;
use servicedesk_db::repositories::BusyBlockRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Days listed when `to` is omitted.
const DEFAULT_RANGE_DAYS: i64 = 30;

/// A personal block. Omit both times for an all-day block.
#[derive(Debug, Deserialize)]
pub struct CreateBusyBlock {
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BusyBlockQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// POST /api/v1/busy-blocks
pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateBusyBlock>,
) -> AppResult<(StatusCode, Json<DataResponse<BusyBlock>>)> {
    validate_manual_block(&input.title, input.start_time, input.end_time)
        .map_err(CoreError::Validation)?;

    let draft = BusyBlockDraft {
        user_id: auth.user_id,
        title: input.title.trim().to_string(),
        description: input.description,
        date: input.date,
        start_time: input.start_time,
        end_time: input.end_time,
        color: input
            .color
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BLOCK_COLOR.to_string()),
        is_completed: false,
        source: BusySource::Manual,
    };
    let block = BusyBlockRepo::create(&state.pool, &draft).await?;

    tracing::info!(
        user_id = auth.user_id,
        block_id = block.id,
        date = %block.date,
        "Busy block created"
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: block })))
}

/// GET /api/v1/busy-blocks?from=YYYY-MM-DD&to=YYYY-MM-DD
///
/// Defaults to the next 30 days from today in the scheduling offset.
pub async fn list(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<BusyBlockQuery>,
) -> AppResult<Json<DataResponse<Vec<BusyBlock>>>> {
    let from = params.from.unwrap_or_else(|| {
        state
            .clock
            .now()
            .with_timezone(&state.config.schedule_offset)
            .date_naive()
    });
    let to = params
        .to
        .unwrap_or_else(|| from + Duration::days(DEFAULT_RANGE_DAYS));
    if to < from {
        return Err(AppError::BadRequest(
            "'to' must not be before 'from'".to_string(),
        ));
    }

    let blocks = BusyBlockRepo::list_for_user(&state.pool, auth.user_id, from, to).await?;
    Ok(Json(DataResponse { data: blocks }))
}
