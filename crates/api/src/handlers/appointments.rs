//! Handlers for `/appointments` and a technician's schedule.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use servicedesk_core::appointment::RescheduleDecision;
use servicedesk_core::types::DbId;
use servicedesk_db::models::appointment::Appointment;

use crate::engine::scheduler::{self, BookAppointment, ProposeReschedule};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireTechnician;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body for `POST /appointments/{id}/reschedule/respond`.
#[derive(Debug, Deserialize)]
pub struct RespondReschedule {
    /// `accept` or `reject`.
    pub action: String,
}

/// Inclusive local date range for a schedule listing.
#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// POST /api/v1/appointments
pub async fn create(
    RequireTechnician(user): RequireTechnician,
    State(state): State<AppState>,
    Json(input): Json<BookAppointment>,
) -> AppResult<(StatusCode, Json<DataResponse<Appointment>>)> {
    let appointment = scheduler::create_appointment(&state, &user, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: appointment })))
}

/// GET /api/v1/appointments/{id}
pub async fn get_by_id(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Appointment>>> {
    let appointment = scheduler::get_appointment(&state, id).await?;
    Ok(Json(DataResponse { data: appointment }))
}

/// POST /api/v1/appointments/{id}/reschedule
pub async fn request_reschedule(
    RequireTechnician(user): RequireTechnician,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ProposeReschedule>,
) -> AppResult<Json<DataResponse<Appointment>>> {
    let appointment = scheduler::request_reschedule(&state, &user, id, &input).await?;
    Ok(Json(DataResponse { data: appointment }))
}

/// POST /api/v1/appointments/{id}/reschedule/respond
pub async fn respond_reschedule(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<RespondReschedule>,
) -> AppResult<Json<DataResponse<Appointment>>> {
    let decision = RescheduleDecision::parse(&input.action)?;
    let appointment = scheduler::respond_reschedule(&state, &auth, id, decision).await?;
    Ok(Json(DataResponse { data: appointment }))
}

/// POST /api/v1/appointments/{id}/cancel
pub async fn cancel(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Appointment>>> {
    let appointment = scheduler::cancel_appointment(&state, &auth, id).await?;
    Ok(Json(DataResponse { data: appointment }))
}

/// GET /api/v1/technicians/{id}/appointments?from=YYYY-MM-DD&to=YYYY-MM-DD
pub async fn list_for_technician(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(technician_id): Path<DbId>,
    Query(range): Query<ScheduleQuery>,
) -> AppResult<Json<DataResponse<Vec<Appointment>>>> {
    let appointments =
        scheduler::list_technician_appointments(&state, technician_id, range.from, range.to)
            .await?;
    Ok(Json(DataResponse { data: appointments }))
}
