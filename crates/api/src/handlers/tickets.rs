//! Handlers for the `/tickets` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use servicedesk_core::error::CoreError;
use servicedesk_core::roles;
use servicedesk_core::ticket_status;
use servicedesk_core::types::DbId;
use servicedesk_db::models::audit::TicketAuditLog;
use servicedesk_db::models::ticket::{CreateTicket, Ticket, TicketFilter};

use crate::engine::tickets::{self, AdminTicketUpdate};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::{RequireAdmin, RequireTechnician};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Query parameters for `GET /tickets`. `status` accepts any recognized
/// spelling.
#[derive(Debug, Default, Deserialize)]
pub struct TicketListQuery {
    pub status: Option<String>,
    pub assigned_to_id: Option<DbId>,
    pub created_by_id: Option<DbId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RejectTicket {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CloseTicket {
    pub resolution_note: String,
    pub checklist: Option<serde_json::Value>,
}

/// Ten SUS answers, each 1 to 5.
#[derive(Debug, Deserialize)]
pub struct SubmitFeedback {
    pub answers: Vec<i16>,
    pub comment: Option<String>,
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// POST /api/v1/tickets
pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateTicket>,
) -> AppResult<(StatusCode, Json<DataResponse<Ticket>>)> {
    let ticket = tickets::create_ticket(&state, &auth, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: ticket })))
}

/// GET /api/v1/tickets
///
/// Requesters only ever see their own tickets.
pub async fn list(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<TicketListQuery>,
) -> AppResult<Json<DataResponse<Vec<Ticket>>>> {
    let status = params
        .status
        .as_deref()
        .map(ticket_status::parse_strict)
        .transpose()
        .map_err(CoreError::Validation)?;

    let created_by_id = if roles::can_work_tickets(&auth.role) {
        params.created_by_id
    } else {
        Some(auth.user_id)
    };

    let filter = TicketFilter {
        status,
        assigned_to_id: params.assigned_to_id,
        created_by_id,
        limit: params.limit,
        offset: params.offset,
    };
    let tickets = tickets::list_tickets(&state.pool, &filter).await?;
    Ok(Json(DataResponse { data: tickets }))
}

/// GET /api/v1/tickets/{id}
pub async fn get_by_id(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Ticket>>> {
    let ticket = tickets::get_ticket(&state.pool, id).await?;
    Ok(Json(DataResponse { data: ticket }))
}

/// PUT /api/v1/tickets/{id}
pub async fn admin_update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<AdminTicketUpdate>,
) -> AppResult<Json<DataResponse<Ticket>>> {
    let ticket = tickets::admin_update_ticket(&state, &admin, id, input).await?;
    Ok(Json(DataResponse { data: ticket }))
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// POST /api/v1/tickets/{id}/accept
pub async fn accept(
    RequireTechnician(user): RequireTechnician,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Ticket>>> {
    let ticket = tickets::accept_ticket(&state, &user, id).await?;
    Ok(Json(DataResponse { data: ticket }))
}

/// POST /api/v1/tickets/{id}/reject
pub async fn reject(
    RequireTechnician(user): RequireTechnician,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<RejectTicket>,
) -> AppResult<Json<DataResponse<Ticket>>> {
    let ticket = tickets::reject_ticket(&state, &user, id, &input.reason).await?;
    Ok(Json(DataResponse { data: ticket }))
}

/// POST /api/v1/tickets/{id}/close
pub async fn close(
    RequireTechnician(user): RequireTechnician,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<CloseTicket>,
) -> AppResult<Json<DataResponse<Ticket>>> {
    let ticket =
        tickets::close_ticket(&state, &user, id, &input.resolution_note, input.checklist).await?;
    Ok(Json(DataResponse { data: ticket }))
}

/// POST /api/v1/tickets/{id}/feedback
pub async fn feedback(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<SubmitFeedback>,
) -> AppResult<Json<DataResponse<Ticket>>> {
    let ticket = tickets::submit_feedback(&state, &auth, id, input.answers, input.comment).await?;
    Ok(Json(DataResponse { data: ticket }))
}

/// GET /api/v1/tickets/{id}/audit
pub async fn audit(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<TicketAuditLog>>>> {
    let entries = tickets::list_audit(&state.pool, id).await?;
    Ok(Json(DataResponse { data: entries }))
}
