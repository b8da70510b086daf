//! Role gates layered over [`AuthUser`].
//!
//! Ownership rules (assignee, requester) live in the engines; these only
//! check the role header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use servicedesk_core::error::CoreError;
use servicedesk_core::roles;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Resolve the principal and reject with 403 unless `allowed(role)` holds.
async fn principal_with_role(
    parts: &mut Parts,
    state: &AppState,
    allowed: fn(&str) -> bool,
    denial: &str,
) -> Result<AuthUser, AppError> {
    let user = AuthUser::from_request_parts(parts, state).await?;
    if allowed(&user.role) {
        Ok(user)
    } else {
        tracing::debug!(user_id = user.user_id, role = %user.role, "Role check failed");
        Err(CoreError::Forbidden(denial.to_string()).into())
    }
}

/// Admin-only routes, such as the privileged ticket update.
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        principal_with_role(parts, state, roles::is_admin, "Admin role required")
            .await
            .map(RequireAdmin)
    }
}

/// Routes that work tickets: accepting, closing, booking visits.
/// Admins pass as well.
pub struct RequireTechnician(pub AuthUser);

impl FromRequestParts<AppState> for RequireTechnician {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        principal_with_role(
            parts,
            state,
            roles::can_work_tickets,
            "Technician or admin role required",
        )
        .await
        .map(RequireTechnician)
    }
}
