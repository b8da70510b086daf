pub mod appointments;
pub mod busy_blocks;
pub mod calendar;
pub mod health;
pub mod notifications;
pub mod tickets;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /tickets                             list, create
/// /tickets/{id}                        get, admin update
/// /tickets/{id}/accept|reject|close    guarded transitions
/// /tickets/{id}/feedback               SUS feedback
/// /tickets/{id}/audit                  audit trail
///
/// /appointments                        book
/// /appointments/{id}                   get
/// /appointments/{id}/reschedule        propose a new time
/// /appointments/{id}/reschedule/respond  accept or reject
/// /appointments/{id}/cancel            cancel
/// /technicians/{id}/appointments       schedule
/// /technicians/{id}/stats              resolved count and rating
///
/// /busy-blocks                         list, create (own)
/// /calendar/sync                       import own calendar
/// /notifications                       list (own)
/// /notifications/{id}/read             mark read
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/tickets", tickets::router())
        .nest("/appointments", appointments::router())
        .nest("/technicians", appointments::technician_router())
        .nest("/busy-blocks", busy_blocks::router())
        .nest("/calendar", calendar::router())
        .nest("/notifications", notifications::router())
}
