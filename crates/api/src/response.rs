use serde::Serialize;

/// Success body for every JSON endpoint: `{ "data": ... }`.
/// Failures use the `{ "error", "code" }` shape from [`crate::error`].
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
