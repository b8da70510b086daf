//! Per-technician lifetime counters.

use serde::Serialize;
use servicedesk_core::sus::RatingAggregate;
use servicedesk_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `technician_stats` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TechnicianStats {
    pub user_id: DbId,
    pub resolved_count: i64,
    pub rating_sum: i64,
    pub rating_count: i64,
    pub updated_at: Timestamp,
}

impl TechnicianStats {
    pub fn aggregate(&self) -> RatingAggregate {
        RatingAggregate {
            rating_sum: self.rating_sum,
            rating_count: self.rating_count,
        }
    }

    /// Running average rating, if any feedback has been recorded.
    pub fn average_rating(&self) -> Option<f64> {
        self.aggregate().average()
    }
}
