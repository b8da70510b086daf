//! Busy block entity models.

use chrono::NaiveDate;
use serde::Serialize;
use servicedesk_core::appointment::BusyWindow;
use servicedesk_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `busy_blocks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BusyBlock {
    pub id: DbId,
    pub user_id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub color: String,
    pub is_completed: bool,
    pub source: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl BusyBlock {
    /// The interval the availability check looks at.
    pub fn window(&self) -> BusyWindow {
        BusyWindow {
            date: self.date,
            start: self.start_time,
            end: self.end_time,
        }
    }
}
