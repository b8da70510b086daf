//! Busy block provenance and validation.
//!
//! A busy block is either created by its owner (`manual`) or mirrored from
//! the external calendar (`external_calendar`). Reconciliation only ever
//! touches mirrored rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// Default color for manually created blocks.
pub const DEFAULT_BLOCK_COLOR: &str = "#6b7280";

/// Maximum length of a block title.
pub const MAX_BLOCK_TITLE_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusySource {
    Manual,
    ExternalCalendar,
}

impl BusySource {
    pub fn as_str(self) -> &'static str {
        match self {
            BusySource::Manual => "manual",
            BusySource::ExternalCalendar => "external_calendar",
        }
    }
}

/// A busy block ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct BusyBlockDraft {
    pub user_id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub color: String,
    pub is_completed: bool,
    pub source: BusySource,
}

/// Validate a manually entered block: a non-empty title, and start/end
/// either both present with `end > start` or both absent (all day).
pub fn validate_manual_block(
    title: &str,
    start_time: Option<Timestamp>,
    end_time: Option<Timestamp>,
) -> Result<(), String> {
    let title = title.trim();
    if title.is_empty() {
        return Err("Title must not be empty".to_string());
    }
    if title.chars().count() > MAX_BLOCK_TITLE_LEN {
        return Err(format!(
            "Title must be at most {MAX_BLOCK_TITLE_LEN} characters"
        ));
    }
    match (start_time, end_time) {
        (Some(start), Some(end)) if end <= start => {
            Err("End time must be after start time".to_string())
        }
        (Some(_), None) | (None, Some(_)) => Err(
            "Start and end time must both be given, or both omitted for an all-day block"
                .to_string(),
        ),
        _ => Ok(()),
    }
}
