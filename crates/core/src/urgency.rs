//! Ticket urgency levels.
//!
//! Stored as SMALLINT so that queries can order by urgency directly.

use serde::{Deserialize, Serialize};

#[repr(i16)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low = 1,
    #[default]
    Normal = 2,
    Medium = 3,
    High = 4,
    Critical = 5,
}

impl Urgency {
    /// Return the database value.
    pub fn id(self) -> i16 {
        self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Urgency::Low),
            2 => Some(Urgency::Normal),
            3 => Some(Urgency::Medium),
            4 => Some(Urgency::High),
            5 => Some(Urgency::Critical),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }
}
