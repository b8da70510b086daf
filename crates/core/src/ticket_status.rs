//! Canonical ticket statuses and the tolerant status normalizer.
//!
//! Ticket rows store status as free text so that historical spellings
//! ("Done", "in-progress", "NEW") survive migrations. Every read goes through
//! [`normalize`], and list queries match any spelling via [`variants_for`].
//!
//! Unknown input normalizes to [`TicketStatus::NotStart`]. This fail-open
//! default reclassifies unrecognized data as new work and hides data errors;
//! callers that care should check [`is_recognized`] first.

use serde::{Deserialize, Serialize};

/// The four canonical ticket states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    NotStart,
    InProgress,
    Completed,
    Rejected,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::NotStart,
        TicketStatus::InProgress,
        TicketStatus::Completed,
        TicketStatus::Rejected,
    ];

    /// The canonical spelling written to the database.
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::NotStart => "not_start",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Completed => "completed",
            TicketStatus::Rejected => "rejected",
        }
    }

    /// Completed and rejected tickets accept no further guarded transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, TicketStatus::Completed | TicketStatus::Rejected)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Synonym table
// ---------------------------------------------------------------------------

const NOT_START_VARIANTS: &[&str] = &[
    "not_start",
    "not_started",
    "new",
    "open",
    "pending",
    "todo",
    "waiting",
];

const IN_PROGRESS_VARIANTS: &[&str] = &[
    "in_progress",
    "inprogress",
    "progress",
    "accepted",
    "assigned",
    "scheduled",
    "working",
    "ongoing",
];

const COMPLETED_VARIANTS: &[&str] = &["completed", "complete", "done", "closed", "resolved"];

const REJECTED_VARIANTS: &[&str] = &["rejected", "reject", "declined", "denied", "cancelled", "canceled"];

/// Every accepted spelling of `status`, canonical spelling first.
pub fn variants_for(status: TicketStatus) -> &'static [&'static str] {
    match status {
        TicketStatus::NotStart => NOT_START_VARIANTS,
        TicketStatus::InProgress => IN_PROGRESS_VARIANTS,
        TicketStatus::Completed => COMPLETED_VARIANTS,
        TicketStatus::Rejected => REJECTED_VARIANTS,
    }
}

/// Lowercase, trim, and fold spaces and hyphens into underscores.
fn fold(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

fn lookup(raw: &str) -> Option<TicketStatus> {
    let key = fold(raw);
    TicketStatus::ALL
        .into_iter()
        .find(|status| variants_for(*status).contains(&key.as_str()))
}

/// Map a free-form status token to its canonical status.
pub fn normalize(raw: &str) -> TicketStatus {
    lookup(raw).unwrap_or(TicketStatus::NotStart)
}

/// Whether `raw` matches any known spelling.
pub fn is_recognized(raw: &str) -> bool {
    lookup(raw).is_some()
}

/// Parse a status strictly, rejecting unknown spellings.
pub fn parse_strict(raw: &str) -> Result<TicketStatus, String> {
    lookup(raw).ok_or_else(|| {
        format!(
            "Unknown ticket status '{raw}'. Must be one of: {}",
            TicketStatus::ALL.map(TicketStatus::as_str).join(", ")
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_spellings_round_trip() {
        for status in TicketStatus::ALL {
            assert_eq!(normalize(status.as_str()), status);
        }
    }

    #[test]
    fn completed_synonyms() {
        for raw in ["complete", "done", "closed", "resolved", "Completed"] {
            assert_eq!(normalize(raw), TicketStatus::Completed, "{raw}");
        }
    }

    #[test]
    fn separators_fold_to_underscore() {
        assert_eq!(normalize("In Progress"), TicketStatus::InProgress);
        assert_eq!(normalize("in-progress"), TicketStatus::InProgress);
        assert_eq!(normalize("  NOT-STARTED "), TicketStatus::NotStart);
    }

    #[test]
    fn unknown_falls_back_to_not_start() {
        assert_eq!(normalize("banana"), TicketStatus::NotStart);
        assert_eq!(normalize(""), TicketStatus::NotStart);
        assert!(!is_recognized("banana"));
    }

    #[test]
    fn normalize_never_leaves_the_canonical_set() {
        for raw in ["x", "DONE", "cancelled", "scheduled", "42", "in progress"] {
            assert!(TicketStatus::ALL.contains(&normalize(raw)));
        }
    }

    #[test]
    fn variants_lead_with_canonical_spelling() {
        for status in TicketStatus::ALL {
            assert_eq!(variants_for(status)[0], status.as_str());
        }
    }

    #[test]
    fn variant_sets_are_disjoint() {
        for a in TicketStatus::ALL {
            for b in TicketStatus::ALL {
                if a == b {
                    continue;
                }
                for v in variants_for(a) {
                    assert!(!variants_for(b).contains(v), "{v} in both {a} and {b}");
                }
            }
        }
    }

    #[test]
    fn strict_parse_rejects_unknown() {
        assert_eq!(parse_strict("resolved"), Ok(TicketStatus::Completed));
        let err = parse_strict("unknown").unwrap_err();
        assert!(err.contains("not_start"));
    }

    #[test]
    fn terminal_states() {
        assert!(TicketStatus::Completed.is_terminal());
        assert!(TicketStatus::Rejected.is_terminal());
        assert!(!TicketStatus::NotStart.is_terminal());
        assert!(!TicketStatus::InProgress.is_terminal());
    }
}
