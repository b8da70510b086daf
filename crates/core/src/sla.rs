//! SLA clock: whole-minute durations between ticket timestamps.

use crate::types::Timestamp;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// `floor((b - a) / 60000)` in milliseconds.
///
/// Inputs are expected to be ordered. Clock skew that puts `b` before `a`
/// yields 0 rather than a negative duration.
pub fn minutes_between(a: Timestamp, b: Timestamp) -> i32 {
    let millis = (b - a).num_milliseconds();
    let minutes = millis.div_euclid(MILLIS_PER_MINUTE).max(0);
    i32::try_from(minutes).unwrap_or(i32::MAX)
}

/// Request-to-first-accept time.
pub fn response_time(created_at: Timestamp, accepted_at: Timestamp) -> i32 {
    minutes_between(created_at, accepted_at)
}

/// Work-start-to-completion time. Work starts at acceptance, or at creation
/// for tickets closed without an explicit accept.
pub fn resolution_time(
    created_at: Timestamp,
    accepted_at: Option<Timestamp>,
    completed_at: Timestamp,
) -> i32 {
    minutes_between(accepted_at.unwrap_or(created_at), completed_at)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    #[test]
    fn floors_partial_minutes() {
        assert_eq!(minutes_between(t0(), t0() + Duration::seconds(59)), 0);
        assert_eq!(minutes_between(t0(), t0() + Duration::seconds(60)), 1);
        assert_eq!(minutes_between(t0(), t0() + Duration::milliseconds(179_999)), 2);
    }

    #[test]
    fn spans_days() {
        assert_eq!(minutes_between(t0(), t0() + Duration::days(2)), 2 * 24 * 60);
    }

    #[test]
    fn reversed_inputs_clamp_to_zero() {
        assert_eq!(minutes_between(t0(), t0() - Duration::minutes(5)), 0);
    }

    #[test]
    fn resolution_starts_at_acceptance_when_present() {
        let accepted = t0() + Duration::minutes(30);
        let done = t0() + Duration::minutes(90);
        assert_eq!(resolution_time(t0(), Some(accepted), done), 60);
    }

    #[test]
    fn resolution_falls_back_to_creation() {
        let done = t0() + Duration::minutes(90);
        assert_eq!(resolution_time(t0(), None, done), 90);
    }

    #[test]
    fn response_time_is_created_to_accepted() {
        assert_eq!(response_time(t0(), t0() + Duration::minutes(17)), 17);
    }
}
