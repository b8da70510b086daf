//! System Usability Scale scoring and technician rating aggregation.

use crate::types::DbId;

/// Number of answers in a SUS questionnaire.
pub const SUS_QUESTION_COUNT: usize = 10;

/// Smallest accepted Likert answer.
pub const SUS_MIN_ANSWER: i16 = 1;

/// Largest accepted Likert answer.
pub const SUS_MAX_ANSWER: i16 = 5;

/// Validate that exactly ten answers are present, each within 1..=5.
pub fn validate_answers(answers: &[i16]) -> Result<(), String> {
    if answers.len() != SUS_QUESTION_COUNT {
        return Err(format!(
            "Expected {SUS_QUESTION_COUNT} SUS answers, got {}",
            answers.len()
        ));
    }
    if let Some((idx, bad)) = answers
        .iter()
        .enumerate()
        .find(|(_, a)| !(SUS_MIN_ANSWER..=SUS_MAX_ANSWER).contains(*a))
    {
        return Err(format!(
            "SUS answer {} is {bad}; answers must be between {SUS_MIN_ANSWER} and {SUS_MAX_ANSWER}",
            idx + 1
        ));
    }
    Ok(())
}

/// Raw SUS score in [0, 100].
///
/// Odd-numbered questions (even indices) are positively worded and contribute
/// `answer - 1`; even-numbered questions contribute `5 - answer`.
pub fn sus_score(answers: &[i16]) -> Result<f64, String> {
    validate_answers(answers)?;
    let sum: i16 = answers
        .iter()
        .enumerate()
        .map(|(i, &a)| if i % 2 == 0 { a - 1 } else { 5 - a })
        .sum();
    Ok(f64::from(sum) * 2.5)
}

/// SUS score rounded to the nearest integer for storage.
pub fn sus_rating(answers: &[i16]) -> Result<i16, String> {
    // Scores are multiples of 2.5 in [0, 100], so the cast cannot truncate.
    sus_score(answers).map(|score| score.round() as i16)
}

/// Running rating totals for a technician.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingAggregate {
    pub rating_sum: i64,
    pub rating_count: i64,
}

impl RatingAggregate {
    /// Fold a ticket's rating into the aggregate. A ticket that was already
    /// rated replaces its previous contribution instead of counting twice.
    pub fn apply(self, previous: Option<i16>, rating: i16) -> Self {
        match previous {
            Some(old) => Self {
                rating_sum: self.rating_sum - i64::from(old) + i64::from(rating),
                rating_count: self.rating_count,
            },
            None => Self {
                rating_sum: self.rating_sum + i64::from(rating),
                rating_count: self.rating_count + 1,
            },
        }
    }

    pub fn average(self) -> Option<f64> {
        (self.rating_count > 0).then(|| self.rating_sum as f64 / self.rating_count as f64)
    }

    fn withdrawn(old: i16) -> Self {
        Self {
            rating_sum: -i64::from(old),
            rating_count: -1,
        }
    }
}

/// A stored rating and the technician whose totals it was added to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditedRating {
    pub rating: i16,
    pub technician: DbId,
}

/// Per-technician deltas for rating a ticket now assigned to `assignee`.
///
/// A rating only ever counts for the technician it was credited to. When
/// that is still the assignee the old value is replaced in place; otherwise
/// it is withdrawn from the old technician and the new rating starts fresh
/// for the assignee.
pub fn rating_deltas(
    prior: Option<CreditedRating>,
    assignee: Option<DbId>,
    rating: i16,
) -> Vec<(DbId, RatingAggregate)> {
    match (prior, assignee) {
        (Some(prior), Some(assignee)) if prior.technician == assignee => vec![(
            assignee,
            RatingAggregate::default().apply(Some(prior.rating), rating),
        )],
        (prior, assignee) => prior
            .map(|p| (p.technician, RatingAggregate::withdrawn(p.rating)))
            .into_iter()
            .chain(assignee.map(|a| (a, RatingAggregate::default().apply(None, rating))))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_case_scores_100() {
        assert_eq!(sus_rating(&[5, 1, 5, 1, 5, 1, 5, 1, 5, 1]), Ok(100));
    }

    #[test]
    fn worst_case_scores_0() {
        assert_eq!(sus_rating(&[1, 5, 1, 5, 1, 5, 1, 5, 1, 5]), Ok(0));
    }

    #[test]
    fn all_threes_score_50() {
        assert_eq!(sus_rating(&[3; 10]), Ok(50));
    }

    #[test]
    fn half_points_round() {
        // Contributions: 4 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + 3 = 39 -> 97.5
        let answers = [5, 1, 5, 1, 5, 1, 5, 1, 5, 2];
        assert_eq!(sus_score(&answers), Ok(97.5));
        assert_eq!(sus_rating(&answers), Ok(98));
    }

    #[test]
    fn wrong_length_rejected() {
        let err = sus_score(&[3; 9]).unwrap_err();
        assert!(err.contains("Expected 10"));
    }

    #[test]
    fn out_of_range_answer_rejected() {
        let err = sus_score(&[3, 3, 3, 6, 3, 3, 3, 3, 3, 3]).unwrap_err();
        assert!(err.contains("answer 4"));
        assert!(sus_score(&[0; 10]).is_err());
    }

    #[test]
    fn first_rating_increments_count() {
        let agg = RatingAggregate::default().apply(None, 80);
        assert_eq!(agg, RatingAggregate { rating_sum: 80, rating_count: 1 });
        assert_eq!(agg.average(), Some(80.0));
    }

    #[test]
    fn re_rating_replaces_previous_contribution() {
        let agg = RatingAggregate::default().apply(None, 80).apply(None, 60);
        let agg = agg.apply(Some(60), 100);
        assert_eq!(agg.rating_count, 2);
        assert_eq!(agg.average(), Some(90.0));
    }

    #[test]
    fn re_rating_same_technician_replaces_in_place() {
        let prior = CreditedRating { rating: 100, technician: 7 };
        assert_eq!(
            rating_deltas(Some(prior), Some(7), 50),
            vec![(7, RatingAggregate { rating_sum: -50, rating_count: 0 })]
        );
    }

    #[test]
    fn rating_given_while_unassigned_counts_fresh_for_new_assignee() {
        assert_eq!(
            rating_deltas(None, Some(7), 50),
            vec![(7, RatingAggregate { rating_sum: 50, rating_count: 1 })]
        );
    }

    #[test]
    fn reassigned_ticket_moves_the_rating_between_technicians() {
        let prior = CreditedRating { rating: 80, technician: 7 };
        assert_eq!(
            rating_deltas(Some(prior), Some(8), 60),
            vec![
                (7, RatingAggregate { rating_sum: -80, rating_count: -1 }),
                (8, RatingAggregate { rating_sum: 60, rating_count: 1 }),
            ]
        );
    }

    #[test]
    fn unassigned_ticket_only_withdraws_the_old_credit() {
        let prior = CreditedRating { rating: 80, technician: 7 };
        assert_eq!(
            rating_deltas(Some(prior), None, 60),
            vec![(7, RatingAggregate { rating_sum: -80, rating_count: -1 })]
        );
        assert!(rating_deltas(None, None, 60).is_empty());
    }

    #[test]
    fn empty_aggregate_has_no_average() {
        assert_eq!(RatingAggregate::default().average(), None);
    }
}
