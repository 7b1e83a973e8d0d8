//! crates/mydrive_core/src/eligibility.rs
//!
//! Longitudinal eligibility rules evaluated over a user's journey history.
//!
//! Two rules: a short-term mileage threshold that gates the user's first
//! score, and a long-term consistency rule that gates an insurance discount.
//! Both are recomputed on every query; nothing here is persisted.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, Utc};
use uuid::Uuid;

use crate::domain::{EligibilityResult, Journey};

/// Distance a user must cover before their first score is released.
pub const MIN_SCORED_DISTANCE: f64 = 400.0;
/// Trailing window, in days, over which the mileage threshold is summed.
pub const SCORE_WINDOW_DAYS: i64 = 60;

/// Days of history required before the discount rule can pass.
pub const DISCOUNT_MIN_DAYS: f64 = 365.0;
/// Fraction of elapsed months that must contain a scored journey.
pub const DISCOUNT_CONSISTENCY_RATIO: f64 = 0.75;

/// Whether the user has driven far enough, recently enough, to be scored.
pub fn score_eligible(journeys: &[Journey]) -> bool {
    score_eligible_at(journeys, Utc::now())
}

/// [`score_eligible`] against an explicit evaluation instant.
pub fn score_eligible_at(journeys: &[Journey], now: DateTime<Utc>) -> bool {
    let window_start = now - Duration::days(SCORE_WINDOW_DAYS);
    let recent_distance: f64 = journeys
        .iter()
        .filter(|journey| journey.start_date >= window_start)
        .map(|journey| journey.distance)
        .sum();
    recent_distance >= MIN_SCORED_DISTANCE
}

/// Whether the user qualifies for an insurance discount.
///
/// Requires at least a year since the first journey and a scored journey in
/// at least 75% of the months elapsed since then. Months are approximated
/// as 30-day blocks of the elapsed span, not calendar months; the
/// consistency threshold was tuned against that approximation, so it is
/// kept as-is.
pub fn check_discount_eligibility(journeys: &[Journey]) -> EligibilityResult {
    check_discount_eligibility_at(journeys, Utc::now())
}

/// [`check_discount_eligibility`] against an explicit evaluation instant.
pub fn check_discount_eligibility_at(
    journeys: &[Journey],
    now: DateTime<Utc>,
) -> EligibilityResult {
    let first_date = match journeys.iter().map(|journey| journey.start_date).min() {
        Some(date) => date,
        None => return EligibilityResult::ineligible(),
    };

    let days_since_first = (now - first_date).num_seconds() as f64 / 86_400.0;
    let has_one_year = days_since_first >= DISCOUNT_MIN_DAYS;

    // Distinct calendar months containing at least one scored journey.
    let mut scored_months: HashSet<(i32, u32)> = HashSet::new();
    for journey in journeys {
        if journey.scores.is_some() {
            scored_months.insert((journey.start_date.year(), journey.start_date.month()));
        }
    }

    let months_since_first = (days_since_first / 30.0).floor() as i64;
    let consistency = months_since_first > 0
        && scored_months.len() as f64 / months_since_first as f64 >= DISCOUNT_CONSISTENCY_RATIO;

    if has_one_year && consistency {
        EligibilityResult {
            eligible: true,
            reference_code: Some(generate_reference_code()),
        }
    } else {
        EligibilityResult::ineligible()
    }
}

/// An 8-character uppercase code, fresh on every eligible evaluation.
fn generate_reference_code() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..8].to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RoadType, Score};
    use chrono::TimeZone;

    fn journey_on(start_date: DateTime<Utc>, distance: f64, scored: bool) -> Journey {
        Journey {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            start_date,
            length_minutes: 30,
            distance,
            speed: 40.0,
            braking_acceleration: 1.0,
            cornering: 1.0,
            phone_usage: false,
            phone_call_status: false,
            road_type: RoadType::City,
            scores: scored.then_some(Score {
                total: 60,
                braking: 60,
                cornering: 60,
                phone_distraction: 60,
                speed: 60,
            }),
        }
    }

    #[test]
    fn empty_history_is_not_score_eligible() {
        assert!(!score_eligible_at(&[], Utc::now()));
    }

    #[test]
    fn recent_mileage_over_threshold_is_eligible() {
        let now = Utc::now();
        let history = vec![journey_on(now, 500.0, true)];
        assert!(score_eligible_at(&history, now));
    }

    #[test]
    fn mileage_outside_the_window_does_not_count() {
        let now = Utc::now();
        let history = vec![journey_on(now - Duration::days(61), 500.0, true)];
        assert!(!score_eligible_at(&history, now));
    }

    #[test]
    fn mileage_accumulates_across_journeys() {
        let now = Utc::now();
        let history = vec![
            journey_on(now - Duration::days(10), 150.0, true),
            journey_on(now - Duration::days(30), 150.0, true),
            journey_on(now - Duration::days(59), 150.0, true),
        ];
        assert!(score_eligible_at(&history, now));
    }

    #[test]
    fn empty_history_is_not_discount_eligible() {
        let result = check_discount_eligibility_at(&[], Utc::now());
        assert!(!result.eligible);
        assert_eq!(result.reference_code, None);
    }

    #[test]
    fn thirteen_scored_months_earn_a_reference_code() {
        let now = Utc.with_ymd_and_hms(2025, 7, 15, 12, 0, 0).unwrap();
        let history: Vec<Journey> = (0..=13)
            .map(|months_back| journey_on(now - Duration::days(30 * months_back), 20.0, true))
            .collect();

        let result = check_discount_eligibility_at(&history, now);
        assert!(result.eligible);
        let code = result.reference_code.expect("eligible result carries a code");
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn reference_codes_are_regenerated_per_evaluation() {
        let now = Utc.with_ymd_and_hms(2025, 7, 15, 12, 0, 0).unwrap();
        let history: Vec<Journey> = (0..=13)
            .map(|months_back| journey_on(now - Duration::days(30 * months_back), 20.0, true))
            .collect();

        let first = check_discount_eligibility_at(&history, now);
        let second = check_discount_eligibility_at(&history, now);
        // Both eligible, but the code is not stable across calls.
        assert!(first.eligible && second.eligible);
        assert_ne!(first.reference_code, second.reference_code);
    }

    #[test]
    fn a_hundred_days_of_history_is_too_short() {
        let now = Utc.with_ymd_and_hms(2025, 7, 15, 12, 0, 0).unwrap();
        let history: Vec<Journey> = (0..3)
            .map(|months_back| journey_on(now - Duration::days(100 - 30 * months_back), 20.0, true))
            .collect();

        let result = check_discount_eligibility_at(&history, now);
        assert!(!result.eligible);
        assert_eq!(result.reference_code, None);
    }

    #[test]
    fn unscored_months_break_consistency() {
        let now = Utc.with_ymd_and_hms(2025, 7, 15, 12, 0, 0).unwrap();
        // Old enough, but only 5 of ~16 elapsed months have scored journeys.
        let mut history: Vec<Journey> =
            (0..5).map(|months_back| journey_on(now - Duration::days(30 * months_back), 20.0, true)).collect();
        history.push(journey_on(now - Duration::days(480), 20.0, false));

        let result = check_discount_eligibility_at(&history, now);
        assert!(!result.eligible);
    }
}
