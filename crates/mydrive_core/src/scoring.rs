//! crates/mydrive_core/src/scoring.rs
//!
//! Scoring logic for journeys based on the telematics data recorded.
//!
//! The numeric behavior here is a product contract: the weights, the
//! normalisation, and the rounding order are frozen. Sub-scores are rounded
//! independently for display, while the composite is computed from the
//! unrounded values and rounded once.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Journey, RoadType, Score};

/// Maps a value into 0-100 against the given range, higher input giving a
/// lower result.
fn normalise(value: f64, min: f64, max: f64) -> f64 {
    ((max - value) / (max - min) * 100.0).clamp(0.0, 100.0)
}

/// Calculates the four sub-scores and their weighted composite for a journey.
pub fn calculate_score(journey: &Journey) -> Score {
    // Road type weighting: city driving penalised hardest, rural slightly.
    let road_weight = match journey.road_type {
        RoadType::City => 1.2,
        RoadType::Rural => 1.1,
        _ => 1.0,
    };

    let braking_score =
        (100.0 - normalise(journey.braking_acceleration, 0.0, 5.0) * 5.0 * road_weight)
            .clamp(0.0, 100.0);

    let cornering_score = (100.0 - normalise(journey.cornering, 0.0, 4.0) * 4.0 * road_weight)
        .clamp(0.0, 100.0);

    // Average speed over 60 penalised superlinearly.
    let speed_penalty = if journey.speed > 60.0 {
        (journey.speed - 60.0).powf(1.5) * 1.5
    } else {
        0.0
    };
    let speed_score = (100.0 - speed_penalty).clamp(0.0, 100.0);

    // Phone distraction: usage and calls penalised, compounded when usage
    // coincides with harsh braking or cornering.
    let mut phone_penalty: f64 = 0.0;
    if journey.phone_usage {
        phone_penalty += 15.0;
    }
    if journey.phone_call_status {
        phone_penalty += 10.0;
    }
    if journey.phone_usage && (journey.braking_acceleration > 2.0 || journey.cornering > 2.0) {
        phone_penalty += 10.0;
    }
    let phone_distraction_score = (100.0 - phone_penalty).clamp(0.0, 100.0);

    // The composite uses the unrounded sub-scores; rounding first would
    // shift boundary values.
    let total = braking_score * 0.3
        + cornering_score * 0.25
        + phone_distraction_score * 0.25
        + speed_score * 0.2;

    Score {
        total: total.round() as i64,
        braking: braking_score.round() as i64,
        cornering: cornering_score.round() as i64,
        phone_distraction: phone_distraction_score.round() as i64,
        speed: speed_score.round() as i64,
    }
}

/// Mean of `scores.total` over the trailing 30 days, rounded to the nearest
/// integer. Journeys without a score count as zero toward the mean.
pub fn thirty_day_average(journeys: &[Journey], now: DateTime<Utc>) -> i64 {
    let window_start = now - Duration::days(30);
    let recent: Vec<&Journey> = journeys
        .iter()
        .filter(|journey| journey.start_date >= window_start)
        .collect();

    if recent.is_empty() {
        return 0;
    }

    let total: i64 = recent
        .iter()
        .map(|journey| journey.scores.map(|s| s.total).unwrap_or(0))
        .sum();
    (total as f64 / recent.len() as f64).round() as i64
}
