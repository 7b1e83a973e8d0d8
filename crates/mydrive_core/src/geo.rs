//! crates/mydrive_core/src/geo.rs
//!
//! Geodesic distance and speed calculations over GPS fixes.

use crate::domain::LocationSample;

/// Mean Earth radius in kilometres; all distances are returned in the same
/// unit. Callers convert as needed.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two fixes via the Haversine formula.
///
/// Symmetric in its arguments and zero for coincident points.
pub fn distance(a: &LocationSample, b: &LocationSample) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + (d_lon / 2.0).sin().powi(2) * lat1.cos() * lat2.cos();
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Sum of [`distance`] over consecutive pairs; 0 for fewer than two fixes.
pub fn total_distance(samples: &[LocationSample]) -> f64 {
    samples.windows(2).map(|pair| distance(&pair[0], &pair[1])).sum()
}

/// Average speed in distance units per hour over the sequence's time span.
///
/// Returns 0 for fewer than two fixes, which also guards the division by a
/// zero elapsed time.
pub fn average_speed(samples: &[LocationSample]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let first = &samples[0];
    let last = &samples[samples.len() - 1];
    let elapsed_hours = (last.timestamp_ms - first.timestamp_ms) as f64 / 3_600_000.0;
    total_distance(samples) / elapsed_hours
}
