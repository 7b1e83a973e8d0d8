//! crates/mydrive_core/src/domain.rs
//!
//! Defines the pure, core data structures for the telemetry engine.
//! These structs are independent of any database or transport format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single GPS fix delivered by the location provider.
///
/// Ownership is transferred into the active session's buffer; a recorded
/// sample is never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_ms: i64,
}

/// One accelerometer or gyroscope reading at a single instant.
///
/// Buffered per session and discarded after reduction to a peak magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Broad road category from reverse geocoding the journey's start point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadType {
    Highway,
    City,
    Rural,
    Unknown,
}

impl RoadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoadType::Highway => "highway",
            RoadType::City => "city",
            RoadType::Rural => "rural",
            RoadType::Unknown => "unknown",
        }
    }

    /// Parses the stored label, falling back to `Unknown` for anything
    /// unrecognised (older records are read, never migrated).
    pub fn from_label(label: &str) -> Self {
        match label {
            "highway" => RoadType::Highway,
            "city" => RoadType::City,
            "rural" => RoadType::Rural,
            _ => RoadType::Unknown,
        }
    }
}

/// The four 0-100 sub-scores and their weighted composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub total: i64,
    pub braking: i64,
    pub cornering: i64,
    pub phone_distraction: i64,
    pub speed: i64,
}

/// One completed tracked drive with its derived metrics.
///
/// Created only when a tracking session stops; immutable thereafter. The
/// journey store owns the persisted copy, keyed by `user_id`; deletion is
/// the only lifecycle transition besides creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub length_minutes: i64,
    pub distance: f64,
    pub speed: f64,
    pub braking_acceleration: f64,
    pub cornering: f64,
    pub phone_usage: bool,
    pub phone_call_status: bool,
    pub road_type: RoadType,
    /// `None` for records written before scoring existed; a journey
    /// finalized by a tracking session always carries `Some`.
    pub scores: Option<Score>,
}

/// Transient answer to a discount eligibility query.
///
/// Recomputed on every evaluation; the reference code is regenerated each
/// time a user evaluates as eligible and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub eligible: bool,
    pub reference_code: Option<String>,
}

impl EligibilityResult {
    pub fn ineligible() -> Self {
        Self {
            eligible: false,
            reference_code: None,
        }
    }
}
