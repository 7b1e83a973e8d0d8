//! services/telemetry/src/adapters/store.rs
//!
//! This module contains the journey store adapter, which is the concrete
//! implementation of the `JourneyStore` port from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mydrive_core::domain::{Journey, RoadType, Score};
use mydrive_core::ports::{JourneyStore, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `JourneyStore` port.
#[derive(Clone)]
pub struct PgJourneyStore {
    pool: PgPool,
}

impl PgJourneyStore {
    /// Creates a new `PgJourneyStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct JourneyRecord {
    id: Uuid,
    user_id: Uuid,
    start_date: DateTime<Utc>,
    length_minutes: i64,
    distance: f64,
    speed: f64,
    braking_acceleration: f64,
    cornering: f64,
    phone_usage: bool,
    phone_call_status: bool,
    road_type: String,
    score_total: Option<i64>,
    score_braking: Option<i64>,
    score_cornering: Option<i64>,
    score_phone_distraction: Option<i64>,
    score_speed: Option<i64>,
}

impl JourneyRecord {
    fn to_domain(self) -> Journey {
        // Older rows may predate scoring; all five columns are written
        // together, so presence of the total implies the rest.
        let scores = match (
            self.score_total,
            self.score_braking,
            self.score_cornering,
            self.score_phone_distraction,
            self.score_speed,
        ) {
            (Some(total), Some(braking), Some(cornering), Some(phone_distraction), Some(speed)) => {
                Some(Score {
                    total,
                    braking,
                    cornering,
                    phone_distraction,
                    speed,
                })
            }
            _ => None,
        };

        Journey {
            id: self.id,
            user_id: self.user_id,
            start_date: self.start_date,
            length_minutes: self.length_minutes,
            distance: self.distance,
            speed: self.speed,
            braking_acceleration: self.braking_acceleration,
            cornering: self.cornering,
            phone_usage: self.phone_usage,
            phone_call_status: self.phone_call_status,
            road_type: RoadType::from_label(&self.road_type),
            scores,
        }
    }
}

//=========================================================================================
// `JourneyStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl JourneyStore for PgJourneyStore {
    async fn append_journey(&self, user_id: Uuid, journey: &Journey) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO journeys (
                id, user_id, start_date, length_minutes, distance, speed,
                braking_acceleration, cornering, phone_usage, phone_call_status,
                road_type, score_total, score_braking, score_cornering,
                score_phone_distraction, score_speed
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(journey.id)
        .bind(user_id)
        .bind(journey.start_date)
        .bind(journey.length_minutes)
        .bind(journey.distance)
        .bind(journey.speed)
        .bind(journey.braking_acceleration)
        .bind(journey.cornering)
        .bind(journey.phone_usage)
        .bind(journey.phone_call_status)
        .bind(journey.road_type.as_str())
        .bind(journey.scores.map(|s| s.total))
        .bind(journey.scores.map(|s| s.braking))
        .bind(journey.scores.map(|s| s.cornering))
        .bind(journey.scores.map(|s| s.phone_distraction))
        .bind(journey.scores.map(|s| s.speed))
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn list_journeys(&self, user_id: Uuid) -> PortResult<Vec<Journey>> {
        let records = sqlx::query_as::<_, JourneyRecord>(
            "SELECT id, user_id, start_date, length_minutes, distance, speed,
                    braking_acceleration, cornering, phone_usage, phone_call_status,
                    road_type, score_total, score_braking, score_cornering,
                    score_phone_distraction, score_speed
             FROM journeys WHERE user_id = $1 ORDER BY start_date ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(JourneyRecord::to_domain).collect())
    }

    async fn delete_journey(&self, user_id: Uuid, journey_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM journeys WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(journey_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Journey {} not found for user {}",
                journey_id, user_id
            )));
        }
        Ok(())
    }
}
