//! services/telemetry/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use mydrive_core::domain::Journey;
use mydrive_core::ports::PortError;
use mydrive_core::{eligibility, scoring};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_journeys_handler,
        delete_journey_handler,
        score_eligibility_handler,
        discount_handler,
        average_score_handler,
    ),
    components(
        schemas(
            JourneyResponse,
            ScoreResponse,
            ScoreEligibilityResponse,
            DiscountResponse,
            AverageScoreResponse,
        )
    ),
    tags(
        (name = "MyDrive Telemetry API", description = "API endpoints for journey history and eligibility queries.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The four sub-scores and their weighted composite for one journey.
#[derive(Serialize, ToSchema)]
pub struct ScoreResponse {
    total: i64,
    braking: i64,
    cornering: i64,
    phone_distraction: i64,
    speed: i64,
}

/// One completed journey with its derived metrics.
#[derive(Serialize, ToSchema)]
pub struct JourneyResponse {
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
    scores: Option<ScoreResponse>,
}

impl From<Journey> for JourneyResponse {
    fn from(journey: Journey) -> Self {
        Self {
            id: journey.id,
            user_id: journey.user_id,
            start_date: journey.start_date,
            length_minutes: journey.length_minutes,
            distance: journey.distance,
            speed: journey.speed,
            braking_acceleration: journey.braking_acceleration,
            cornering: journey.cornering,
            phone_usage: journey.phone_usage,
            phone_call_status: journey.phone_call_status,
            road_type: journey.road_type.as_str().to_string(),
            scores: journey.scores.map(|s| ScoreResponse {
                total: s.total,
                braking: s.braking,
                cornering: s.cornering,
                phone_distraction: s.phone_distraction,
                speed: s.speed,
            }),
        }
    }
}

/// Whether the user has covered enough recent mileage to receive a score.
#[derive(Serialize, ToSchema)]
pub struct ScoreEligibilityResponse {
    eligible: bool,
}

/// Whether the user qualifies for an insurance discount. The reference code
/// is regenerated on each eligible evaluation.
#[derive(Serialize, ToSchema)]
pub struct DiscountResponse {
    eligible: bool,
    reference_code: Option<String>,
}

/// The user's mean journey score over the trailing 30 days.
#[derive(Serialize, ToSchema)]
pub struct AverageScoreResponse {
    average: i64,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List a user's journey history, oldest first.
#[utoipa::path(
    get,
    path = "/users/{user_id}/journeys",
    responses(
        (status = 200, description = "The user's journey history", body = [JourneyResponse]),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("user_id" = Uuid, Path, description = "The unique ID of the user.")
    )
)]
pub async fn list_journeys_handler(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let journeys = app_state
        .store
        .list_journeys(user_id)
        .await
        .map_err(internal_error)?;

    let response: Vec<JourneyResponse> = journeys.into_iter().map(JourneyResponse::from).collect();
    Ok(Json(response))
}

/// Delete a single journey from a user's history.
#[utoipa::path(
    delete,
    path = "/users/{user_id}/journeys/{journey_id}",
    responses(
        (status = 204, description = "Journey deleted"),
        (status = 404, description = "Journey not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("user_id" = Uuid, Path, description = "The unique ID of the user."),
        ("journey_id" = Uuid, Path, description = "The unique ID of the journey.")
    )
)]
pub async fn delete_journey_handler(
    State(app_state): State<Arc<AppState>>,
    Path((user_id, journey_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match app_state.store.delete_journey(user_id, journey_id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(PortError::NotFound(message)) => Err((StatusCode::NOT_FOUND, message)),
        Err(e) => Err(internal_error(e)),
    }
}

/// Report whether the user's recent mileage qualifies them for a score.
#[utoipa::path(
    get,
    path = "/users/{user_id}/score-eligibility",
    responses(
        (status = 200, description = "The mileage eligibility verdict", body = ScoreEligibilityResponse),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("user_id" = Uuid, Path, description = "The unique ID of the user.")
    )
)]
pub async fn score_eligibility_handler(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let journeys = app_state
        .store
        .list_journeys(user_id)
        .await
        .map_err(internal_error)?;

    Ok(Json(ScoreEligibilityResponse {
        eligible: eligibility::score_eligible(&journeys),
    }))
}

/// Evaluate the long-term discount rule over the user's history.
#[utoipa::path(
    get,
    path = "/users/{user_id}/discount",
    responses(
        (status = 200, description = "The discount eligibility verdict", body = DiscountResponse),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("user_id" = Uuid, Path, description = "The unique ID of the user.")
    )
)]
pub async fn discount_handler(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let journeys = app_state
        .store
        .list_journeys(user_id)
        .await
        .map_err(internal_error)?;

    let result = eligibility::check_discount_eligibility(&journeys);
    Ok(Json(DiscountResponse {
        eligible: result.eligible,
        reference_code: result.reference_code,
    }))
}

/// Report the user's average journey score over the trailing 30 days.
#[utoipa::path(
    get,
    path = "/users/{user_id}/average-score",
    responses(
        (status = 200, description = "The 30-day average score", body = AverageScoreResponse),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("user_id" = Uuid, Path, description = "The unique ID of the user.")
    )
)]
pub async fn average_score_handler(
    State(app_state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let journeys = app_state
        .store
        .list_journeys(user_id)
        .await
        .map_err(internal_error)?;

    Ok(Json(AverageScoreResponse {
        average: scoring::thirty_day_average(&journeys, Utc::now()),
    }))
}

fn internal_error(error: PortError) -> (StatusCode, String) {
    error!("Journey store error: {}", error);
    (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
}
