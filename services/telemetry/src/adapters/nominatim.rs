//! services/telemetry/src/adapters/nominatim.rs
//!
//! This module contains the adapter for the OpenStreetMap Nominatim reverse
//! geocoding API. It implements the `RoadClassifier` port from the `core`
//! crate, normalising raw OSM highway tags into the four broad road
//! categories the scorer understands.

use async_trait::async_trait;
use mydrive_core::domain::RoadType;
use mydrive_core::ports::{PortError, PortResult, RoadClassifier};
use serde::Deserialize;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `RoadClassifier` port using the Nominatim
/// reverse geocoding API.
#[derive(Clone)]
pub struct NominatimClassifier {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl NominatimClassifier {
    /// Creates a new `NominatimClassifier`.
    ///
    /// Nominatim's usage policy requires an identifying user agent on every
    /// request.
    pub fn new(client: reqwest::Client, base_url: String, user_agent: String) -> Self {
        Self {
            client,
            base_url,
            user_agent,
        }
    }
}

//=========================================================================================
// Response Payload
//=========================================================================================

#[derive(Deserialize)]
struct ReverseGeocodeResponse {
    address: Option<ReverseGeocodeAddress>,
}

#[derive(Deserialize)]
struct ReverseGeocodeAddress {
    highway: Option<String>,
}

//=========================================================================================
// `RoadClassifier` Trait Implementation
//=========================================================================================

#[async_trait]
impl RoadClassifier for NominatimClassifier {
    async fn classify(&self, latitude: f64, longitude: f64) -> PortResult<RoadType> {
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("format", "json"),
                ("lat", &latitude.to_string()),
                ("lon", &longitude.to_string()),
                ("zoom", "18"),
                ("addressdetails", "1"),
            ])
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en")
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Nominatim request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| PortError::Unexpected(format!("Nominatim returned an error: {}", e)))?;

        let payload: ReverseGeocodeResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Invalid Nominatim response: {}", e)))?;

        let osm_tag = payload.address.and_then(|address| address.highway);
        Ok(normalize_road_type(osm_tag.as_deref()))
    }
}

/// Normalises an OSM highway tag into one of the four broad categories.
pub fn normalize_road_type(osm_tag: Option<&str>) -> RoadType {
    let Some(tag) = osm_tag else {
        return RoadType::Unknown;
    };

    match tag.to_lowercase().as_str() {
        "motorway" | "trunk" | "primary" | "motorway_link" | "trunk_link" => RoadType::Highway,
        "residential" | "living_street" | "service" | "tertiary" | "unclassified" => RoadType::City,
        "track" | "road" | "path" | "footway" | "bridleway" => RoadType::Rural,
        _ => RoadType::Unknown,
    }
}
