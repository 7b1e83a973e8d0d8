//! crates/mydrive_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the engine's collaborators.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like databases,
//! geocoding APIs, or the device sensor plumbing.
//!
//! Sensor collaborators deliver samples through bounded channels: a
//! subscription hands back an mpsc receiver, and the session drains it from
//! its own pump tasks. No delivery blocks the producer beyond the channel
//! capacity.

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::{Journey, LocationSample, MotionSample, RoadType};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Bound applied to every sample channel a subscription hands out.
pub const SAMPLE_CHANNEL_CAPACITY: usize = 64;

//=========================================================================================
// Subscription Handles
//=========================================================================================

/// Outcome of a permission request made through the location provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// The two independent motion axis streams a provider can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionAxis {
    Accelerometer,
    Gyroscope,
}

/// A live location stream. Fixes arrive in batches, possibly after the
/// surrounding application has been backgrounded.
pub struct LocationSubscription {
    pub id: Uuid,
    pub receiver: mpsc::Receiver<Vec<LocationSample>>,
}

/// A live stream of readings for one motion axis.
pub struct MotionSubscription {
    pub id: Uuid,
    pub axis: MotionAxis,
    pub receiver: mpsc::Receiver<MotionSample>,
}

/// A coarse call-state stream: `true` while the user is on a call.
pub struct CallSubscription {
    pub id: Uuid,
    pub receiver: mpsc::Receiver<bool>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Requests permission to read location while the app is foregrounded.
    async fn request_foreground_permission(&self) -> PortResult<PermissionStatus>;

    /// Requests permission to keep receiving fixes in the background.
    async fn request_background_permission(&self) -> PortResult<PermissionStatus>;

    /// Begins streaming fixes with at least `min_displacement_m` between
    /// recorded positions, batched at `min_interval_ms`.
    async fn subscribe(
        &self,
        min_displacement_m: f64,
        min_interval_ms: u64,
    ) -> PortResult<LocationSubscription>;

    /// Stops a stream. Must be idempotent: unsubscribing a handle twice
    /// returns `NotFound` rather than failing destructively.
    async fn unsubscribe(&self, subscription_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait MotionProvider: Send + Sync {
    /// Sets the sampling interval shared by both axis streams.
    async fn set_sample_interval(&self, interval_ms: u64) -> PortResult<()>;

    async fn subscribe(&self, axis: MotionAxis) -> PortResult<MotionSubscription>;

    /// Idempotent, as for [`LocationProvider::unsubscribe`].
    async fn unsubscribe(&self, subscription_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait CallMonitor: Send + Sync {
    async fn subscribe(&self) -> PortResult<CallSubscription>;

    /// Releases the telephony listener. Idempotent.
    async fn dispose(&self, subscription_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait RoadClassifier: Send + Sync {
    /// Classifies the road at a coordinate via reverse geocoding. May fail
    /// or time out; the caller decides how to degrade.
    async fn classify(&self, latitude: f64, longitude: f64) -> PortResult<RoadType>;
}

#[async_trait]
pub trait JourneyStore: Send + Sync {
    /// Appends a finalized journey to the user's history.
    async fn append_journey(&self, user_id: Uuid, journey: &Journey) -> PortResult<()>;

    /// Returns the user's full journey history, oldest first.
    async fn list_journeys(&self, user_id: Uuid) -> PortResult<Vec<Journey>>;

    /// Removes a single journey from the user's history.
    async fn delete_journey(&self, user_id: Uuid, journey_id: Uuid) -> PortResult<()>;
}
