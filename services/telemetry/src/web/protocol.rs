//! services/telemetry/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the device client and the
//! telemetry service for journey tracking.

use mydrive_core::domain::{Journey, LocationSample, MotionSample};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Device) TO the Server
//=========================================================================================

/// Represents the structured text messages a device can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Begins a tracking session for the given user. Must precede any
    /// sample messages.
    Start { user_id: Uuid },

    /// A batch of GPS fixes, possibly recorded while the app was
    /// backgrounded.
    LocationBatch { samples: Vec<LocationSample> },

    /// One accelerometer reading.
    Accelerometer { sample: MotionSample },

    /// One gyroscope reading.
    Gyroscope { sample: MotionSample },

    /// The device entered or left a phone call.
    CallState { on_call: bool },

    /// The handset was picked up or put down while driving.
    PhoneUsage { in_use: bool },

    /// Ends the tracking session and finalizes the journey.
    Stop,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Device)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the session is recording.
    TrackingStarted,

    /// The finalized, persisted journey. `insufficient_data` flags a
    /// journey recorded with fewer than two GPS fixes, whose distance,
    /// speed, and duration defaulted to zero.
    JourneyCompleted {
        journey: Journey,
        insufficient_data: bool,
    },

    /// Reports an error to the client, which should display a message.
    Error { message: String },
}
