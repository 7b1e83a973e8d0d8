//! services/telemetry/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use mydrive_core::ports::{JourneyStore, RoadClassifier};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers. The sensor bridges are per-connection and live in the WebSocket
/// handler instead.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JourneyStore>,
    pub classifier: Arc<dyn RoadClassifier>,
    pub config: Arc<Config>,
}
