pub mod bridge;
pub mod nominatim;
pub mod store;

pub use bridge::{BridgeCallMonitor, BridgeLocationProvider, BridgeMotionProvider};
pub use nominatim::NominatimClassifier;
pub use store::PgJourneyStore;
