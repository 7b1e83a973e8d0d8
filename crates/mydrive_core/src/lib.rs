pub mod domain;
pub mod eligibility;
pub mod geo;
pub mod ports;
pub mod scoring;
pub mod session;

pub use domain::{EligibilityResult, Journey, LocationSample, MotionSample, RoadType, Score};
pub use ports::{
    CallMonitor, JourneyStore, LocationProvider, MotionAxis, MotionProvider, PermissionStatus,
    PortError, PortResult, RoadClassifier,
};
pub use session::{SessionStatus, StopSummary, StopWarning, TrackingError, TrackingSession};
