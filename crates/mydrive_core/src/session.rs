//! crates/mydrive_core/src/session.rs
//!
//! The tracking session state machine. Owns the sensor subscriptions and
//! sample buffers for one journey at a time, and reduces them to a finalized
//! [`Journey`] when the session stops.
//!
//! Life cycle: `Idle -> Active -> Stopping -> Idle`. The transition to
//! `Stopping` happens under the session mutex before the sample pumps are
//! cancelled, and the pumps are awaited before the buffers are aggregated,
//! so a sample is either fully recorded or fully dropped. Late deliveries
//! never touch a finalized record.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{Journey, LocationSample, MotionSample, RoadType};
use crate::geo;
use crate::ports::{
    CallMonitor, JourneyStore, LocationProvider, MotionAxis, MotionProvider, PermissionStatus,
    PortError, RoadClassifier,
};
use crate::scoring;

/// Sampling interval for both motion axis streams.
pub const MOTION_SAMPLE_INTERVAL_MS: u64 = 200;
/// Minimum displacement between recorded GPS fixes.
pub const LOCATION_MIN_DISPLACEMENT_M: f64 = 10.0;
/// Batching interval for deferred background location delivery.
pub const LOCATION_MIN_INTERVAL_MS: u64 = 1000;
/// Default ceiling on the road classification lookup during stop.
pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(5);

//=========================================================================================
// Errors and Outcomes
//=========================================================================================

/// Discriminant-only view of the session life cycle, used in guards and
/// error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Active,
    Stopping,
}

/// Errors surfaced by [`TrackingSession`] operations.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    /// Foreground or background location permission was denied. Fatal to
    /// `start`; the session remains idle.
    #[error("location permissions not granted")]
    PermissionDenied,

    /// An operation was invoked in the wrong phase, e.g. `start` while a
    /// session is already active. The session state is left untouched.
    #[error("invalid session state: expected {expected:?}, found {actual:?}")]
    InvalidState {
        expected: SessionStatus,
        actual: SessionStatus,
    },

    /// A collaborator failed while wiring the session up.
    #[error("collaborator error: {0}")]
    Collaborator(#[from] PortError),

    /// The finalized journey could not be persisted. The record is returned
    /// to the caller, who decides whether to retry the append.
    #[error("failed to persist journey: {source}")]
    Persistence {
        journey: Box<Journey>,
        source: PortError,
    },
}

/// Non-fatal conditions reported alongside a completed stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopWarning {
    /// Fewer than two location fixes were recorded; distance, speed, and
    /// duration default to zero.
    InsufficientData,
}

/// The result of a completed `stop`: the persisted journey plus any warning.
#[derive(Debug)]
pub struct StopSummary {
    pub journey: Journey,
    pub warning: Option<StopWarning>,
}

//=========================================================================================
// Internal State
//=========================================================================================

/// Buffers and flags for the journey currently being recorded.
struct ActiveJourney {
    id: Uuid,
    user_id: Uuid,
    start_date: DateTime<Utc>,
    locations: Vec<LocationSample>,
    accel_data: Vec<MotionSample>,
    gyro_data: Vec<MotionSample>,
    phone_usage: bool,
    phone_call_status: bool,
}

impl ActiveJourney {
    fn new(user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            start_date: Utc::now(),
            locations: Vec::new(),
            accel_data: Vec::new(),
            gyro_data: Vec::new(),
            phone_usage: false,
            phone_call_status: false,
        }
    }
}

/// The session phase, carrying the in-flight record while active.
enum Phase {
    Idle,
    Active(ActiveJourney),
    Stopping,
}

impl Phase {
    fn status(&self) -> SessionStatus {
        match self {
            Phase::Idle => SessionStatus::Idle,
            Phase::Active(_) => SessionStatus::Active,
            Phase::Stopping => SessionStatus::Stopping,
        }
    }
}

/// Subscription handles and pump tasks owned by an active session.
struct ActiveResources {
    location_subscription: Uuid,
    accel_subscription: Uuid,
    gyro_subscription: Uuid,
    call_subscription: Uuid,
    cancellation_token: CancellationToken,
    pumps: Vec<JoinHandle<()>>,
}

struct SessionState {
    phase: Phase,
    resources: Option<ActiveResources>,
}

//=========================================================================================
// TrackingSession
//=========================================================================================

/// Orchestrates one journey recording at a time against the collaborator
/// ports. Cheap to share behind an `Arc`; all mutability lives behind the
/// internal mutex.
pub struct TrackingSession {
    location: Arc<dyn LocationProvider>,
    motion: Arc<dyn MotionProvider>,
    calls: Arc<dyn CallMonitor>,
    classifier: Arc<dyn RoadClassifier>,
    store: Arc<dyn JourneyStore>,
    classify_timeout: Duration,
    state: Arc<Mutex<SessionState>>,
}

impl TrackingSession {
    pub fn new(
        location: Arc<dyn LocationProvider>,
        motion: Arc<dyn MotionProvider>,
        calls: Arc<dyn CallMonitor>,
        classifier: Arc<dyn RoadClassifier>,
        store: Arc<dyn JourneyStore>,
    ) -> Self {
        Self {
            location,
            motion,
            calls,
            classifier,
            store,
            classify_timeout: DEFAULT_CLASSIFY_TIMEOUT,
            state: Arc::new(Mutex::new(SessionState {
                phase: Phase::Idle,
                resources: None,
            })),
        }
    }

    /// Overrides the ceiling on the road classification lookup during stop.
    pub fn with_classify_timeout(mut self, timeout: Duration) -> Self {
        self.classify_timeout = timeout;
        self
    }

    /// The current life-cycle status.
    pub async fn status(&self) -> SessionStatus {
        self.state.lock().await.phase.status()
    }

    //-------------------------------------------------------------------------------------
    // start
    //-------------------------------------------------------------------------------------

    /// Begins recording a journey for `user_id`.
    ///
    /// Requires the session to be idle. Requests foreground and background
    /// location permission, subscribes to both motion axis streams, the call
    /// monitor, and location updates, then spawns one pump task per stream.
    pub async fn start(&self, user_id: Uuid) -> Result<(), TrackingError> {
        {
            let state = self.state.lock().await;
            let status = state.phase.status();
            if status != SessionStatus::Idle {
                return Err(TrackingError::InvalidState {
                    expected: SessionStatus::Idle,
                    actual: status,
                });
            }
        }

        // Permission prompts and subscriptions happen outside the lock; a
        // racing second caller is rejected when the phase is re-checked
        // before activation.
        let foreground = self.location.request_foreground_permission().await?;
        let background = self.location.request_background_permission().await?;
        if foreground != PermissionStatus::Granted || background != PermissionStatus::Granted {
            return Err(TrackingError::PermissionDenied);
        }

        self.motion
            .set_sample_interval(MOTION_SAMPLE_INTERVAL_MS)
            .await?;
        let accel = self.motion.subscribe(MotionAxis::Accelerometer).await?;
        let gyro = self.motion.subscribe(MotionAxis::Gyroscope).await?;
        let calls = self.calls.subscribe().await?;
        let locations = self
            .location
            .subscribe(LOCATION_MIN_DISPLACEMENT_M, LOCATION_MIN_INTERVAL_MS)
            .await?;

        let mut state = self.state.lock().await;
        let status = state.phase.status();
        if status != SessionStatus::Idle {
            // Lost a race with another start; roll the subscriptions back.
            drop(state);
            self.release_subscriptions(
                locations.id, accel.id, gyro.id, calls.id,
            )
            .await;
            return Err(TrackingError::InvalidState {
                expected: SessionStatus::Idle,
                actual: status,
            });
        }

        let journey = ActiveJourney::new(user_id);
        let journey_id = journey.id;
        let token = CancellationToken::new();
        let pumps = vec![
            spawn_location_pump(self.state.clone(), locations.receiver, token.clone()),
            spawn_motion_pump(
                self.state.clone(),
                MotionAxis::Accelerometer,
                accel.receiver,
                token.clone(),
            ),
            spawn_motion_pump(
                self.state.clone(),
                MotionAxis::Gyroscope,
                gyro.receiver,
                token.clone(),
            ),
            spawn_call_pump(self.state.clone(), calls.receiver, token.clone()),
        ];
        state.resources = Some(ActiveResources {
            location_subscription: locations.id,
            accel_subscription: accel.id,
            gyro_subscription: gyro.id,
            call_subscription: calls.id,
            cancellation_token: token,
            pumps,
        });
        state.phase = Phase::Active(journey);

        info!("Tracking session {journey_id} started for user {user_id}");
        Ok(())
    }

    //-------------------------------------------------------------------------------------
    // Sample Ingestion
    //-------------------------------------------------------------------------------------

    /// Appends a batch of GPS fixes to the active journey. Batches arriving
    /// while the session is not active are silently dropped; once `stop`
    /// has begun, no further sample is recorded.
    pub async fn on_location_update(&self, samples: Vec<LocationSample>) {
        let mut state = self.state.lock().await;
        if let Phase::Active(journey) = &mut state.phase {
            journey.locations.extend(samples);
        }
    }

    /// Appends one motion reading to the matching axis buffer while active.
    pub async fn on_motion_sample(&self, axis: MotionAxis, sample: MotionSample) {
        let mut state = self.state.lock().await;
        if let Phase::Active(journey) = &mut state.phase {
            match axis {
                MotionAxis::Accelerometer => journey.accel_data.push(sample),
                MotionAxis::Gyroscope => journey.gyro_data.push(sample),
            }
        }
    }

    /// Updates the call flag on the active journey. Last write wins.
    pub async fn on_call_state_change(&self, on_call: bool) {
        let mut state = self.state.lock().await;
        if let Phase::Active(journey) = &mut state.phase {
            journey.phone_call_status = on_call;
        }
    }

    /// Updates the handset-usage flag on the active journey. Supplied by the
    /// surrounding application; last write wins.
    pub async fn set_phone_usage(&self, in_use: bool) {
        let mut state = self.state.lock().await;
        if let Phase::Active(journey) = &mut state.phase {
            journey.phone_usage = in_use;
        }
    }

    //-------------------------------------------------------------------------------------
    // stop
    //-------------------------------------------------------------------------------------

    /// Stops the active session, reduces the frozen buffers to journey
    /// metrics, scores the journey, and persists it.
    ///
    /// Completes even with too few location fixes, reporting
    /// [`StopWarning::InsufficientData`] and zero-default metrics. A failed
    /// persistence returns the finalized journey inside the error so the
    /// caller can retry the append.
    pub async fn stop(&self) -> Result<StopSummary, TrackingError> {
        // Take the record and freeze ingestion in one critical section:
        // every ingest path checks for the Active phase under this mutex.
        let (recorded, resources) = {
            let mut state = self.state.lock().await;
            let status = state.phase.status();
            if status != SessionStatus::Active {
                return Err(TrackingError::InvalidState {
                    expected: SessionStatus::Active,
                    actual: status,
                });
            }
            let recorded = match std::mem::replace(&mut state.phase, Phase::Stopping) {
                Phase::Active(journey) => journey,
                // Unreachable: the status was checked above under the same lock.
                other => {
                    state.phase = other;
                    return Err(TrackingError::InvalidState {
                        expected: SessionStatus::Active,
                        actual: status,
                    });
                }
            };
            let resources = state.resources.take();
            if let Some(resources) = &resources {
                resources.cancellation_token.cancel();
            }
            (recorded, resources)
        };

        // Drain the pumps before touching the collaborators so no pump races
        // an unsubscribe, then release the subscriptions.
        if let Some(resources) = resources {
            for pump in resources.pumps {
                if let Err(join_error) = pump.await {
                    warn!("Sample pump ended abnormally: {join_error}");
                }
            }
            self.release_subscriptions(
                resources.location_subscription,
                resources.accel_subscription,
                resources.gyro_subscription,
                resources.call_subscription,
            )
            .await;
        }

        let insufficient_data = recorded.locations.len() < 2;
        let journey = self.finalize(recorded).await;
        let warning = insufficient_data.then_some(StopWarning::InsufficientData);

        let persisted = self.store.append_journey(journey.user_id, &journey).await;

        {
            let mut state = self.state.lock().await;
            state.phase = Phase::Idle;
        }

        if let Err(source) = persisted {
            return Err(TrackingError::Persistence {
                journey: Box::new(journey),
                source,
            });
        }

        match &journey.scores {
            Some(score) => info!(
                "Journey {} persisted for user {}: {:.2} distance, total score {}",
                journey.id, journey.user_id, journey.distance, score.total
            ),
            None => info!(
                "Journey {} persisted for user {} without scores",
                journey.id, journey.user_id
            ),
        }
        if warning.is_some() {
            warn!(
                "Journey {} recorded fewer than two location fixes; metrics default to zero",
                journey.id
            );
        }

        Ok(StopSummary { journey, warning })
    }

    /// Reduces the frozen buffers to a finalized, scored journey.
    async fn finalize(&self, recorded: ActiveJourney) -> Journey {
        let braking_acceleration = peak_magnitude(&recorded.accel_data);
        let cornering = peak_magnitude(&recorded.gyro_data);
        let speed = geo::average_speed(&recorded.locations);
        let distance = round_to_2dp(geo::total_distance(&recorded.locations));

        let road_type = match recorded.locations.first() {
            Some(first) => self.classify_road(first).await,
            None => RoadType::Unknown,
        };

        let length_minutes = journey_minutes(&recorded.locations);

        let mut journey = Journey {
            id: recorded.id,
            user_id: recorded.user_id,
            start_date: recorded.start_date,
            length_minutes,
            distance,
            speed,
            braking_acceleration,
            cornering,
            phone_usage: recorded.phone_usage,
            phone_call_status: recorded.phone_call_status,
            road_type,
            scores: None,
        };
        journey.scores = Some(scoring::calculate_score(&journey));
        journey
    }

    /// Runs the time-bounded road classification. Failures and timeouts are
    /// logged and collapse to `Unknown`; they never abort the stop sequence.
    async fn classify_road(&self, sample: &LocationSample) -> RoadType {
        let lookup = tokio::time::timeout(
            self.classify_timeout,
            self.classifier.classify(sample.latitude, sample.longitude),
        )
        .await;
        match lookup {
            Ok(Ok(road_type)) => road_type,
            Ok(Err(error)) => {
                warn!("Road classification failed: {error}");
                RoadType::Unknown
            }
            Err(_) => {
                warn!(
                    "Road classification timed out after {:?}",
                    self.classify_timeout
                );
                RoadType::Unknown
            }
        }
    }

    /// Unsubscribes from all sensor collaborators. A handle that is already
    /// gone reports `NotFound`, which is expected and ignored.
    async fn release_subscriptions(
        &self,
        location_id: Uuid,
        accel_id: Uuid,
        gyro_id: Uuid,
        call_id: Uuid,
    ) {
        allow_missing(self.location.unsubscribe(location_id).await, "location");
        allow_missing(self.motion.unsubscribe(accel_id).await, "accelerometer");
        allow_missing(self.motion.unsubscribe(gyro_id).await, "gyroscope");
        allow_missing(self.calls.dispose(call_id).await, "call monitor");
    }
}

fn allow_missing(result: Result<(), PortError>, collaborator: &str) {
    match result {
        Ok(()) => {}
        Err(PortError::NotFound(_)) => {
            debug!("{collaborator} subscription was already released");
        }
        Err(error) => warn!("Failed to unsubscribe from {collaborator}: {error}"),
    }
}

//=========================================================================================
// Pump Tasks
//=========================================================================================

fn spawn_location_pump(
    state: Arc<Mutex<SessionState>>,
    mut receiver: mpsc::Receiver<Vec<LocationSample>>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                batch = receiver.recv() => match batch {
                    Some(samples) => {
                        let mut state = state.lock().await;
                        if let Phase::Active(journey) = &mut state.phase {
                            journey.locations.extend(samples);
                        }
                    }
                    None => break,
                },
            }
        }
    })
}

fn spawn_motion_pump(
    state: Arc<Mutex<SessionState>>,
    axis: MotionAxis,
    mut receiver: mpsc::Receiver<MotionSample>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                sample = receiver.recv() => match sample {
                    Some(sample) => {
                        let mut state = state.lock().await;
                        if let Phase::Active(journey) = &mut state.phase {
                            match axis {
                                MotionAxis::Accelerometer => journey.accel_data.push(sample),
                                MotionAxis::Gyroscope => journey.gyro_data.push(sample),
                            }
                        }
                    }
                    None => break,
                },
            }
        }
    })
}

fn spawn_call_pump(
    state: Arc<Mutex<SessionState>>,
    mut receiver: mpsc::Receiver<bool>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                status = receiver.recv() => match status {
                    Some(on_call) => {
                        let mut state = state.lock().await;
                        if let Phase::Active(journey) = &mut state.phase {
                            journey.phone_call_status = on_call;
                        }
                    }
                    None => break,
                },
            }
        }
    })
}

//=========================================================================================
// Aggregation Helpers
//=========================================================================================

/// Peak vector magnitude `sqrt(x^2 + y^2 + z^2)` over a buffer; 0 when empty.
fn peak_magnitude(samples: &[MotionSample]) -> f64 {
    samples
        .iter()
        .map(|s| (s.x * s.x + s.y * s.y + s.z * s.z).sqrt())
        .fold(0.0, f64::max)
}

/// Journey duration in whole minutes between the first and last fix; 0 for
/// fewer than two fixes.
fn journey_minutes(locations: &[LocationSample]) -> i64 {
    if locations.len() < 2 {
        return 0;
    }
    let first = &locations[0];
    let last = &locations[locations.len() - 1];
    ((last.timestamp_ms - first.timestamp_ms) as f64 / 60_000.0).round() as i64
}

fn round_to_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
