//! End-to-end pipeline test: sensor batches flow through real subscription
//! channels into an active session, the session reduces them on stop, and
//! the eligibility evaluators consume the persisted history.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use mydrive_core::domain::{Journey, LocationSample, MotionSample, RoadType};
use mydrive_core::ports::{
    CallMonitor, CallSubscription, JourneyStore, LocationProvider, LocationSubscription,
    MotionAxis, MotionProvider, MotionSubscription, PermissionStatus, PortError, PortResult,
    RoadClassifier, SAMPLE_CHANNEL_CAPACITY,
};
use mydrive_core::{eligibility, SessionStatus, TrackingSession};

//=========================================================================================
// In-Memory Collaborators
//=========================================================================================

/// Location provider that hands the test a sender wired to the session's
/// subscription channel.
#[derive(Default)]
struct ChannelLocationProvider {
    sender: StdMutex<Option<mpsc::Sender<Vec<LocationSample>>>>,
}

impl ChannelLocationProvider {
    fn sender(&self) -> mpsc::Sender<Vec<LocationSample>> {
        self.sender
            .lock()
            .expect("lock poisoned")
            .clone()
            .expect("subscribe was called")
    }
}

#[async_trait]
impl LocationProvider for ChannelLocationProvider {
    async fn request_foreground_permission(&self) -> PortResult<PermissionStatus> {
        Ok(PermissionStatus::Granted)
    }

    async fn request_background_permission(&self) -> PortResult<PermissionStatus> {
        Ok(PermissionStatus::Granted)
    }

    async fn subscribe(
        &self,
        _min_displacement_m: f64,
        _min_interval_ms: u64,
    ) -> PortResult<LocationSubscription> {
        let (sender, receiver) = mpsc::channel(SAMPLE_CHANNEL_CAPACITY);
        *self.sender.lock().expect("lock poisoned") = Some(sender);
        Ok(LocationSubscription {
            id: Uuid::new_v4(),
            receiver,
        })
    }

    async fn unsubscribe(&self, _subscription_id: Uuid) -> PortResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct ChannelMotionProvider {
    senders: StdMutex<HashMap<MotionAxis, mpsc::Sender<MotionSample>>>,
}

impl ChannelMotionProvider {
    fn sender(&self, axis: MotionAxis) -> mpsc::Sender<MotionSample> {
        self.senders
            .lock()
            .expect("lock poisoned")
            .get(&axis)
            .cloned()
            .expect("subscribe was called")
    }
}

#[async_trait]
impl MotionProvider for ChannelMotionProvider {
    async fn set_sample_interval(&self, _interval_ms: u64) -> PortResult<()> {
        Ok(())
    }

    async fn subscribe(&self, axis: MotionAxis) -> PortResult<MotionSubscription> {
        let (sender, receiver) = mpsc::channel(SAMPLE_CHANNEL_CAPACITY);
        self.senders.lock().expect("lock poisoned").insert(axis, sender);
        Ok(MotionSubscription {
            id: Uuid::new_v4(),
            axis,
            receiver,
        })
    }

    async fn unsubscribe(&self, _subscription_id: Uuid) -> PortResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct ChannelCallMonitor {
    sender: StdMutex<Option<mpsc::Sender<bool>>>,
}

impl ChannelCallMonitor {
    fn sender(&self) -> mpsc::Sender<bool> {
        self.sender
            .lock()
            .expect("lock poisoned")
            .clone()
            .expect("subscribe was called")
    }
}

#[async_trait]
impl CallMonitor for ChannelCallMonitor {
    async fn subscribe(&self) -> PortResult<CallSubscription> {
        let (sender, receiver) = mpsc::channel(SAMPLE_CHANNEL_CAPACITY);
        *self.sender.lock().expect("lock poisoned") = Some(sender);
        Ok(CallSubscription {
            id: Uuid::new_v4(),
            receiver,
        })
    }

    async fn dispose(&self, _subscription_id: Uuid) -> PortResult<()> {
        Ok(())
    }
}

struct CityClassifier;

#[async_trait]
impl RoadClassifier for CityClassifier {
    async fn classify(&self, _latitude: f64, _longitude: f64) -> PortResult<RoadType> {
        Ok(RoadType::City)
    }
}

#[derive(Default)]
struct MemoryStore {
    journeys: StdMutex<HashMap<Uuid, Vec<Journey>>>,
}

#[async_trait]
impl JourneyStore for MemoryStore {
    async fn append_journey(&self, user_id: Uuid, journey: &Journey) -> PortResult<()> {
        self.journeys
            .lock()
            .expect("lock poisoned")
            .entry(user_id)
            .or_default()
            .push(journey.clone());
        Ok(())
    }

    async fn list_journeys(&self, user_id: Uuid) -> PortResult<Vec<Journey>> {
        Ok(self
            .journeys
            .lock()
            .expect("lock poisoned")
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_journey(&self, user_id: Uuid, journey_id: Uuid) -> PortResult<()> {
        match self.journeys.lock().expect("lock poisoned").get_mut(&user_id) {
            Some(journeys) => {
                journeys.retain(|journey| journey.id != journey_id);
                Ok(())
            }
            None => Err(PortError::NotFound(user_id.to_string())),
        }
    }
}

//=========================================================================================
// Pipeline
//=========================================================================================

#[tokio::test]
async fn channel_delivered_samples_become_a_scored_journey() {
    let location = Arc::new(ChannelLocationProvider::default());
    let motion = Arc::new(ChannelMotionProvider::default());
    let calls = Arc::new(ChannelCallMonitor::default());
    let store = Arc::new(MemoryStore::default());

    let session = TrackingSession::new(
        location.clone(),
        motion.clone(),
        calls.clone(),
        Arc::new(CityClassifier),
        store.clone(),
    );
    let user_id = Uuid::new_v4();

    session.start(user_id).await.expect("start");
    assert_eq!(session.status().await, SessionStatus::Active);

    // Stream a short drive through the real subscription channels: fixes in
    // two batches, interleaved with motion readings and a call.
    let fixes = location.sender();
    fixes
        .send(vec![
            LocationSample { latitude: 51.00, longitude: -0.10, timestamp_ms: 0 },
            LocationSample { latitude: 51.02, longitude: -0.10, timestamp_ms: 240_000 },
        ])
        .await
        .expect("send fixes");

    let accel = motion.sender(MotionAxis::Accelerometer);
    for reading in [
        MotionSample { x: 0.2, y: 0.1, z: 9.8 },
        MotionSample { x: 1.5, y: 2.0, z: 9.6 },
    ] {
        accel.send(reading).await.expect("send accel");
    }
    let gyro = motion.sender(MotionAxis::Gyroscope);
    gyro.send(MotionSample { x: 0.3, y: 0.0, z: 0.1 })
        .await
        .expect("send gyro");

    calls.sender().send(true).await.expect("send call state");
    calls.sender().send(false).await.expect("send call state");

    fixes
        .send(vec![LocationSample { latitude: 51.04, longitude: -0.10, timestamp_ms: 480_000 }])
        .await
        .expect("send fixes");

    // Sample delivery is asynchronous; give the pumps a moment to drain.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let summary = session.stop().await.expect("stop");
    assert_eq!(summary.warning, None);

    let journey = &summary.journey;
    assert_eq!(journey.length_minutes, 8);
    // 0.04 degrees of latitude is roughly 4.4 km.
    assert!(journey.distance > 4.0 && journey.distance < 5.0);
    assert!(journey.speed > 30.0 && journey.speed < 40.0);
    assert!(journey.braking_acceleration > 9.8);
    assert!((journey.cornering - (0.3f64 * 0.3 + 0.1 * 0.1).sqrt()).abs() < 1e-9);
    // Last write wins: the call ended before the journey did.
    assert!(!journey.phone_call_status);
    assert_eq!(journey.road_type, RoadType::City);

    let persisted = store.list_journeys(user_id).await.expect("list");
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0], summary.journey);
}

#[tokio::test]
async fn persisted_history_feeds_the_eligibility_evaluators() {
    let store = MemoryStore::default();
    let user_id = Uuid::new_v4();
    let now = Utc::now();

    // Not enough recent mileage yet.
    let mut journey = sample_journey(user_id, now - Duration::days(10), 150.0);
    store.append_journey(user_id, &journey).await.expect("append");
    let history = store.list_journeys(user_id).await.expect("list");
    assert!(!eligibility::score_eligible_at(&history, now));

    // A second long drive within the window crosses the threshold.
    journey = sample_journey(user_id, now - Duration::days(3), 300.0);
    store.append_journey(user_id, &journey).await.expect("append");
    let history = store.list_journeys(user_id).await.expect("list");
    assert!(eligibility::score_eligible_at(&history, now));

    // Deleting the big journey drops the user back below it.
    store
        .delete_journey(user_id, journey.id)
        .await
        .expect("delete");
    let history = store.list_journeys(user_id).await.expect("list");
    assert!(!eligibility::score_eligible_at(&history, now));
}

fn sample_journey(user_id: Uuid, start_date: chrono::DateTime<Utc>, distance: f64) -> Journey {
    let mut journey = Journey {
        id: Uuid::new_v4(),
        user_id,
        start_date,
        length_minutes: 45,
        distance,
        speed: 50.0,
        braking_acceleration: 1.2,
        cornering: 0.8,
        phone_usage: false,
        phone_call_status: false,
        road_type: RoadType::Highway,
        scores: None,
    };
    journey.scores = Some(mydrive_core::scoring::calculate_score(&journey));
    journey
}
