//! services/telemetry/src/adapters/bridge.rs
//!
//! Channel-bridged sensor providers. A connected device reports its sensor
//! data over the WebSocket; the handler publishes each message into these
//! adapters, and the core consumes them through the ordinary subscription
//! ports. Permission prompts happen on the handset before it connects, so
//! the bridge reports them as granted.
//!
//! Publishing never blocks: a full or closed subscription channel drops the
//! sample, which is the accepted loss model for sensor delivery.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use mydrive_core::domain::{LocationSample, MotionSample};
use mydrive_core::ports::{
    CallMonitor, CallSubscription, LocationProvider, LocationSubscription, MotionAxis,
    MotionProvider, MotionSubscription, PermissionStatus, PortError, PortResult,
    SAMPLE_CHANNEL_CAPACITY,
};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// Subscriber Bookkeeping
//=========================================================================================

/// Tracks the live subscription channels for one sample stream.
struct SubscriberSet<T> {
    senders: Mutex<HashMap<Uuid, mpsc::Sender<T>>>,
}

impl<T: Clone> SubscriberSet<T> {
    fn new() -> Self {
        Self {
            senders: Mutex::new(HashMap::new()),
        }
    }

    fn subscribe(&self) -> (Uuid, mpsc::Receiver<T>) {
        let (sender, receiver) = mpsc::channel(SAMPLE_CHANNEL_CAPACITY);
        let id = Uuid::new_v4();
        self.senders.lock().expect("lock poisoned").insert(id, sender);
        (id, receiver)
    }

    fn unsubscribe(&self, id: Uuid) -> PortResult<()> {
        match self.senders.lock().expect("lock poisoned").remove(&id) {
            Some(_) => Ok(()),
            None => Err(PortError::NotFound(format!("subscription {}", id))),
        }
    }

    fn publish(&self, value: T) {
        let senders = self.senders.lock().expect("lock poisoned");
        for sender in senders.values() {
            if sender.try_send(value.clone()).is_err() {
                debug!("Dropped a sample on a full or closed subscription channel");
            }
        }
    }
}

//=========================================================================================
// Location
//=========================================================================================

/// A `LocationProvider` fed by device-reported fix batches.
pub struct BridgeLocationProvider {
    fixes: SubscriberSet<Vec<LocationSample>>,
}

impl BridgeLocationProvider {
    pub fn new() -> Self {
        Self {
            fixes: SubscriberSet::new(),
        }
    }

    /// Pushes a batch of fixes from the device into every live subscription.
    pub fn publish_batch(&self, samples: Vec<LocationSample>) {
        self.fixes.publish(samples);
    }
}

impl Default for BridgeLocationProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocationProvider for BridgeLocationProvider {
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
        // Displacement and interval filtering already happened on-device.
        let (id, receiver) = self.fixes.subscribe();
        Ok(LocationSubscription { id, receiver })
    }

    async fn unsubscribe(&self, subscription_id: Uuid) -> PortResult<()> {
        self.fixes.unsubscribe(subscription_id)
    }
}

//=========================================================================================
// Motion
//=========================================================================================

/// A `MotionProvider` fed by device-reported accelerometer and gyroscope
/// readings.
pub struct BridgeMotionProvider {
    accelerometer: SubscriberSet<MotionSample>,
    gyroscope: SubscriberSet<MotionSample>,
    interval_ms: Mutex<u64>,
}

impl BridgeMotionProvider {
    pub fn new() -> Self {
        Self {
            accelerometer: SubscriberSet::new(),
            gyroscope: SubscriberSet::new(),
            interval_ms: Mutex::new(0),
        }
    }

    pub fn publish(&self, axis: MotionAxis, sample: MotionSample) {
        match axis {
            MotionAxis::Accelerometer => self.accelerometer.publish(sample),
            MotionAxis::Gyroscope => self.gyroscope.publish(sample),
        }
    }

    /// The sampling interval most recently requested by the core.
    pub fn sample_interval_ms(&self) -> u64 {
        *self.interval_ms.lock().expect("lock poisoned")
    }
}

impl Default for BridgeMotionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MotionProvider for BridgeMotionProvider {
    async fn set_sample_interval(&self, interval_ms: u64) -> PortResult<()> {
        *self.interval_ms.lock().expect("lock poisoned") = interval_ms;
        Ok(())
    }

    async fn subscribe(&self, axis: MotionAxis) -> PortResult<MotionSubscription> {
        let (id, receiver) = match axis {
            MotionAxis::Accelerometer => self.accelerometer.subscribe(),
            MotionAxis::Gyroscope => self.gyroscope.subscribe(),
        };
        Ok(MotionSubscription { id, axis, receiver })
    }

    async fn unsubscribe(&self, subscription_id: Uuid) -> PortResult<()> {
        // The handle is unique across both sets; try each in turn.
        match self.accelerometer.unsubscribe(subscription_id) {
            Ok(()) => Ok(()),
            Err(PortError::NotFound(_)) => self.gyroscope.unsubscribe(subscription_id),
            Err(error) => Err(error),
        }
    }
}

//=========================================================================================
// Calls
//=========================================================================================

/// A `CallMonitor` fed by device-reported call state changes.
pub struct BridgeCallMonitor {
    call_states: SubscriberSet<bool>,
}

impl BridgeCallMonitor {
    pub fn new() -> Self {
        Self {
            call_states: SubscriberSet::new(),
        }
    }

    pub fn publish(&self, on_call: bool) {
        self.call_states.publish(on_call);
    }
}

impl Default for BridgeCallMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallMonitor for BridgeCallMonitor {
    async fn subscribe(&self) -> PortResult<CallSubscription> {
        let (id, receiver) = self.call_states.subscribe();
        Ok(CallSubscription { id, receiver })
    }

    async fn dispose(&self, subscription_id: Uuid) -> PortResult<()> {
        self.call_states.unsubscribe(subscription_id)
    }
}
