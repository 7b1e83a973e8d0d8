//! services/telemetry/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! Each connection owns one tracking session plus the channel bridges that
//! feed the device's reported samples into it.

use crate::{
    adapters::{BridgeCallMonitor, BridgeLocationProvider, BridgeMotionProvider},
    web::{
        protocol::{ClientMessage, ServerMessage},
        state::AppState,
    },
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use mydrive_core::{MotionAxis, SessionStatus, TrackingSession};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established");

    // The sender is wrapped in an Arc<Mutex<>> to allow for shared mutable access.
    let (sender, mut receiver) = socket.split();
    let ws_sender = Arc::new(Mutex::new(sender));

    // Per-connection collaborators: the bridges receive the device's
    // reported samples, and the session consumes them through the ports.
    let location = Arc::new(BridgeLocationProvider::new());
    let motion = Arc::new(BridgeMotionProvider::new());
    let calls = Arc::new(BridgeCallMonitor::new());
    let session = TrackingSession::new(
        location.clone(),
        motion.clone(),
        calls.clone(),
        app_state.classifier.clone(),
        app_state.store.clone(),
    )
    .with_classify_timeout(app_state.config.classify_timeout);

    // --- Main Message Loop ---
    loop {
        if let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_text_message(
                        text.to_string(),
                        &session,
                        &location,
                        &motion,
                        &calls,
                        &ws_sender,
                    )
                    .await;
                }
                Message::Close(_) => {
                    info!("Client sent close message.");
                    break;
                }
                _ => {}
            }
        } else {
            info!("Client disconnected.");
            break;
        }
    }

    // --- Cleanup ---
    // A session left active by a dropped connection is stopped so the
    // recorded journey is not lost.
    if session.status().await == SessionStatus::Active {
        match session.stop().await {
            Ok(summary) => info!(
                "Persisted journey {} after disconnect",
                summary.journey.id
            ),
            Err(e) => error!("Failed to finalize journey after disconnect: {:?}", e),
        }
    }
    info!("WebSocket connection closed.");
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: String,
    session: &TrackingSession,
    location: &BridgeLocationProvider,
    motion: &BridgeMotionProvider,
    calls: &BridgeCallMonitor,
    ws_sender: &Arc<Mutex<SplitSink<WebSocket, Message>>>,
) {
    match serde_json::from_str::<ClientMessage>(&text) {
        Ok(client_msg) => match client_msg {
            ClientMessage::Start { user_id } => {
                info!("Start message received for user {}", user_id);
                match session.start(user_id).await {
                    Ok(()) => {
                        send_server_message(ws_sender, &ServerMessage::TrackingStarted).await;
                    }
                    Err(e) => {
                        error!("Failed to start tracking session: {:?}", e);
                        let err_msg = ServerMessage::Error {
                            message: e.to_string(),
                        };
                        send_server_message(ws_sender, &err_msg).await;
                    }
                }
            }
            ClientMessage::LocationBatch { samples } => {
                location.publish_batch(samples);
            }
            ClientMessage::Accelerometer { sample } => {
                motion.publish(MotionAxis::Accelerometer, sample);
            }
            ClientMessage::Gyroscope { sample } => {
                motion.publish(MotionAxis::Gyroscope, sample);
            }
            ClientMessage::CallState { on_call } => {
                calls.publish(on_call);
            }
            ClientMessage::PhoneUsage { in_use } => {
                session.set_phone_usage(in_use).await;
            }
            ClientMessage::Stop => {
                info!("Stop message received.");
                match session.stop().await {
                    Ok(summary) => {
                        let completed = ServerMessage::JourneyCompleted {
                            insufficient_data: summary.warning.is_some(),
                            journey: summary.journey,
                        };
                        send_server_message(ws_sender, &completed).await;
                    }
                    Err(e) => {
                        error!("Failed to stop tracking session: {:?}", e);
                        let err_msg = ServerMessage::Error {
                            message: e.to_string(),
                        };
                        send_server_message(ws_sender, &err_msg).await;
                    }
                }
            }
        },
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
        }
    }
}

async fn send_server_message(
    ws_sender: &Arc<Mutex<SplitSink<WebSocket, Message>>>,
    message: &ServerMessage,
) {
    let json = serde_json::to_string(message).unwrap();
    if ws_sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .is_err()
    {
        error!("Failed to send message to client.");
    }
}
