//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::VitalsEvent;
use crate::service::DogService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Sends one snapshot of the current gauges and sync status.
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<VitalsEvent>,
    dog_service: Arc<DogService>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    let snapshot = WsMessage::server(
        uuid::Uuid::new_v4().to_string(),
        WsMessageType::Snapshot,
        state_payload(&dog_service).await,
    );
    if send(&mut ws_tx, &snapshot).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs, &dog_service).await;
                        if send(&mut ws_tx, &response).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(vitals_event) => {
                        if !subs.matches(vitals_event.topic()) {
                            continue;
                        }
                        let msg = WsMessage::server(
                            uuid::Uuid::new_v4().to_string(),
                            WsMessageType::Event,
                            serde_json::to_value(&vitals_event).unwrap_or_default(),
                        );
                        if send(&mut ws_tx, &msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

async fn send(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    msg: &WsMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).unwrap_or_default();
    ws_tx.send(Message::text(json)).await
}

async fn state_payload(dog_service: &DogService) -> serde_json::Value {
    let stats = dog_service.stats().await;
    json!({
        "stats": stats,
        "level": stats.urgency_level(),
        "sync": dog_service.sync_status(),
    })
}

/// Handles a text message from the client, returning the reply.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    dog_service: &DogService,
) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error("", 400, "malformed JSON");
    };
    if msg.msg_type != WsMessageType::Command {
        return WsMessage::error(msg.id, 400, "expected a command");
    }
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return WsMessage::error(msg.id, 404, "unknown command");
    };

    let payload = match command {
        WsCommand::Subscribe { topics } => {
            let unknown = subs.subscribe(&topics);
            json!({
                "subscribed": subs.topic_names(),
                "wildcard": subs.is_subscribed_all(),
                "unknown": unknown,
            })
        }
        WsCommand::Unsubscribe { topics } => {
            subs.unsubscribe(&topics);
            json!({
                "subscribed": subs.topic_names(),
                "wildcard": subs.is_subscribed_all(),
            })
        }
        WsCommand::GetStats => {
            let stats = dog_service.stats().await;
            json!({ "stats": stats, "level": stats.urgency_level() })
        }
        WsCommand::GetSyncStatus => json!({ "status": dog_service.sync_status() }),
    };
    WsMessage::server(msg.id, WsMessageType::Response, payload)
}
