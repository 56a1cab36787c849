//! Socket endpoint bridging clients to the relay room
//!
//! Each connection gets a forwarder task pushing every room event to the
//! client, while inbound frames are handled one at a time on the
//! connection's own task. A slow completion therefore delays only the next
//! message from the same client, never the events other clients see.

use super::AppState;
use crate::relay::{InboundEvent, RelayGateway};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

pub async fn socket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.relay))
}

async fn handle_socket(socket: WebSocket, relay: Arc<RelayGateway>) {
    let connection = uuid::Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();
    let mut events = relay.room().subscribe();

    relay.handle(&connection, InboundEvent::Connect).await;

    let mut forward = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(message) => {
                    let frame = match message.to_frame() {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to encode relay event");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Socket subscriber lagged behind the room");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut forward => break,
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => match InboundEvent::from_frame(&text) {
                    Some(event) => relay.handle(&connection, event).await,
                    None => tracing::warn!(%connection, frame = %text, "Ignoring unrecognized frame"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(%connection, error = %e, "Socket receive error");
                    break;
                }
                // Binary and control frames carry nothing for the relay
                Some(Ok(_)) => {}
            }
        }
    }

    forward.abort();
    relay.handle(&connection, InboundEvent::Disconnect).await;
}
