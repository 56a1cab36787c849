//! Real-time relay gateway
//!
//! Protocol adapter between socket clients and the session manager. Holds no
//! session state: every inbound chat message is handed to the manager, and
//! the resulting events are published to a single room that every connected
//! client receives. There is no per-client targeting.

use crate::chat::Role;
use crate::session::{SessionError, SessionManager, TurnSink};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Event name used for inbound messages and every outbound relay event
pub const CHAT_EVENT: &str = "earnings_call_transcript_chat_message";

/// Text sent in place of a reply when the chat cannot be used
pub const RELAY_ERROR_MESSAGE: &str =
    "A technical problem prevented us from processing your message. Please notify the site administrator about this.";

const ROOM_CAPACITY: usize = 256;

// ============================================================
// Wire types
// ============================================================

/// Outbound relay event payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage {
    pub role: Role,
    pub chatid: String,
    pub message: String,
}

impl RelayMessage {
    pub fn new(role: Role, chatid: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            role,
            chatid: chatid.into(),
            message: message.into(),
        }
    }

    pub fn user(chatid: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Role::User, chatid, message)
    }

    pub fn assistant(chatid: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Role::Assistant, chatid, message)
    }

    pub fn error(chatid: impl Into<String>) -> Self {
        Self::new(Role::System, chatid, RELAY_ERROR_MESSAGE)
    }

    /// Encode as a socket frame. The payload is a JSON-encoded string rather
    /// than an object, which is what existing clients parse.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        let data = serde_json::to_string(self)?;
        serde_json::to_string(&Frame {
            event: CHAT_EVENT.to_string(),
            data: Value::String(data),
        })
    }
}

/// Socket frame envelope: an event name and its payload
#[derive(Debug, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
struct ChatPayload {
    chatid: String,
    message: String,
}

/// Validated inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Connect,
    Disconnect,
    ChatMessage { chatid: String, text: String },
}

impl InboundEvent {
    /// Parse a client frame. Returns `None` for unknown events and for chat
    /// messages missing `chatid` or `message`.
    pub fn from_frame(text: &str) -> Option<Self> {
        let frame: Frame = serde_json::from_str(text).ok()?;
        if frame.event != CHAT_EVENT {
            return None;
        }

        // Clients may send the payload as an object or as a JSON string
        let payload: ChatPayload = match frame.data {
            Value::String(encoded) => serde_json::from_str(&encoded).ok()?,
            other => serde_json::from_value(other).ok()?,
        };

        if payload.chatid.trim().is_empty() {
            return None;
        }

        Some(Self::ChatMessage {
            chatid: payload.chatid,
            text: payload.message,
        })
    }
}

// ============================================================
// Room
// ============================================================

/// Broadcast room shared by every connected client
#[derive(Clone)]
pub struct Room {
    tx: broadcast::Sender<RelayMessage>,
}

impl Room {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(ROOM_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayMessage> {
        self.tx.subscribe()
    }

    /// Number of clients currently receiving room events
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn publish(&self, message: RelayMessage) {
        // No subscribers is not an error; the event is simply unseen
        let _ = self.tx.send(message);
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnSink for Room {
    fn emit(&self, message: RelayMessage) {
        self.publish(message);
    }
}

// ============================================================
// Gateway
// ============================================================

/// Drives the session manager from inbound socket events
pub struct RelayGateway {
    sessions: Arc<SessionManager>,
    room: Room,
}

impl RelayGateway {
    pub fn new(sessions: Arc<SessionManager>, room: Room) -> Self {
        Self { sessions, room }
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    /// Handle one inbound event to completion
    pub async fn handle(&self, connection: &str, event: InboundEvent) {
        match event {
            InboundEvent::Connect => {
                tracing::trace!(connection, clients = self.room.subscriber_count(), "Client connected");
            }
            InboundEvent::Disconnect => {
                tracing::trace!(connection, "Client disconnected");
            }
            InboundEvent::ChatMessage { chatid, text } => {
                tracing::trace!(connection, chat_id = %chatid, text = %text, "Received chat message");
                self.relay_chat_message(&chatid, &text).await;
            }
        }
    }

    async fn relay_chat_message(&self, chatid: &str, text: &str) {
        match self.sessions.process_user_turn(chatid, text, &self.room).await {
            Ok(outcome) => {
                if outcome.fell_back {
                    tracing::warn!(chat_id = %chatid, "Relaying fallback reply");
                }
                if !outcome.persisted {
                    tracing::warn!(chat_id = %chatid, "Relaying reply for a turn that was not fully persisted");
                }
                self.room.publish(RelayMessage::assistant(chatid, outcome.reply));
            }
            Err(e) => {
                match &e {
                    SessionError::CorruptSession { .. } => {
                        tracing::error!(chat_id = %chatid, error = %e, "Refusing message for corrupt chat");
                    }
                    _ => {
                        tracing::warn!(chat_id = %chatid, error = %e, "Unable to process chat message");
                    }
                }
                self.room.publish(RelayMessage::error(chatid));
            }
        }
    }
}
