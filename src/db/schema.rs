//! Database schema and types

use crate::chat::Conversation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS chats (
    chatid TEXT PRIMARY KEY,
    userid TEXT NOT NULL,
    ticker TEXT NOT NULL,
    quarter INTEGER NOT NULL,
    year INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    messages TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chats_user ON chats(userid, timestamp DESC);
";

/// Chat metadata without the (large) conversation payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub userid: String,
    pub chatid: String,
    pub ticker: String,
    pub quarter: u8,
    pub year: i32,
    /// Last persisted mutation
    pub timestamp: DateTime<Utc>,
}

/// Full chat record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chat {
    #[serde(flatten)]
    pub summary: ChatSummary,
    pub messages: Conversation,
}
