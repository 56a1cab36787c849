//! API request and response types

use serde::{Deserialize, Serialize};

/// Request to start a chat about one earnings call
#[derive(Debug, Deserialize)]
pub struct NewChatRequest {
    pub userid: String,
    pub ticker: String,
    pub quarter: i64,
    pub year: i32,
}

/// Query for the history endpoint
#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub chatid: String,
}

/// Query for the listing endpoint
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub userid: String,
}

/// Liveness response
#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub message: String,
}

/// Response carrying a freshly issued user id
#[derive(Debug, Serialize, Deserialize)]
pub struct UserIdResponse {
    pub userid: String,
}

/// Response carrying a created chat id
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatIdResponse {
    pub chatid: String,
}
