//! Chat session manager
//!
//! Owns session identity, seeding, and the read-modify-write cycle of a
//! chat record. The store offers no locking, so every mutation is a whole
//! record upsert and two concurrent turns on one chat resolve as
//! last-writer-wins.
//!
//! A user turn is bracketed by two persists around the completion call:
//! the user's message is durable before the model is asked, and the reply
//! is durable after. A crash in between leaves a chat ending in a user turn.

pub mod traits;

#[cfg(test)]
pub mod testing;

pub use traits::*;

use crate::chat::{self, Conversation, Turn};
use crate::db::ChatSummary;
use crate::relay::RelayMessage;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

/// Default hard deadline for a completion call
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(6);

/// Assistant turn substituted when the model fails or times out
pub const COMPLETION_FALLBACK: &str =
    "We're sorry, the AI model returned an error message. Please try again later.";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No transcript available for {ticker} Q{quarter} {year}")]
    TranscriptUnavailable {
        ticker: String,
        quarter: u8,
        year: i32,
    },
    #[error("Chat not found: {0}")]
    NotFound(String),
    #[error("Chat {chatid} has only {turns} turns")]
    CorruptSession { chatid: String, turns: usize },
    #[error("Storage failure: {0}")]
    Persistence(String),
}

/// Result of a completed user turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Assistant text to relay, real or fallback
    pub reply: String,
    /// Whether the model failed and the fallback was used
    pub fell_back: bool,
    /// Whether both persists were acknowledged
    pub persisted: bool,
}

/// Manager for chat sessions
pub struct SessionManager {
    store: Arc<dyn ChatStore>,
    transcripts: Arc<dyn TranscriptSource>,
    completion: Arc<dyn CompletionClient>,
    completion_timeout: Duration,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn ChatStore>,
        transcripts: Arc<dyn TranscriptSource>,
        completion: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            store,
            transcripts,
            completion,
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_completion_timeout(mut self, deadline: Duration) -> Self {
        self.completion_timeout = deadline;
        self
    }

    // ==================== Session Lifecycle ====================

    /// Fetch the transcript and store a seeded chat, returning its id.
    ///
    /// Nothing is stored when the transcript is missing or too short.
    pub async fn create_session(
        &self,
        userid: &str,
        ticker: &str,
        quarter: u8,
        year: i32,
    ) -> Result<String, SessionError> {
        tracing::info!(user_id = %userid, %ticker, quarter, year, "Starting transcript chat");

        let unavailable = || SessionError::TranscriptUnavailable {
            ticker: ticker.to_string(),
            quarter,
            year,
        };

        if !(1..=4).contains(&quarter) {
            tracing::info!(%ticker, quarter, year, "Rejected chat for invalid quarter");
            return Err(unavailable());
        }

        let transcript = self.transcripts.fetch(ticker, year, quarter).await;
        if !chat::is_plausible_transcript(&transcript) {
            tracing::info!(%ticker, quarter, year, "Unable to retrieve earnings call transcript");
            return Err(unavailable());
        }

        let conversation = Conversation::seed(transcript, ticker, quarter, year);
        let summary = ChatSummary {
            userid: userid.to_string(),
            chatid: chat::new_chat_id(),
            ticker: ticker.to_string(),
            quarter,
            year,
            timestamp: Utc::now(),
        };

        let stored = self
            .store
            .upsert_chat(&summary, &conversation)
            .await
            .map_err(|e| {
                tracing::error!(chat_id = %summary.chatid, error = %e, "Failed to store new chat");
                SessionError::Persistence(e)
            })?;

        tracing::info!(chat_id = %stored.chatid, %ticker, quarter, year, "Created transcript chat");
        Ok(stored.chatid)
    }

    /// The conversation as a client may see it (seed turns removed)
    pub async fn get_visible_history(&self, chatid: &str) -> Result<Vec<Turn>, SessionError> {
        let chat = self
            .store
            .find_chat(chatid)
            .await
            .map_err(|e| {
                tracing::error!(chat_id = %chatid, error = %e, "Failed to load chat history");
                SessionError::Persistence(e)
            })?
            .ok_or_else(|| SessionError::NotFound(chatid.to_string()))?;

        Ok(chat.messages.visible().to_vec())
    }

    /// Best-effort listing: a store failure yields an empty list
    #[allow(dead_code)] // HTTP callers use the fallible variant
    pub async fn get_sessions_for_owner(&self, userid: &str) -> Vec<ChatSummary> {
        self.try_sessions_for_owner(userid)
            .await
            .unwrap_or_default()
    }

    /// Listing that reports store failures instead of hiding them
    pub async fn try_sessions_for_owner(
        &self,
        userid: &str,
    ) -> Result<Vec<ChatSummary>, SessionError> {
        let chats = self.store.list_for_owner(userid).await.map_err(|e| {
            tracing::error!(user_id = %userid, error = %e, "Failed to list chats");
            SessionError::Persistence(e)
        })?;
        tracing::debug!(user_id = %userid, count = chats.len(), "Listed chats for user");
        Ok(chats)
    }

    // ==================== Turn Protocol ====================

    /// Run one user turn to completion.
    ///
    /// The user echo goes to `sink` before the model is called. The
    /// assistant reply is returned for the caller to emit. Completion
    /// failures never surface as errors; only a missing or corrupt chat does,
    /// and in that case nothing has been emitted.
    pub async fn process_user_turn(
        &self,
        chatid: &str,
        text: &str,
        sink: &dyn TurnSink,
    ) -> Result<TurnOutcome, SessionError> {
        let summary = self
            .store
            .find_summary(chatid)
            .await
            .map_err(|e| {
                tracing::error!(chat_id = %chatid, error = %e, "Failed to load chat metadata");
                SessionError::Persistence(e)
            })?
            .ok_or_else(|| {
                tracing::warn!(chat_id = %chatid, "Message for unknown chat");
                SessionError::NotFound(chatid.to_string())
            })?;

        let mut conversation = self
            .store
            .find_chat(chatid)
            .await
            .map_err(|e| {
                tracing::error!(chat_id = %chatid, error = %e, "Failed to load chat conversation");
                SessionError::Persistence(e)
            })?
            .ok_or_else(|| {
                tracing::warn!(chat_id = %chatid, "Chat disappeared between loads");
                SessionError::NotFound(chatid.to_string())
            })?
            .messages;

        if !conversation.is_usable() {
            tracing::error!(chat_id = %chatid, turns = conversation.len(), "Chat conversation is corrupt");
            return Err(SessionError::CorruptSession {
                chatid: chatid.to_string(),
                turns: conversation.len(),
            });
        }

        conversation.push(Turn::user(text));
        sink.emit(RelayMessage::user(chatid, text));
        let mut persisted = self.persist_turn(&summary, &conversation).await;

        let (reply, fell_back) = match self.complete_with_deadline(chatid, &conversation).await {
            Some(reply) => (reply, false),
            None => (COMPLETION_FALLBACK.to_string(), true),
        };
        tracing::debug!(chat_id = %chatid, fell_back, reply = %reply, "Assistant replied");

        conversation.push(Turn::assistant(reply.as_str()));
        persisted &= self.persist_turn(&summary, &conversation).await;

        Ok(TurnOutcome {
            reply,
            fell_back,
            persisted,
        })
    }

    /// Mid-turn persist. Failures are logged and not retried; the turn
    /// carries on so the user still gets a reply.
    async fn persist_turn(&self, summary: &ChatSummary, conversation: &Conversation) -> bool {
        match self.store.upsert_chat(summary, conversation).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(
                    chat_id = %summary.chatid,
                    turns = conversation.len(),
                    error = %e,
                    "Failed to persist chat turn"
                );
                false
            }
        }
    }

    /// Ask the model for a reply, abandoning the call past the deadline
    async fn complete_with_deadline(
        &self,
        chatid: &str,
        conversation: &Conversation,
    ) -> Option<String> {
        match timeout(self.completion_timeout, self.completion.complete(conversation)).await {
            Ok(Ok(reply)) => Some(reply),
            Ok(Err(e)) => {
                tracing::error!(chat_id = %chatid, error = %e.message, kind = ?e.kind, "Completion failed");
                None
            }
            Err(_) => {
                tracing::error!(
                    chat_id = %chatid,
                    timeout_ms = %self.completion_timeout.as_millis(),
                    "Completion timed out"
                );
                None
            }
        }
    }
}
