//! Trait abstractions for session I/O
//!
//! These traits enable testing the session manager with mock implementations.

use crate::chat::Conversation;
use crate::db::{Chat, ChatSummary, Database, DbError};
use crate::llm::{LlmError, LlmRequest, LlmService};
use crate::relay::RelayMessage;
use async_trait::async_trait;
use std::sync::Arc;

/// Durable storage for chat records
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Upsert a chat keyed by owner and chat id, returning the stored summary
    async fn upsert_chat(
        &self,
        summary: &ChatSummary,
        messages: &Conversation,
    ) -> Result<ChatSummary, String>;

    /// Load a chat with its conversation
    async fn find_chat(&self, chatid: &str) -> Result<Option<Chat>, String>;

    /// Load chat metadata only
    async fn find_summary(&self, chatid: &str) -> Result<Option<ChatSummary>, String>;

    /// All chats for a user, most recently modified first
    async fn list_for_owner(&self, userid: &str) -> Result<Vec<ChatSummary>, String>;
}

/// Source of earnings-call transcripts. Returns an empty string on any failure.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch(&self, ticker: &str, year: i32, quarter: u8) -> String;
}

/// Client producing the next assistant reply for a conversation
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, conversation: &Conversation) -> Result<String, LlmError>;
}

/// Receiver for relay events emitted mid-turn
pub trait TurnSink: Send + Sync {
    fn emit(&self, message: RelayMessage);
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as a `ChatStore`
#[derive(Clone)]
pub struct DatabaseStore {
    db: Database,
}

impl DatabaseStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChatStore for DatabaseStore {
    async fn upsert_chat(
        &self,
        summary: &ChatSummary,
        messages: &Conversation,
    ) -> Result<ChatSummary, String> {
        self.db
            .upsert_chat(summary, messages)
            .map_err(|e| e.to_string())
    }

    async fn find_chat(&self, chatid: &str) -> Result<Option<Chat>, String> {
        match self.db.get_chat(chatid) {
            Ok(chat) => Ok(Some(chat)),
            Err(DbError::ChatNotFound(_)) => Ok(None),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn find_summary(&self, chatid: &str) -> Result<Option<ChatSummary>, String> {
        match self.db.get_chat_summary(chatid) {
            Ok(summary) => Ok(Some(summary)),
            Err(DbError::ChatNotFound(_)) => Ok(None),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn list_for_owner(&self, userid: &str) -> Result<Vec<ChatSummary>, String> {
        self.db
            .list_chats_for_user(userid)
            .map_err(|e| e.to_string())
    }
}

/// Adapter to use an `LlmService` as a `CompletionClient`
pub struct LlmCompletion {
    service: Arc<dyn LlmService>,
    temperature: f32,
}

impl LlmCompletion {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self {
            service,
            temperature: 0.0,
        }
    }
}

#[async_trait]
impl CompletionClient for LlmCompletion {
    async fn complete(&self, conversation: &Conversation) -> Result<String, LlmError> {
        let request = LlmRequest::from_conversation(conversation).with_temperature(self.temperature);
        let response = self.service.complete(&request).await?;
        Ok(response.text)
    }
}
