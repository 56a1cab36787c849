//! Mock implementations for testing
//!
//! These mocks enable session and relay tests without real I/O.

use super::traits::*;
use crate::chat::Conversation;
use crate::db::{Chat, ChatSummary};
use crate::llm::LlmError;
use crate::relay::RelayMessage;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Transcripts
// ============================================================================

/// Transcript source returning fixed text
pub struct MockTranscripts {
    text: Mutex<String>,
    calls: Mutex<Vec<(String, i32, u8)>>,
}

impl MockTranscripts {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Mutex::new(text.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_text(&self, text: impl Into<String>) {
        *self.text.lock().unwrap() = text.into();
    }

    /// Recorded `(ticker, year, quarter)` lookups
    pub fn calls(&self) -> Vec<(String, i32, u8)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptSource for MockTranscripts {
    async fn fetch(&self, ticker: &str, year: i32, quarter: u8) -> String {
        self.calls
            .lock()
            .unwrap()
            .push((ticker.to_string(), year, quarter));
        self.text.lock().unwrap().clone()
    }
}

// ============================================================================
// Completion
// ============================================================================

/// Completion client that returns queued replies
pub struct MockCompletion {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    /// Record of every conversation submitted
    pub requests: Mutex<Vec<Conversation>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_reply(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Ok(reply.into()));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<Conversation> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockCompletion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionClient for MockCompletion {
    async fn complete(&self, conversation: &Conversation) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(conversation.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock reply queued")))
    }
}

/// Completion client that answers "reply N" for its Nth call after a delay
pub struct SlowCompletion {
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowCompletion {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CompletionClient for SlowCompletion {
    async fn complete(&self, _conversation: &Conversation) -> Result<String, LlmError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        Ok(format!("reply {n}"))
    }
}

/// Completion client that never answers
pub struct HangingCompletion;

#[async_trait]
impl CompletionClient for HangingCompletion {
    async fn complete(&self, _conversation: &Conversation) -> Result<String, LlmError> {
        std::future::pending().await
    }
}

/// What the store and sink looked like when the model was called
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub stored_turns: usize,
    pub emitted: usize,
}

/// Completion client that inspects side effects made before it was invoked
pub struct ProbeCompletion {
    store: Arc<dyn ChatStore>,
    sink: Arc<RecordingSink>,
    chatid: Mutex<Option<String>>,
    observed: Mutex<Option<Observation>>,
}

impl ProbeCompletion {
    pub fn new(store: Arc<dyn ChatStore>, sink: Arc<RecordingSink>) -> Self {
        Self {
            store,
            sink,
            chatid: Mutex::new(None),
            observed: Mutex::new(None),
        }
    }

    pub fn watch(&self, chatid: &str) {
        *self.chatid.lock().unwrap() = Some(chatid.to_string());
    }

    pub fn observation(&self) -> Option<Observation> {
        *self.observed.lock().unwrap()
    }
}

#[async_trait]
impl CompletionClient for ProbeCompletion {
    async fn complete(&self, _conversation: &Conversation) -> Result<String, LlmError> {
        let chatid = self.chatid.lock().unwrap().clone();
        if let Some(chatid) = chatid {
            let stored_turns = self
                .store
                .find_chat(&chatid)
                .await
                .ok()
                .flatten()
                .map_or(0, |chat| chat.messages.len());
            *self.observed.lock().unwrap() = Some(Observation {
                stored_turns,
                emitted: self.sink.messages().len(),
            });
        }
        Ok("probed".to_string())
    }
}

// ============================================================================
// Stores
// ============================================================================

/// Store whose every operation fails
pub struct FailingStore;

#[async_trait]
impl ChatStore for FailingStore {
    async fn upsert_chat(
        &self,
        _summary: &ChatSummary,
        _messages: &Conversation,
    ) -> Result<ChatSummary, String> {
        Err("write not acknowledged".to_string())
    }

    async fn find_chat(&self, _chatid: &str) -> Result<Option<Chat>, String> {
        Err("store unreachable".to_string())
    }

    async fn find_summary(&self, _chatid: &str) -> Result<Option<ChatSummary>, String> {
        Err("store unreachable".to_string())
    }

    async fn list_for_owner(&self, _userid: &str) -> Result<Vec<ChatSummary>, String> {
        Err("store unreachable".to_string())
    }
}

/// Store wrapper whose writes can be switched off
pub struct FlakyStore<S> {
    inner: S,
    fail_writes: AtomicBool,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: ChatStore> ChatStore for FlakyStore<S> {
    async fn upsert_chat(
        &self,
        summary: &ChatSummary,
        messages: &Conversation,
    ) -> Result<ChatSummary, String> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err("write not acknowledged".to_string());
        }
        self.inner.upsert_chat(summary, messages).await
    }

    async fn find_chat(&self, chatid: &str) -> Result<Option<Chat>, String> {
        self.inner.find_chat(chatid).await
    }

    async fn find_summary(&self, chatid: &str) -> Result<Option<ChatSummary>, String> {
        self.inner.find_summary(chatid).await
    }

    async fn list_for_owner(&self, userid: &str) -> Result<Vec<ChatSummary>, String> {
        self.inner.list_for_owner(userid).await
    }
}

// ============================================================================
// Sink
// ============================================================================

/// Sink that records every emitted relay message
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<RelayMessage>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<RelayMessage> {
        self.messages.lock().unwrap().clone()
    }
}

impl TurnSink for RecordingSink {
    fn emit(&self, message: RelayMessage) {
        self.messages.lock().unwrap().push(message);
    }
}
