//! Common types for LLM interactions

use crate::chat::{Conversation, Role};

/// LLM request
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    /// System instructions, in conversation order
    pub system: Vec<String>,
    pub messages: Vec<LlmMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    /// Split a stored conversation into system instructions and dialogue.
    ///
    /// System turns keep their relative order; user and assistant turns
    /// become messages in the order they were appended.
    pub fn from_conversation(conversation: &Conversation) -> Self {
        let mut request = Self::default();
        for turn in conversation.turns() {
            match turn.role {
                Role::System => request.system.push(turn.content.clone()),
                Role::User => request.messages.push(LlmMessage::user(&turn.content)),
                Role::Assistant => request.messages.push(LlmMessage::assistant(&turn.content)),
            }
        }
        request
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Message in conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmMessage {
    pub role: MessageRole,
    pub text: String,
}

impl LlmMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            text: text.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

/// LLM response
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub usage: Usage,
}

/// Usage statistics
#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
