//! Chat data model
//!
//! Identifiers, turns, and the seeded conversation shared by the store,
//! the session manager and the relay.
//!
//! Every conversation starts with three seed turns: the transcript and the
//! formatting instruction (both system turns, sent to the model on every
//! request) and a synthetic assistant acknowledgment. Client-visible
//! history begins after the seed.

#[cfg(test)]
mod proptests;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Turns synthesized at creation: transcript, instructions, acknowledgment.
/// None of them appear in a client-visible history.
pub const SEED_TURNS: usize = 3;

/// A conversation shorter than this is unusable
pub const MIN_TURNS: usize = SEED_TURNS;

/// Transcripts shorter than this are treated as missing
pub const MIN_TRANSCRIPT_CHARS: usize = 10;

const FORMAT_INSTRUCTION: &str = "Carefully review the entire earnings call transcript in the previous message before answering any questions. \
Your response will be displayed verbatim to the user. Format it such that it will be easy and convenient for a human to read. \
Carefully construct your response, ensuring it does not contain asterisks, bullet points or other formatting that a human would find difficult to read.";

// ============================================================
// Identifiers
// ============================================================

/// Purpose tag embedded in generated identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    User,
    Chat,
}

impl IdKind {
    fn tag(self) -> &'static str {
        match self {
            IdKind::User => "user",
            IdKind::Chat => "chat",
        }
    }

    /// Prefix shared by every identifier of this kind, e.g. `cjr-chatid-`
    pub fn prefix(self) -> String {
        format!("cjr-{}id-", self.tag())
    }
}

/// Generate a fresh identifier namespaced by `kind`
pub fn new_id(kind: IdKind) -> String {
    format!("{}{}", kind.prefix(), uuid::Uuid::new_v4())
}

pub fn new_user_id() -> String {
    new_id(IdKind::User)
}

pub fn new_chat_id() -> String {
    new_id(IdKind::Chat)
}

// ============================================================
// Turns
// ============================================================

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged message.
///
/// Serialized as a `[role, content]` pair, which is the shape clients
/// already read from the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Role, String)", into = "(Role, String)")]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

impl From<(Role, String)> for Turn {
    fn from((role, content): (Role, String)) -> Self {
        Self { role, content }
    }
}

impl From<Turn> for (Role, String) {
    fn from(turn: Turn) -> Self {
        (turn.role, turn.content)
    }
}

// ============================================================
// Conversation
// ============================================================

/// Ordered turns of a chat, hidden system turns included
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation(Vec<Turn>);

impl Conversation {
    /// Build the three seed turns for a freshly fetched transcript
    pub fn seed(transcript: impl Into<String>, ticker: &str, quarter: u8, year: i32) -> Self {
        Self(vec![
            Turn::system(transcript),
            Turn::system(FORMAT_INSTRUCTION),
            Turn::assistant(format!(
                "I have retrieved the earnings call transcript for {ticker} for Q{quarter} {year}. Feel free to ask me questions about it."
            )),
        ])
    }

    pub fn push(&mut self, turn: Turn) {
        self.0.push(turn);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[allow(dead_code)] // Pairs with len(); conversations are never built empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the conversation still carries its seed turns
    pub fn is_usable(&self) -> bool {
        self.0.len() >= MIN_TURNS
    }

    /// Every turn, including the hidden system turns sent to the model
    pub fn turns(&self) -> &[Turn] {
        &self.0
    }

    /// Turns a client may see: everything after the seed turns
    pub fn visible(&self) -> &[Turn] {
        self.0.get(SEED_TURNS..).unwrap_or(&[])
    }
}

impl From<Vec<Turn>> for Conversation {
    fn from(turns: Vec<Turn>) -> Self {
        Self(turns)
    }
}

/// Whether a fetched transcript is long enough to seed a chat
pub fn is_plausible_transcript(text: &str) -> bool {
    text.chars().count() >= MIN_TRANSCRIPT_CHARS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_namespaced_by_kind() {
        let user = new_user_id();
        let chat = new_chat_id();

        assert!(user.starts_with("cjr-userid-"));
        assert!(chat.starts_with("cjr-chatid-"));
        assert_ne!(new_chat_id(), chat);
    }

    #[test]
    fn test_seed_has_hidden_turns_and_acknowledgment() {
        let conv = Conversation::seed("transcript body", "AAPL", 1, 2024);

        assert_eq!(conv.len(), 3);
        assert!(conv.is_usable());
        assert_eq!(conv.turns()[0], Turn::system("transcript body"));
        assert_eq!(conv.turns()[1].role, Role::System);
        assert_eq!(conv.turns()[2].role, Role::Assistant);
        assert!(conv.turns()[2].content.contains("AAPL for Q1 2024"));
    }

    #[test]
    fn test_visible_strips_seed_turns() {
        let mut conv = Conversation::seed("transcript body", "MSFT", 3, 2023);
        assert!(conv.visible().is_empty());

        conv.push(Turn::user("What was revenue?"));
        conv.push(Turn::assistant("Revenue was $90B."));

        let roles: Vec<Role> = conv.visible().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[test]
    fn test_visible_on_short_conversation_is_empty() {
        let conv = Conversation::from(vec![Turn::system("one"), Turn::system("two")]);
        assert!(conv.visible().is_empty());
        assert!(!conv.is_usable());
        assert!(!conv.is_empty());
        assert!(Conversation::from(Vec::new()).is_empty());
    }

    #[test]
    fn test_turn_serializes_as_pair() {
        let json = serde_json::to_string(&Turn::user("hi")).unwrap();
        assert_eq!(json, r#"["user","hi"]"#);

        let turn: Turn = serde_json::from_str(r#"["assistant","hello"]"#).unwrap();
        assert_eq!(turn, Turn::assistant("hello"));
    }

    #[test]
    fn test_transcript_plausibility() {
        assert!(!is_plausible_transcript(""));
        assert!(!is_plausible_transcript("too short"));
        assert!(is_plausible_transcript("long enough"));
    }
}
