//! Shared types for the agent core.
//!
//! Users, conversations and stored messages as returned by the
//! ConversationStore and serialized by the web layer.

use serde::{Deserialize, Serialize};

use crate::UserId;

// ─── Users ──────────────────────────────────────────────────────────────────

/// An account able to own conversations and a sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

// ─── Conversations ──────────────────────────────────────────────────────────

/// A conversation owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub owner_id: UserId,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

/// Listing row for a user's conversations.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub created_at: String,
    pub message_count: usize,
    /// Start of the first user message, if any.
    pub preview: Option<String>,
}

// ─── Messages ───────────────────────────────────────────────────────────────

/// Stored role of a message.
///
/// Only `user` and `assistant` are ever written. Anything else read back
/// from the database is treated as an assistant turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn from_stored(s: &str) -> Self {
        match s {
            "user" => MessageRole::User,
            _ => MessageRole::Assistant,
        }
    }
}

/// A single immutable message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub role: MessageRole,
    pub content: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}
