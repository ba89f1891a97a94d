//! Agent Core — conversations, sandbox tools and the reply loop.
//!
//! Submodules:
//! - `database`: SQLite persistence for users, conversations, messages
//! - `conversation`: `ConversationStore` (shared DB access) + transcript building
//! - `tools`: `fs_list` / `fs_read` / `fs_write` bound to a `UserScope`
//! - `reply`: `ReplyEngine`, the bounded tool-using reply loop
//! - `types`: Shared types across the agent core
//! - `errors`: Agent-level error types

pub mod conversation;
pub mod database;
pub mod errors;
pub mod reply;
pub mod tools;
pub mod types;

// Re-exports for convenience
pub use conversation::{build_transcript, ConversationStore};
pub use database::ChatDatabase;
pub use errors::AgentError;
pub use reply::{ReplyEngine, EXHAUSTED_REPLY, SYSTEM_PROMPT};
pub use tools::{ToolFailure, ToolOutcome, ToolRegistry, UserScope};
pub use types::{Conversation, ConversationSummary, MessageRole, StoredMessage, User};
