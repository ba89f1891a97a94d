//! Agent Core error types.

use thiserror::Error;

use crate::inference::InferenceError;

/// Errors that can occur during agent core operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Database operation failed.
    #[error("database error: {reason}")]
    DatabaseError { reason: String },

    /// Conversation does not exist or is not owned by the caller.
    #[error("conversation not found: {conversation_id}")]
    ConversationNotFound { conversation_id: i64 },

    /// Username already taken.
    #[error("user already exists: '{username}'")]
    UserExists { username: String },

    /// The external model call failed. Never retried or recovered locally.
    #[error("model call failed: {0}")]
    Inference(#[from] InferenceError),
}

impl From<rusqlite::Error> for AgentError {
    fn from(e: rusqlite::Error) -> Self {
        AgentError::DatabaseError {
            reason: e.to_string(),
        }
    }
}
