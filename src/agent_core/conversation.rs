//! ConversationStore — shared, thread-safe access to the chat database.
//!
//! Wraps [`ChatDatabase`] in a mutex so request handlers can share one
//! connection. The lock is taken per call and never held across an await.
//! Also builds the model transcript from stored history.

use std::sync::{Mutex, MutexGuard};

use crate::inference::types::ChatMessage;
use crate::UserId;

use super::database::ChatDatabase;
use super::errors::AgentError;
use super::types::{Conversation, ConversationSummary, MessageRole, StoredMessage, User};

/// Maximum characters of the first user message shown in listings.
const PREVIEW_CHARS: usize = 80;

/// Persistent users, conversations and messages.
pub struct ConversationStore {
    db: Mutex<ChatDatabase>,
}

impl ConversationStore {
    pub fn new(db: ChatDatabase) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open the database at `path` and wrap it.
    pub fn open(path: &str) -> Result<Self, AgentError> {
        Ok(Self::new(ChatDatabase::open(path)?))
    }

    fn db(&self) -> Result<MutexGuard<'_, ChatDatabase>, AgentError> {
        self.db.lock().map_err(|_| AgentError::DatabaseError {
            reason: "database lock poisoned".into(),
        })
    }

    // ─── Users ──────────────────────────────────────────────────────────

    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AgentError> {
        self.db()?.create_user(username, password_hash)
    }

    /// Create the user, or reset the password if they already exist.
    ///
    /// Returns `true` when a new account was created.
    pub fn upsert_user(&self, username: &str, password_hash: &str) -> Result<bool, AgentError> {
        let db = self.db()?;
        if db.set_password_hash(username, password_hash)? {
            return Ok(false);
        }
        db.create_user(username, password_hash)?;
        Ok(true)
    }

    /// The user and stored password hash for `username`, if registered.
    pub fn user_credentials(&self, username: &str) -> Result<Option<(User, String)>, AgentError> {
        self.db()?.get_user_credentials(username)
    }

    // ─── Conversations ──────────────────────────────────────────────────

    pub fn start_conversation(&self, owner_id: UserId) -> Result<Conversation, AgentError> {
        let conversation = self.db()?.create_conversation(owner_id)?;
        tracing::info!(conversation_id = conversation.id, owner_id, "conversation started");
        Ok(conversation)
    }

    /// Fetch a conversation only if `owner_id` owns it.
    ///
    /// A conversation owned by someone else is indistinguishable from a
    /// missing one.
    pub fn conversation_for_owner(
        &self,
        conversation_id: i64,
        owner_id: UserId,
    ) -> Result<Conversation, AgentError> {
        match self.db()?.get_conversation(conversation_id)? {
            Some(conversation) if conversation.owner_id == owner_id => Ok(conversation),
            _ => Err(AgentError::ConversationNotFound { conversation_id }),
        }
    }

    /// The owner's conversations, newest first, with a short preview.
    pub fn list_conversations(
        &self,
        owner_id: UserId,
    ) -> Result<Vec<ConversationSummary>, AgentError> {
        let db = self.db()?;
        let conversations = db.list_conversations(owner_id)?;

        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let preview = db
                .first_user_message(conversation.id)?
                .map(|text| truncate_chars(&text, PREVIEW_CHARS));
            summaries.push(ConversationSummary {
                id: conversation.id,
                created_at: conversation.created_at,
                message_count: db.message_count(conversation.id)?,
                preview,
            });
        }
        Ok(summaries)
    }

    // ─── Messages ───────────────────────────────────────────────────────

    pub fn add_user_message(
        &self,
        conversation_id: i64,
        content: &str,
    ) -> Result<StoredMessage, AgentError> {
        self.db()?
            .insert_message(conversation_id, MessageRole::User, content)
    }

    pub fn add_assistant_message(
        &self,
        conversation_id: i64,
        content: &str,
    ) -> Result<StoredMessage, AgentError> {
        self.db()?
            .insert_message(conversation_id, MessageRole::Assistant, content)
    }

    /// Full history in chronological order.
    pub fn history(&self, conversation_id: i64) -> Result<Vec<StoredMessage>, AgentError> {
        self.db()?.get_messages(conversation_id)
    }

    /// The last `limit` messages in chronological order.
    pub fn recent_history(
        &self,
        conversation_id: i64,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, AgentError> {
        self.db()?.get_recent_messages(conversation_id, limit)
    }
}

/// Build the model transcript: the system instruction, then each stored
/// message as a user or assistant turn.
pub fn build_transcript(system_prompt: &str, history: &[StoredMessage]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(system_prompt));
    for msg in history {
        messages.push(match msg.role {
            MessageRole::User => ChatMessage::user(&msg.content),
            MessageRole::Assistant => ChatMessage::assistant(&msg.content),
        });
    }
    messages
}

/// First `max` characters of `text`, never splitting a code point.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::Role;

    fn test_store() -> ConversationStore {
        ConversationStore::open(":memory:").unwrap()
    }

    #[test]
    fn test_upsert_creates_then_updates() {
        let store = test_store();
        assert!(store.upsert_user("admin", "h1").unwrap());
        assert!(!store.upsert_user("admin", "h2").unwrap());
        let (_, hash) = store.user_credentials("admin").unwrap().unwrap();
        assert_eq!(hash, "h2");
    }

    #[test]
    fn test_conversation_for_owner_hides_other_users() {
        let store = test_store();
        let alice = store.create_user("alice", "h").unwrap();
        let bob = store.create_user("bob", "h").unwrap();
        let conv = store.start_conversation(alice.id).unwrap();

        assert_eq!(store.conversation_for_owner(conv.id, alice.id).unwrap(), conv);
        assert!(matches!(
            store.conversation_for_owner(conv.id, bob.id),
            Err(AgentError::ConversationNotFound { .. })
        ));
        assert!(matches!(
            store.conversation_for_owner(404, alice.id),
            Err(AgentError::ConversationNotFound { conversation_id: 404 })
        ));
    }

    #[test]
    fn test_list_conversations_with_preview() {
        let store = test_store();
        let user = store.create_user("alice", "h").unwrap();
        let empty = store.start_conversation(user.id).unwrap();
        let chatty = store.start_conversation(user.id).unwrap();
        let long = "x".repeat(200);
        store.add_user_message(chatty.id, &long).unwrap();
        store.add_assistant_message(chatty.id, "ok").unwrap();

        let listed = store.list_conversations(user.id).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, chatty.id);
        assert_eq!(listed[0].message_count, 2);
        assert_eq!(listed[0].preview.as_ref().unwrap().len(), PREVIEW_CHARS);
        assert_eq!(listed[1].id, empty.id);
        assert!(listed[1].preview.is_none());
    }

    #[test]
    fn test_transcript_uses_last_ten_in_order() {
        let store = test_store();
        let user = store.create_user("alice", "h").unwrap();
        let conv = store.start_conversation(user.id).unwrap();
        for i in 0..15 {
            if i % 2 == 0 {
                store.add_user_message(conv.id, &format!("m{i}")).unwrap();
            } else {
                store.add_assistant_message(conv.id, &format!("m{i}")).unwrap();
            }
        }

        let history = store.recent_history(conv.id, 10).unwrap();
        let transcript = build_transcript("sys", &history);

        assert_eq!(transcript.len(), 11);
        assert_eq!(transcript[0].role, Role::System);
        assert_eq!(transcript[0].content.as_deref(), Some("sys"));
        let contents: Vec<_> = transcript[1..]
            .iter()
            .map(|m| m.content.clone().unwrap())
            .collect();
        let expected: Vec<_> = (5..15).map(|i| format!("m{i}")).collect();
        assert_eq!(contents, expected);
        // m5 was an assistant turn, m6 a user turn.
        assert_eq!(transcript[1].role, Role::Assistant);
        assert_eq!(transcript[2].role, Role::User);
    }

    #[test]
    fn test_truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 80), "short");
    }
}
