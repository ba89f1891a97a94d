//! SQLite database for users, conversations and messages.
//!
//! Uses `rusqlite` in synchronous mode; callers hold the connection behind a
//! mutex for the duration of one query. WAL mode is enabled so readers do not
//! block the writer.

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::errors::AgentError;
use super::types::{Conversation, MessageRole, StoredMessage, User};
use crate::UserId;

// ─── Database ───────────────────────────────────────────────────────────────

/// SQLite database handle for the chat store.
pub struct ChatDatabase {
    conn: Connection,
}

impl ChatDatabase {
    /// Open (or create) the database at the given path.
    ///
    /// Pass `":memory:"` for an in-memory database (tests).
    pub fn open(path: &str) -> Result<Self, AgentError> {
        let conn = Connection::open(path)?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self { conn };
        db.create_tables()?;
        Ok(db)
    }

    /// Create all required tables if they don't exist.
    fn create_tables(&self) -> Result<(), AgentError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_conversations_owner
                ON conversations(owner_id, created_at);

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages(conversation_id, created_at, id);
            ",
        )?;
        Ok(())
    }

    // ─── Users ──────────────────────────────────────────────────────────

    /// Create a user. Fails with `UserExists` if the name is taken.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AgentError> {
        let created_at = now_timestamp();
        let inserted = self.conn.execute(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
            params![username, password_hash, created_at],
        );

        match inserted {
            Ok(_) => Ok(User {
                id: self.conn.last_insert_rowid(),
                username: username.to_string(),
                created_at,
            }),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(AgentError::UserExists {
                    username: username.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace a user's password hash. Returns `false` if no such user.
    pub fn set_password_hash(&self, username: &str, password_hash: &str) -> Result<bool, AgentError> {
        let changed = self.conn.execute(
            "UPDATE users SET password_hash = ?2 WHERE username = ?1",
            params![username, password_hash],
        )?;
        Ok(changed > 0)
    }

    /// Look up a user together with their stored password hash.
    pub fn get_user_credentials(
        &self,
        username: &str,
    ) -> Result<Option<(User, String)>, AgentError> {
        let result = self
            .conn
            .query_row(
                "SELECT id, username, created_at, password_hash FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok((
                        User {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            created_at: row.get(2)?,
                        },
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        Ok(result)
    }

    // ─── Conversations ──────────────────────────────────────────────────

    /// Create a conversation owned by `owner_id`.
    pub fn create_conversation(&self, owner_id: UserId) -> Result<Conversation, AgentError> {
        let created_at = now_timestamp();
        self.conn.execute(
            "INSERT INTO conversations (owner_id, created_at) VALUES (?1, ?2)",
            params![owner_id, created_at],
        )?;
        Ok(Conversation {
            id: self.conn.last_insert_rowid(),
            owner_id,
            created_at,
        })
    }

    /// Get a conversation by ID regardless of owner.
    pub fn get_conversation(&self, conversation_id: i64) -> Result<Option<Conversation>, AgentError> {
        let result = self
            .conn
            .query_row(
                "SELECT id, owner_id, created_at FROM conversations WHERE id = ?1",
                params![conversation_id],
                row_to_conversation,
            )
            .optional()?;
        Ok(result)
    }

    /// List a user's conversations, newest first.
    pub fn list_conversations(&self, owner_id: UserId) -> Result<Vec<Conversation>, AgentError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_id, created_at
             FROM conversations
             WHERE owner_id = ?1
             ORDER BY created_at DESC, id DESC",
        )?;

        let rows = stmt.query_map(params![owner_id], row_to_conversation)?;

        let mut conversations = Vec::new();
        for row in rows {
            conversations.push(row?);
        }
        Ok(conversations)
    }

    // ─── Messages ───────────────────────────────────────────────────────

    /// Append a message to a conversation.
    pub fn insert_message(
        &self,
        conversation_id: i64,
        role: MessageRole,
        content: &str,
    ) -> Result<StoredMessage, AgentError> {
        let created_at = now_timestamp();
        self.conn.execute(
            "INSERT INTO messages (conversation_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![conversation_id, role.as_str(), content, created_at],
        )?;
        Ok(StoredMessage {
            id: self.conn.last_insert_rowid(),
            conversation_id,
            role,
            content: content.to_string(),
            created_at,
        })
    }

    /// Get all messages for a conversation in chronological order.
    pub fn get_messages(&self, conversation_id: i64) -> Result<Vec<StoredMessage>, AgentError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, conversation_id, role, content, created_at
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![conversation_id], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Get the N most recent messages, returned oldest first.
    pub fn get_recent_messages(
        &self,
        conversation_id: i64,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, AgentError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, conversation_id, role, content, created_at
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![conversation_id, limit as i64], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        // Reverse so oldest is first
        messages.reverse();
        Ok(messages)
    }

    /// Count messages in a conversation.
    pub fn message_count(&self, conversation_id: i64) -> Result<usize, AgentError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
            params![conversation_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Content of the first user message, if any.
    pub fn first_user_message(&self, conversation_id: i64) -> Result<Option<String>, AgentError> {
        let result = self
            .conn
            .query_row(
                "SELECT content FROM messages
                 WHERE conversation_id = ?1 AND role = 'user'
                 ORDER BY created_at ASC, id ASC
                 LIMIT 1",
                params![conversation_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Current UTC time, fixed-width so text ordering matches time ordering.
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    Ok(StoredMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: MessageRole::from_stored(&row.get::<_, String>(2)?),
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

// ─── Tests ──────────────────────────────────────────────────────────────────
