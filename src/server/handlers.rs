//! Request handlers for the JSON API.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::auth::{hash_password, AuthUser};
use super::errors::ApiError;
use super::AppState;
use crate::agent_core::{Conversation, ConversationSummary, StoredMessage};
use crate::inference::ChatModel;

// ─── Health / signup ────────────────────────────────────────────────────────

pub async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub async fn signup<M: Send + Sync + 'static>(
    State(state): State<AppState<M>>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest {
            reason: "username and password are required".into(),
        });
    }
    if username.contains(':') || username.chars().any(char::is_control) {
        return Err(ApiError::BadRequest {
            reason: "username must not contain ':' or control characters".into(),
        });
    }

    let user = state.store.create_user(username, &hash_password(&req.password))?;
    state.sandbox.ensure_root(user.id)?;
    tracing::info!(user_id = user.id, username = %user.username, "user signed up");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": user.id, "username": user.username })),
    ))
}

// ─── Conversations ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ConversationList {
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Serialize)]
pub struct ChatView {
    pub conversation: Conversation,
    pub messages: Vec<StoredMessage>,
}

#[derive(Debug, Deserialize)]
pub struct PostMessage {
    #[serde(default)]
    pub message: String,
}

pub async fn list_conversations<M: Send + Sync + 'static>(
    State(state): State<AppState<M>>,
    user: AuthUser,
) -> Result<Json<ConversationList>, ApiError> {
    let conversations = state.store.list_conversations(user.id)?;
    Ok(Json(ConversationList { conversations }))
}

pub async fn new_chat<M: Send + Sync + 'static>(
    State(state): State<AppState<M>>,
    user: AuthUser,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let conversation = state.store.start_conversation(user.id)?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

pub async fn show_chat<M: Send + Sync + 'static>(
    State(state): State<AppState<M>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ChatView>, ApiError> {
    let conversation = state.store.conversation_for_owner(id, user.id)?;
    chat_view(&state, conversation)
}

/// Store the user message, run the reply loop, store the reply.
///
/// A blank message changes nothing. When the model call fails the user
/// message stays stored and the caller gets 502.
pub async fn post_message<M: ChatModel + 'static>(
    State(state): State<AppState<M>>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<PostMessage>,
) -> Result<Json<ChatView>, ApiError> {
    let conversation = state.store.conversation_for_owner(id, user.id)?;

    let text = req.message.trim();
    if text.is_empty() {
        return chat_view(&state, conversation);
    }

    state.store.add_user_message(conversation.id, text)?;
    let reply = state.engine.generate_reply(text, &conversation).await?;
    state.store.add_assistant_message(conversation.id, &reply)?;

    chat_view(&state, conversation)
}

fn chat_view<M>(state: &AppState<M>, conversation: Conversation) -> Result<Json<ChatView>, ApiError> {
    let messages = state.store.history(conversation.id)?;
    Ok(Json(ChatView {
        conversation,
        messages,
    }))
}

// ─── Sandbox files ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReadQuery {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

pub async fn fs_list<M: Send + Sync + 'static>(
    State(state): State<AppState<M>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let entries = if query.recursive {
        state.sandbox.list_tree(user.id, &query.path)?
    } else {
        state.sandbox.list_dir(user.id, &query.path)?
    };
    Ok(Json(json!({ "path": query.path, "entries": entries })))
}

pub async fn fs_read<M: Send + Sync + 'static>(
    State(state): State<AppState<M>>,
    user: AuthUser,
    Query(query): Query<ReadQuery>,
) -> Result<Json<Value>, ApiError> {
    let content = state.sandbox.read(user.id, &query.path)?;
    Ok(Json(json!({ "path": query.path, "content": content })))
}

pub async fn fs_write<M: Send + Sync + 'static>(
    State(state): State<AppState<M>>,
    user: AuthUser,
    Json(req): Json<WriteRequest>,
) -> Result<Json<Value>, ApiError> {
    state.sandbox.write(user.id, &req.path, &req.content)?;
    Ok(Json(json!({ "ok": true, "path": req.path })))
}
