//! Web layer — axum JSON API over the conversation store, reply engine and
//! sandbox.
//!
//! Submodules:
//! - `handlers`: route handlers
//! - `auth`: password hashing + HTTP Basic `AuthUser` extractor
//! - `errors`: `ApiError` → HTTP status mapping

pub mod auth;
pub mod errors;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;

use crate::agent_core::{ConversationStore, ReplyEngine};
use crate::inference::ChatModel;
use crate::sandbox::SandboxStore;

pub use errors::ApiError;

/// Shared handler state.
pub struct AppState<M> {
    pub store: Arc<ConversationStore>,
    pub sandbox: Arc<SandboxStore>,
    pub engine: Arc<ReplyEngine<M>>,
}

// Manual impl: `M` itself need not be Clone.
impl<M> Clone for AppState<M> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            sandbox: Arc::clone(&self.sandbox),
            engine: Arc::clone(&self.engine),
        }
    }
}

/// Build the application router.
pub fn router<M: ChatModel + 'static>(state: AppState<M>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/signup", post(handlers::signup::<M>))
        .route("/", get(handlers::list_conversations::<M>))
        .route("/chat/new", post(handlers::new_chat::<M>))
        .route(
            "/chat/:id",
            get(handlers::show_chat::<M>).post(handlers::post_message::<M>),
        )
        .route("/api/fs/list", get(handlers::fs_list::<M>))
        .route("/api/fs/read", get(handlers::fs_read::<M>))
        .route("/api/fs/write", post(handlers::fs_write::<M>))
        .with_state(state)
        .layer(middleware::from_fn(log_requests))
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "request"
    );
    response
}

// ─── Tests ──────────────────────────────────────────────────────────────────
