//! HTTP error mapping for the web layer.

use axum::http::header::WWW_AUTHENTICATE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::agent_core::AgentError;
use crate::sandbox::SandboxError;

/// Errors returned by request handlers.
///
/// Internal faults are logged here and answered with a generic body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthorized,

    #[error("{reason}")]
    BadRequest { reason: String },

    #[error("not found")]
    NotFound,

    #[error("{reason}")]
    Conflict { reason: String },

    #[error("model service unavailable")]
    BadGateway { reason: String },

    #[error("internal error")]
    Internal { reason: String },
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::ConversationNotFound { .. } => ApiError::NotFound,
            AgentError::UserExists { username } => ApiError::Conflict {
                reason: format!("username '{username}' is already taken"),
            },
            AgentError::Inference(inner) => ApiError::BadGateway {
                reason: inner.to_string(),
            },
            AgentError::DatabaseError { reason } => ApiError::Internal { reason },
        }
    }
}

impl From<SandboxError> for ApiError {
    fn from(e: SandboxError) -> Self {
        match e {
            SandboxError::NotFound { .. } => ApiError::NotFound,
            SandboxError::PathEscape { .. } => ApiError::BadRequest {
                reason: e.to_string(),
            },
            SandboxError::Io { .. } => ApiError::Internal {
                reason: e.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal { reason } => tracing::error!(%reason, "request failed"),
            ApiError::BadGateway { reason } => tracing::error!(%reason, "model call failed"),
            _ => {}
        }

        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        if let ApiError::Unauthorized = self {
            return (
                status,
                [(WWW_AUTHENTICATE, "Basic realm=\"sandchat\"")],
                body,
            )
                .into_response();
        }
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::InferenceError;

    #[test]
    fn test_agent_error_mapping() {
        let e: ApiError = AgentError::ConversationNotFound { conversation_id: 3 }.into();
        assert_eq!(e.status(), StatusCode::NOT_FOUND);

        let e: ApiError = AgentError::Inference(InferenceError::Timeout { duration_secs: 1 }).into();
        assert_eq!(e.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(e.to_string(), "model service unavailable");

        let e: ApiError = AgentError::DatabaseError { reason: "disk".into() }.into();
        assert_eq!(e.to_string(), "internal error");
    }

    #[test]
    fn test_sandbox_error_mapping() {
        let e: ApiError = SandboxError::PathEscape { path: "../x".into() }.into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        let e: ApiError = SandboxError::NotFound { path: "x".into() }.into();
        assert_eq!(e.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unauthorized_has_challenge() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(WWW_AUTHENTICATE));
    }
}
