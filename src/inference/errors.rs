//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility; these types carry the context needed to build
//! meaningful log entries.

use thiserror::Error;

/// Errors that can occur while talking to the model endpoint.
///
/// None of these are recovered inside the reply loop: a failed model call
/// ends the reply and surfaces to the web layer.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the model endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The model endpoint did not respond within the configured timeout.
    #[error("inference timeout after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// Non-2xx HTTP response from the model endpoint.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be decoded into a model reply.
    #[error("response parse error: {reason}")]
    ResponseParse { reason: String },
}
