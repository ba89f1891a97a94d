//! Inference Client — OpenAI-compatible API client for local LLM inference.
//!
//! This module handles all communication with the local model endpoint:
//! - Non-streaming chat completions with tool definitions
//! - Decoding each response once into [`ModelReply`] (text or tool calls)
//! - The [`ChatModel`] seam the reply loop is written against
//!
//! The client speaks the OpenAI Chat Completions API, so the model is
//! interchangeable via config.

pub mod client;
pub mod errors;
pub mod response;
#[cfg(test)]
pub(crate) mod scripted;
pub mod types;

// Re-exports for convenience
pub use client::{ChatModel, InferenceClient};
pub use errors::InferenceError;
pub use types::{ChatMessage, ModelReply, Role, ToolArguments, ToolCall, ToolDefinition};
