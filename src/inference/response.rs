//! Decoding of chat-completion responses into [`ModelReply`].
//!
//! This is the only place that inspects the raw service payload. Everything
//! downstream sees either `ModelReply::Text` or `ModelReply::ToolCalls`.

use serde::Deserialize;
use uuid::Uuid;

use super::errors::InferenceError;
use super::types::{ModelReply, ToolArguments, ToolCall};

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<CompletionToolCall>>,
}

#[derive(Deserialize)]
struct CompletionToolCall {
    id: Option<String>,
    function: CompletionFunction,
}

#[derive(Deserialize)]
struct CompletionFunction {
    name: String,
    /// OpenAI sends a JSON-encoded string; some runtimes send an object.
    #[serde(default)]
    arguments: Option<serde_json::Value>,
}

/// Parse a non-streaming `/chat/completions` response body.
pub fn parse_completion_response(body: &str) -> Result<ModelReply, InferenceError> {
    let resp: CompletionResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::ResponseParse {
            reason: format!("failed to parse completion response: {e}"),
        })?;

    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or(InferenceError::ResponseParse {
            reason: "empty choices array".into(),
        })?;

    let calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall {
            id: tc
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{}", Uuid::new_v4())),
            name: tc.function.name,
            arguments: decode_arguments(tc.function.arguments),
        })
        .collect();

    if calls.is_empty() {
        Ok(ModelReply::Text(choice.message.content.unwrap_or_default()))
    } else {
        Ok(ModelReply::ToolCalls(calls))
    }
}

/// Normalize tool call arguments.
///
/// A string is decoded as JSON when possible. An undecodable string is kept
/// verbatim so the tool layer can report it back to the model.
fn decode_arguments(raw: Option<serde_json::Value>) -> ToolArguments {
    match raw {
        None | Some(serde_json::Value::Null) => ToolArguments::Json(serde_json::json!({})),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => {
            ToolArguments::Json(serde_json::json!({}))
        }
        Some(serde_json::Value::String(s)) => match serde_json::from_str(&s) {
            Ok(value) => ToolArguments::Json(value),
            Err(e) => {
                tracing::warn!(error = %e, "tool call arguments are not valid JSON");
                ToolArguments::Undecodable {
                    raw: s,
                    reason: e.to_string(),
                }
            }
        },
        Some(other) => ToolArguments::Json(other),
    }
}
