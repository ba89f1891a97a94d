//! Shared types for the inference client.
//!
//! These mirror the OpenAI Chat Completions API types, used for both
//! request building and response parsing.

use serde::{Deserialize, Serialize};

// ─── Request Types ───────────────────────────────────────────────────────────

/// A single message in the transcript.
///
/// Serialization notes for OpenAI-compatible local models:
/// - `content` must be `""` (not `null`) for assistant messages with tool calls.
///   Ollama misinterprets `null` content and fails to recognize the tool call
///   round-trip pattern.
/// - `tool_call_id` and `tool_calls` are skipped when `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(serialize_with = "serialize_content")]
    pub content: Option<String>,
    /// Tool call results are sent back as `tool` role messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Assistant messages may contain tool calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallResponse>>,
}

impl ChatMessage {
    fn text(role: Role, content: &str) -> Self {
        Self {
            role,
            content: Some(content.to_string()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn system(content: &str) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: &str) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: &str) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Assistant turn that requested the given tool calls.
    pub fn assistant_tool_calls(calls: &[ToolCall]) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_call_id: None,
            tool_calls: Some(calls.iter().map(ToolCall::to_response).collect()),
        }
    }

    /// Tool result correlated to its originating call.
    pub fn tool_result(tool_call_id: &str, output: &str) -> Self {
        Self {
            role: Role::Tool,
            content: Some(output.to_string()),
            tool_call_id: Some(tool_call_id.to_string()),
            tool_calls: None,
        }
    }
}

/// Emit `""` instead of `null` when `content` is `None`.
fn serialize_content<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(s) => serializer.serialize_str(s),
        None => serializer.serialize_str(""),
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Tool definition sent in the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub r#type: String,
    pub function: FunctionDefinition,
}

impl ToolDefinition {
    pub fn function(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            r#type: "function".to_string(),
            function: FunctionDefinition {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }
}

/// Function definition within a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Request body for `POST /v1/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

// ─── Response Types ──────────────────────────────────────────────────────────

/// A parsed tool call extracted from the model's response.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Opaque ID correlating the call with its result (generated if the
    /// model doesn't provide one).
    pub id: String,
    /// Tool name as requested by the model, e.g. `"fs_read"`.
    pub name: String,
    pub arguments: ToolArguments,
}

/// Tool call arguments as received from the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArguments {
    /// Decoded JSON, usually an object.
    Json(serde_json::Value),
    /// An argument string that is not valid JSON, kept verbatim.
    Undecodable { raw: String, reason: String },
}

impl ToolArguments {
    /// Wire form for the `function.arguments` field of the assistant turn.
    pub fn encode(&self) -> String {
        match self {
            ToolArguments::Json(value) => value.to_string(),
            ToolArguments::Undecodable { raw, .. } => raw.clone(),
        }
    }
}

impl From<serde_json::Value> for ToolArguments {
    fn from(value: serde_json::Value) -> Self {
        ToolArguments::Json(value)
    }
}

impl ToolCall {
    /// Re-encode for the assistant turn of the transcript.
    pub fn to_response(&self) -> ToolCallResponse {
        ToolCallResponse {
            id: self.id.clone(),
            r#type: "function".to_string(),
            function: FunctionCallResponse {
                name: self.name.clone(),
                arguments: self.arguments.encode(),
            },
        }
    }
}

/// Tool call as returned in the OpenAI response format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResponse {
    pub id: String,
    pub r#type: String,
    pub function: FunctionCallResponse,
}

/// Function call details in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallResponse {
    pub name: String,
    pub arguments: String,
}

/// One model turn, decided once when the service response is decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// Plain text answer; ends the reply loop.
    Text(String),
    /// The model asked for one or more tool invocations.
    ToolCalls(Vec<ToolCall>),
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_message_serializes_empty_content() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "fs_list".into(),
            arguments: serde_json::json!({"path": ""}).into(),
        };
        let msg = ChatMessage::assistant_tool_calls(&[call]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"], "");
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["tool_calls"][0]["function"]["name"], "fs_list");
        assert_eq!(json["tool_calls"][0]["function"]["arguments"], r#"{"path":""}"#);
        assert!(json.get("tool_call_id").is_none());
    }

    #[test]
    fn test_tool_result_carries_call_id() {
        let msg = ChatMessage::tool_result("call_7", "ERROR: file not found");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_7");
        assert_eq!(json["content"], "ERROR: file not found");
        assert!(json.get("tool_calls").is_none());
    }

    #[test]
    fn test_undecodable_arguments_are_passed_through() {
        let call = ToolCall {
            id: "call_2".into(),
            name: "fs_write".into(),
            arguments: ToolArguments::Undecodable {
                raw: "{not json".into(),
                reason: "EOF".into(),
            },
        };
        assert_eq!(call.to_response().function.arguments, "{not json");
    }

    #[test]
    fn test_decoded_string_arguments_stay_quoted() {
        let call = ToolCall {
            id: "call_3".into(),
            name: "fs_list".into(),
            arguments: serde_json::Value::String("x".into()).into(),
        };
        assert_eq!(call.to_response().function.arguments, r#""x""#);
    }

    #[test]
    fn test_tools_omitted_when_none() {
        let req = ChatCompletionRequest {
            model: "test".to_string(),
            messages: vec![ChatMessage::user("hi")],
            tools: None,
            tool_choice: None,
            temperature: 0.2,
            max_tokens: 256,
            stream: false,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("tools"), "tools should be omitted when None");
        assert!(!json.contains("tool_choice"));
    }
}
