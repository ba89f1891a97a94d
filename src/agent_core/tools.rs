//! Sandbox tools exposed to the model: `fs_list`, `fs_read`, `fs_write`.
//!
//! A [`ToolRegistry`] is built per reply for one [`UserScope`]. The model only
//! supplies `path`/`content`; the user identity comes from the scope, so a
//! tool can never reach another user's sandbox. Every invocation yields a
//! [`ToolOutcome`] and no error escapes the registry.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::inference::types::{ToolArguments, ToolCall, ToolDefinition};
use crate::sandbox::{SandboxError, SandboxStore};
use crate::UserId;

// ─── Scope ──────────────────────────────────────────────────────────────────

/// Per-request context passed to every tool execution.
#[derive(Debug, Clone)]
pub struct UserScope {
    pub user_id: UserId,
    pub sandbox: Arc<SandboxStore>,
}

// ─── Outcomes ───────────────────────────────────────────────────────────────

/// Why a tool invocation did not produce a normal result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolFailure {
    #[error("ERROR: unknown tool '{name}'")]
    UnknownTool { name: String },

    #[error("ERROR: tool failed: invalid arguments: {reason}")]
    InvalidArguments { reason: String },

    /// `fs_read` on a missing file.
    #[error("ERROR: file not found")]
    FileNotFound,

    #[error("ERROR: tool failed: {reason}")]
    Execution { reason: String },
}

/// Result of one tool invocation, rendered to text for the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(String),
    Failure(ToolFailure),
}

impl ToolOutcome {
    /// Text sent back to the model as the tool message content.
    pub fn into_text(self) -> String {
        match self {
            ToolOutcome::Success(text) => text,
            ToolOutcome::Failure(failure) => failure.to_string(),
        }
    }
}

impl From<SandboxError> for ToolFailure {
    fn from(e: SandboxError) -> Self {
        ToolFailure::Execution {
            reason: e.to_string(),
        }
    }
}

// ─── Tool trait ─────────────────────────────────────────────────────────────

/// A tool the model may call against the caller's sandbox.
pub trait SandboxTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema for the arguments object.
    fn parameters(&self) -> Value;
    fn execute(&self, scope: &UserScope, arguments: &Value) -> Result<String, ToolFailure>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(self.name(), self.description(), self.parameters())
    }
}

fn parse_args<T: DeserializeOwned>(arguments: &Value) -> Result<T, ToolFailure> {
    serde_json::from_value(arguments.clone()).map_err(|e| ToolFailure::InvalidArguments {
        reason: e.to_string(),
    })
}

// ─── fs_list ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ListArgs {
    #[serde(default)]
    path: String,
}

pub struct FsList;

impl SandboxTool for FsList {
    fn name(&self) -> &'static str {
        "fs_list"
    }

    fn description(&self) -> &'static str {
        "List files and folders in the user's sandbox recursively. \
         Directories end with '/', nesting is shown by indentation."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory relative to the sandbox root. Empty for the root.",
                    "default": ""
                }
            }
        })
    }

    fn execute(&self, scope: &UserScope, arguments: &Value) -> Result<String, ToolFailure> {
        let args: ListArgs = parse_args(arguments)?;
        let lines = scope.sandbox.list_tree(scope.user_id, &args.path)?;
        Ok(lines.join("\n"))
    }
}

// ─── fs_read ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ReadArgs {
    path: String,
}

pub struct FsRead;

impl SandboxTool for FsRead {
    fn name(&self) -> &'static str {
        "fs_read"
    }

    fn description(&self) -> &'static str {
        "Read a text file from the user's sandbox."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the sandbox root."
                }
            },
            "required": ["path"]
        })
    }

    fn execute(&self, scope: &UserScope, arguments: &Value) -> Result<String, ToolFailure> {
        let args: ReadArgs = parse_args(arguments)?;
        match scope.sandbox.read(scope.user_id, &args.path) {
            Ok(content) => Ok(content),
            Err(SandboxError::NotFound { .. }) => Err(ToolFailure::FileNotFound),
            Err(e) => Err(e.into()),
        }
    }
}

// ─── fs_write ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

pub struct FsWrite;

impl SandboxTool for FsWrite {
    fn name(&self) -> &'static str {
        "fs_write"
    }

    fn description(&self) -> &'static str {
        "Create or overwrite a text file in the user's sandbox. \
         Parent folders are created as needed."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the sandbox root."
                },
                "content": {
                    "type": "string",
                    "description": "Full new file content."
                }
            },
            "required": ["path", "content"]
        })
    }

    fn execute(&self, scope: &UserScope, arguments: &Value) -> Result<String, ToolFailure> {
        let args: WriteArgs = parse_args(arguments)?;
        scope
            .sandbox
            .write(scope.user_id, &args.path, &args.content)?;
        Ok(format!("OK: wrote {}", args.path))
    }
}

// ─── Registry ───────────────────────────────────────────────────────────────

/// The tool set bound to one user for one reply.
pub struct ToolRegistry {
    scope: UserScope,
    tools: Vec<Box<dyn SandboxTool>>,
}

impl ToolRegistry {
    pub fn for_user(scope: UserScope) -> Self {
        Self {
            scope,
            tools: vec![Box::new(FsList), Box::new(FsRead), Box::new(FsWrite)],
        }
    }

    /// Definitions in OpenAI `tools` format.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Run one tool call. Never fails; faults become `ToolOutcome::Failure`.
    pub fn invoke(&self, call: &ToolCall) -> ToolOutcome {
        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            tracing::warn!(tool = %call.name, "model requested unknown tool");
            return ToolOutcome::Failure(ToolFailure::UnknownTool {
                name: call.name.clone(),
            });
        };

        let result = match &call.arguments {
            ToolArguments::Json(arguments) => tool.execute(&self.scope, arguments),
            ToolArguments::Undecodable { reason, .. } => Err(ToolFailure::InvalidArguments {
                reason: reason.clone(),
            }),
        };
        match result {
            Ok(text) => {
                tracing::info!(
                    tool = %call.name,
                    user_id = self.scope.user_id,
                    output_len = text.len(),
                    "tool executed"
                );
                ToolOutcome::Success(text)
            }
            Err(failure) => {
                tracing::warn!(
                    tool = %call.name,
                    user_id = self.scope.user_id,
                    error = %failure,
                    "tool failed"
                );
                ToolOutcome::Failure(failure)
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(user_id: UserId) -> (TempDir, ToolRegistry) {
        let dir = TempDir::new().unwrap();
        let sandbox = Arc::new(SandboxStore::new(dir.path()));
        (dir, ToolRegistry::for_user(UserScope { user_id, sandbox }))
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    #[test]
    fn test_definitions_cover_three_tools() {
        let (_dir, reg) = registry(1);
        let names: Vec<_> = reg
            .definitions()
            .into_iter()
            .map(|d| d.function.name)
            .collect();
        assert_eq!(names, vec!["fs_list", "fs_read", "fs_write"]);
    }

    #[test]
    fn test_write_read_list() {
        let (_dir, reg) = registry(1);

        let out = reg.invoke(&call("fs_write", json!({"path": "notes/a.txt", "content": "hi"})));
        assert_eq!(out, ToolOutcome::Success("OK: wrote notes/a.txt".into()));

        let out = reg.invoke(&call("fs_read", json!({"path": "notes/a.txt"})));
        assert_eq!(out.into_text(), "hi");

        let out = reg.invoke(&call("fs_list", json!({})));
        assert_eq!(out.into_text(), "notes/\n  a.txt");
    }

    #[test]
    fn test_list_empty_sandbox_is_empty_string() {
        let (_dir, reg) = registry(1);
        let out = reg.invoke(&call("fs_list", json!({"path": ""})));
        assert_eq!(out, ToolOutcome::Success(String::new()));
    }

    #[test]
    fn test_read_missing_file() {
        let (_dir, reg) = registry(1);
        let out = reg.invoke(&call("fs_read", json!({"path": "nope.txt"})));
        assert!(matches!(out, ToolOutcome::Failure(ToolFailure::FileNotFound)));
        assert_eq!(out.into_text(), "ERROR: file not found");
    }

    #[test]
    fn test_unknown_tool() {
        let (_dir, reg) = registry(1);
        let out = reg.invoke(&call("fs_delete", json!({"path": "a"})));
        assert_eq!(out.into_text(), "ERROR: unknown tool 'fs_delete'");
    }

    #[test]
    fn test_invalid_arguments() {
        let (_dir, reg) = registry(1);

        let missing = reg.invoke(&call("fs_write", json!({"path": "a.txt"})));
        assert!(missing
            .into_text()
            .starts_with("ERROR: tool failed: invalid arguments: "));

        let undecodable = reg.invoke(&ToolCall {
            id: "call_2".into(),
            name: "fs_read".into(),
            arguments: ToolArguments::Undecodable {
                raw: "{not json".into(),
                reason: "EOF while parsing".into(),
            },
        });
        assert_eq!(
            undecodable,
            ToolOutcome::Failure(ToolFailure::InvalidArguments {
                reason: "EOF while parsing".into()
            })
        );

        // A JSON string is decoded but is not an arguments object.
        let wrong_shape = reg.invoke(&call("fs_read", Value::String("notes.txt".into())));
        assert!(matches!(
            wrong_shape,
            ToolOutcome::Failure(ToolFailure::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_path_escape_reported_as_failure() {
        let (_dir, reg) = registry(1);
        let out = reg.invoke(&call("fs_read", json!({"path": "../2/secret.txt"})));
        let text = out.into_text();
        assert!(text.starts_with("ERROR: tool failed: "), "got {text}");
    }

    #[test]
    fn test_scope_isolates_users() {
        let dir = TempDir::new().unwrap();
        let sandbox = Arc::new(SandboxStore::new(dir.path()));
        let one = ToolRegistry::for_user(UserScope { user_id: 1, sandbox: sandbox.clone() });
        let two = ToolRegistry::for_user(UserScope { user_id: 2, sandbox });

        one.invoke(&call("fs_write", json!({"path": "mine.txt", "content": "1"})));
        assert_eq!(
            two.invoke(&call("fs_read", json!({"path": "mine.txt"}))).into_text(),
            "ERROR: file not found"
        );
        assert_eq!(two.invoke(&call("fs_list", json!({}))).into_text(), "");
    }
}
