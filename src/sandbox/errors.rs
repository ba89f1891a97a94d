//! Sandbox error types.

use thiserror::Error;

/// Errors from sandboxed filesystem operations.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The path does not exist, or is not a regular file where one is needed.
    #[error("not found: '{path}'")]
    NotFound { path: String },

    /// The path would resolve outside the user's sandbox root.
    #[error("access denied: path '{path}' is outside the sandbox")]
    PathEscape { path: String },

    /// Any other I/O failure.
    #[error("I/O error on '{path}': {reason}")]
    Io { path: String, reason: String },
}

impl SandboxError {
    pub(crate) fn io(path: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            return SandboxError::NotFound {
                path: path.to_string(),
            };
        }
        SandboxError::Io {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}
