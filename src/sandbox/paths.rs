//! Path confinement for sandbox operations.
//!
//! Two passes run before any filesystem call:
//! 1. Lexical: the caller-supplied path is reduced to plain `Normal`
//!    components. `..` and drive/UNC prefixes are rejected outright; a
//!    leading `/` means the sandbox root.
//! 2. Physical: the nearest existing ancestor of the joined path is
//!    canonicalized and must still sit under the canonical root, which
//!    catches symlinks pointing elsewhere.

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::errors::SandboxError;

/// Reduce a user-supplied path to a relative path of plain components.
pub(crate) fn normalize_relative(raw: &str) -> Result<PathBuf, SandboxError> {
    let mut out = PathBuf::new();
    for component in Path::new(raw).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                tracing::warn!(path = %raw, "sandbox: traversal component rejected");
                return Err(SandboxError::PathEscape {
                    path: raw.to_string(),
                });
            }
        }
    }
    Ok(out)
}

/// Join `relative` onto the canonical `root` and verify the result cannot
/// leave it.
///
/// `root` must already be canonical. The returned path is the canonical
/// existing ancestor joined with the not-yet-existing remainder.
pub(crate) fn confine(root: &Path, relative: &Path, raw: &str) -> Result<PathBuf, SandboxError> {
    let joined = root.join(relative);
    let (ancestor, remainder) = canonicalize_ancestor(&joined, raw)?;

    if !ancestor.starts_with(root) {
        tracing::warn!(
            path = %raw,
            resolved = %ancestor.display(),
            "sandbox: path resolves outside root"
        );
        return Err(SandboxError::PathEscape {
            path: raw.to_string(),
        });
    }

    Ok(ancestor.join(remainder))
}

/// Walk up `path` to the nearest existing ancestor and return
/// `(canonicalized_ancestor, remaining_suffix)`.
///
/// An entry that exists but cannot be canonicalized (a dangling symlink) is
/// treated as an escape: writing through it would land wherever it points.
fn canonicalize_ancestor(path: &Path, raw: &str) -> Result<(PathBuf, PathBuf), SandboxError> {
    let mut current = path.to_path_buf();
    let mut suffix_parts: Vec<std::ffi::OsString> = Vec::new();

    loop {
        match fs::canonicalize(&current) {
            Ok(canonical) => {
                let remainder: PathBuf = suffix_parts.into_iter().rev().collect();
                return Ok((canonical, remainder));
            }
            Err(_) if fs::symlink_metadata(&current).is_ok() => {
                tracing::warn!(
                    path = %raw,
                    entry = %current.display(),
                    "sandbox: unresolvable symlink in path"
                );
                return Err(SandboxError::PathEscape {
                    path: raw.to_string(),
                });
            }
            Err(_) => {
                if let Some(file_name) = current.file_name() {
                    suffix_parts.push(file_name.to_os_string());
                }
                if !current.pop() {
                    return Err(SandboxError::Io {
                        path: raw.to_string(),
                        reason: "no existing ancestor".into(),
                    });
                }
            }
        }
    }
}
