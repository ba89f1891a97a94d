//! SandboxStore — per-user private file trees.
//!
//! Each user owns `<base>/<user_id>/`, created lazily on first access. Every
//! operation takes a caller-supplied relative path that is confined to that
//! root before touching the filesystem (see [`super::paths`]).

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::errors::SandboxError;
use super::paths::{confine, normalize_relative};
use crate::UserId;

/// Indentation added per depth level in [`SandboxStore::list_tree`].
const TREE_INDENT: &str = "  ";

/// Filesystem sandbox rooted at a configured base directory.
#[derive(Debug, Clone)]
pub struct SandboxStore {
    base: PathBuf,
}

impl SandboxStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Parent directory of all user roots.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Return the user's private root, creating it (and parents) if absent.
    ///
    /// The returned path is canonical. Idempotent.
    pub fn ensure_root(&self, user_id: UserId) -> Result<PathBuf, SandboxError> {
        let root = self.base.join(user_id.to_string());
        let display = root.display().to_string();
        fs::create_dir_all(&root).map_err(|e| SandboxError::io(&display, e))?;
        fs::canonicalize(&root).map_err(|e| SandboxError::io(&display, e))
    }

    /// Resolve `raw` inside the user's root.
    fn resolve(&self, user_id: UserId, raw: &str) -> Result<PathBuf, SandboxError> {
        let relative = normalize_relative(raw)?;
        let root = self.ensure_root(user_id)?;
        confine(&root, &relative, raw)
    }

    /// Names of the immediate children of a directory, sorted.
    ///
    /// A missing path or a non-directory yields an empty list.
    pub fn list_dir(&self, user_id: UserId, raw: &str) -> Result<Vec<String>, SandboxError> {
        let target = self.resolve(user_id, raw)?;
        if !target.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in sorted_walk(&target).max_depth(1) {
            let entry = entry.map_err(|e| walk_error(raw, e))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    /// Every descendant of a directory, one line per entry.
    ///
    /// Lines are indented two spaces per depth level and directories carry
    /// a trailing `/`. Siblings are sorted; each directory is followed by
    /// its children. Symlinked directories are listed but not descended.
    /// A missing path or a non-directory yields an empty list.
    pub fn list_tree(&self, user_id: UserId, raw: &str) -> Result<Vec<String>, SandboxError> {
        let target = self.resolve(user_id, raw)?;
        if !target.is_dir() {
            return Ok(Vec::new());
        }

        let mut lines = Vec::new();
        for entry in sorted_walk(&target) {
            let entry = entry.map_err(|e| walk_error(raw, e))?;
            let file_type = entry.file_type();
            let is_dir = file_type.is_dir() || (file_type.is_symlink() && entry.path().is_dir());
            lines.push(format!(
                "{}{}{}",
                TREE_INDENT.repeat(entry.depth() - 1),
                entry.file_name().to_string_lossy(),
                if is_dir { "/" } else { "" }
            ));
        }
        Ok(lines)
    }

    /// Read the full text of a file.
    pub fn read(&self, user_id: UserId, raw: &str) -> Result<String, SandboxError> {
        let target = self.resolve(user_id, raw)?;
        if !target.is_file() {
            return Err(SandboxError::NotFound {
                path: raw.to_string(),
            });
        }
        fs::read_to_string(&target).map_err(|e| SandboxError::io(raw, e))
    }

    /// Create or fully overwrite a file, creating parent directories.
    pub fn write(&self, user_id: UserId, raw: &str, content: &str) -> Result<(), SandboxError> {
        let target = self.resolve(user_id, raw)?;
        if target.is_dir() {
            return Err(SandboxError::Io {
                path: raw.to_string(),
                reason: "path is a directory".into(),
            });
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| SandboxError::io(raw, e))?;
        }
        fs::write(&target, content).map_err(|e| SandboxError::io(raw, e))?;

        tracing::debug!(user_id, path = %raw, bytes = content.len(), "sandbox write");
        Ok(())
    }
}

/// Depth-first walk below `dir`, siblings sorted by name, links not followed.
fn sorted_walk(dir: &Path) -> WalkDir {
    WalkDir::new(dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
}

fn walk_error(raw: &str, err: walkdir::Error) -> SandboxError {
    let reason = err.to_string();
    match err.into_io_error() {
        Some(io) => SandboxError::io(raw, io),
        None => SandboxError::Io {
            path: raw.to_string(),
            reason,
        },
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
