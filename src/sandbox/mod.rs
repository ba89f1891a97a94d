//! Sandbox — per-user private file trees with enforced path confinement.
//!
//! Submodules:
//! - `store`: `SandboxStore` (ensure_root / list / read / write)
//! - `paths`: lexical + canonical containment checks
//! - `errors`: `SandboxError`

pub mod errors;
mod paths;
pub mod store;

pub use errors::SandboxError;
pub use store::SandboxStore;
