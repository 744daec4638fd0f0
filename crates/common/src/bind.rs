//! The seam the per-platform binders implement, plus the bind error
//! taxonomy and the computed drift of one binding.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::mapping::BindingKind;

/// Why a bind or unbind failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    /// The target exists and is not a binding this system created. Never
    /// retried automatically and never overwritten.
    #[error("target is occupied by a foreign entry: {0}")]
    Conflict(String),

    /// The OS refused the operation. Surfaced to the user; there is no
    /// in-process elevation path on every platform, so never retried.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The resolved source path does not exist under the mount root.
    #[error("source path missing: {0}")]
    SourceMissing(PathBuf),

    /// The binding kind is not available on this platform.
    #[error("binding not supported on this platform: {0}")]
    PlatformUnsupported(String),

    /// The OS call exceeded its per-operation deadline. Retried on the next
    /// poll tick.
    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("bind operation failed: {0}")]
    Unknown(String),
}

impl BindError {
    /// Retryable errors are re-attempted on the next tick; the rest move the
    /// mapping to `Blocked` until the condition is resolved externally.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BindError::Timeout(_) | BindError::Unknown(_))
    }
}

/// Computed difference between a desired binding and its live OS state.
/// Derived fresh on every pass, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Drift {
    /// No binding exists at the target.
    Missing,
    /// The target is bound to the expected source.
    Correct,
    /// A binding of our kind exists at the target but points elsewhere.
    /// Whether that is our stale binding or a foreign one is decided by the
    /// reconciler against its `RecordStore`.
    Stale(PathBuf),
    /// Live state could not be determined; no action is taken.
    Unreachable(String),
}

impl std::fmt::Display for Drift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Drift::Missing => write!(f, "missing"),
            Drift::Correct => write!(f, "correct"),
            Drift::Stale(old) => write!(f, "stale ({})", old.display()),
            Drift::Unreachable(reason) => write!(f, "unreachable ({reason})"),
        }
    }
}

/// One capability set over {Windows, macOS, Linux}: create, remove, and
/// inspect a single path binding. Selected once at startup by a platform
/// switch; the reconciler stays platform-agnostic.
#[async_trait]
pub trait Binder: Send + Sync {
    /// The kind of binding this adapter creates.
    fn kind(&self) -> BindingKind;

    /// Whether bindings created by this adapter must be removed on process
    /// exit. Decided here, at bind time, not by global conditionals.
    fn temporary(&self) -> bool;

    /// Bind `target` to `source`. Idempotent: if the target is already
    /// correctly bound, returns `Ok` without side effects. If the target is
    /// occupied by anything else (another binding or a real filesystem
    /// entry), returns `BindError::Conflict` and leaves it untouched.
    async fn bind(&self, source: &Path, target: &Path) -> Result<BindingKind, BindError>;

    /// Remove the binding at `target`. Refuses to remove anything that is
    /// not a binding of this adapter's kind (ownership itself is verified by
    /// the caller against its records). Unbinding a non-existent target is a
    /// no-op success.
    async fn unbind(&self, target: &Path) -> Result<(), BindError>;

    /// Compare the live state at `target` against `expected_source`.
    async fn is_bound(&self, target: &Path, expected_source: &Path) -> Drift;
}
