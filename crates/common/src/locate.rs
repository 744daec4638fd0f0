//! The seam the per-platform mount locators implement.

use std::path::PathBuf;

use async_trait::async_trait;

/// Answers, for the current OS: is the cloud client installed, is it
/// running, and where is its mount root. Each is answered independently,
/// because
/// installed ≠ running ≠ mounted.
///
/// Pure observation: implementations must not create or remove anything,
/// and every check degrades to a conservative "not ready" answer instead of
/// returning an error. A transient process-enumeration failure reports
/// `running = false`; callers treat absent information as "do not bind yet".
#[async_trait]
pub trait Locator: Send + Sync {
    /// Whether the client binary is present at a well-known or configured
    /// install location. Returns `false` on any lookup failure.
    async fn detect_installed(&self) -> bool;

    /// Whether the client process is currently running.
    async fn detect_running(&self) -> bool;

    /// The client's current mount root, probing localized shared-drive
    /// folder names where the platform needs it. `None` when not mounted or
    /// not determinable.
    async fn detect_mount_root(&self) -> Option<PathBuf>;
}
