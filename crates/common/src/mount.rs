//! Live state of the cloud client, as observed on the last poll.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::locate::Locator;

/// Snapshot of the cloud client's state. Produced by a `Locator` probe and
/// replaced wholesale each tick, never patched field by field, so readers
/// can't observe a torn update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountState {
    pub installed: bool,
    pub running: bool,
    /// Where the client currently exposes its synchronized tree, if found.
    pub mount_root: Option<PathBuf>,
    pub last_seen_at: DateTime<Utc>,
}

impl MountState {
    /// State used before the first probe completes.
    pub fn unknown() -> Self {
        Self {
            installed: false,
            running: false,
            mount_root: None,
            last_seen_at: Utc::now(),
        }
    }

    /// Whether binding attempts make sense right now.
    pub fn ready(&self) -> bool {
        self.mount_root.is_some()
    }

    /// Observable difference ignoring the timestamp; used to decide whether
    /// a status-changed event should fire.
    pub fn same_observation(&self, other: &MountState) -> bool {
        self.installed == other.installed
            && self.running == other.running
            && self.mount_root == other.mount_root
    }
}

/// Run all three locator checks and assemble a fresh snapshot.
///
/// Each check degrades to "not ready" on its own; a failed mount-root probe
/// yields `mount_root: None` rather than an error.
pub async fn probe(locator: &dyn Locator) -> MountState {
    let installed = locator.detect_installed().await;
    let running = locator.detect_running().await;
    let mount_root = locator.detect_mount_root().await;
    MountState {
        installed,
        running,
        mount_root,
        last_seen_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_ignores_timestamp() {
        let a = MountState {
            installed: true,
            running: true,
            mount_root: Some(PathBuf::from("/mnt/gd")),
            last_seen_at: Utc::now(),
        };
        let mut b = a.clone();
        b.last_seen_at = Utc::now();
        assert!(a.same_observation(&b));
        b.running = false;
        assert!(!a.same_observation(&b));
    }

    #[test]
    fn ready_requires_mount_root() {
        let mut state = MountState::unknown();
        state.installed = true;
        state.running = true;
        assert!(!state.ready());
        state.mount_root = Some(PathBuf::from("/mnt/gd"));
        assert!(state.ready());
    }
}
