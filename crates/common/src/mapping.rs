//! Mapping data model: what the user wants bound, and what this process
//! currently believes it owns.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::platform::Platform;

/// A configured drive mapping: a friendly name bound to a folder inside the
/// cloud client's mount, with one target path per platform.
///
/// Immutable once loaded for a reconciliation pass; owned by configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredMapping {
    /// Unique key across the mapping set.
    pub name: String,
    /// Path relative to the cloud mount root, e.g. `Shared drives/Projects`.
    pub source_path: String,
    /// Windows target, a drive letter like `P:`.
    #[serde(default)]
    pub windows_target: Option<String>,
    /// macOS target path, e.g. `/Volumes/Projects`.
    #[serde(default)]
    pub macos_target: Option<String>,
    /// Linux target path, e.g. `/mnt/projects`.
    #[serde(default)]
    pub linux_target: Option<String>,
}

impl DesiredMapping {
    /// Target path for the given platform, if one is configured.
    pub fn target_for(&self, platform: Platform) -> Option<PathBuf> {
        let raw = match platform {
            Platform::Windows => self.windows_target.as_deref(),
            Platform::MacOs => self.macos_target.as_deref(),
            Platform::Linux => self.linux_target.as_deref(),
        }?;
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(PathBuf::from(raw))
    }

    /// Absolute source path under the given mount root. The configured
    /// source is stored with forward slashes; joining through `Path`
    /// components keeps it valid on every platform.
    pub fn source_under(&self, mount_root: &Path) -> PathBuf {
        let relative = self.source_path.replace('\\', "/");
        let mut path = mount_root.to_path_buf();
        for part in relative.split('/').filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path
    }
}

/// How a binding is realized on the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    /// Windows drive-letter substitution (`subst`).
    Substitution,
    /// Filesystem symbolic link (macOS, Linux).
    Symlink,
    /// A FUSE-backed mount managed by a third-party client.
    FuseMount,
}

impl BindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingKind::Substitution => "substitution",
            BindingKind::Symlink => "symlink",
            BindingKind::FuseMount => "fuse-mount",
        }
    }
}

impl std::fmt::Display for BindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The authoritative record of a binding this process created (or adopted).
///
/// At most one record exists per mapping name; creating a replacement retires
/// the old record first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingRecord {
    pub mapping_name: String,
    /// The platform target the binding lives at.
    pub target: PathBuf,
    /// The source the binding pointed at when created.
    pub source: PathBuf,
    pub kind: BindingKind,
    pub created_at: DateTime<Utc>,
    /// Whether the binding must be torn down when this process exits.
    pub temporary: bool,
}

impl BindingRecord {
    pub fn new(
        mapping_name: impl Into<String>,
        target: impl Into<PathBuf>,
        source: impl Into<PathBuf>,
        kind: BindingKind,
        temporary: bool,
    ) -> Self {
        Self {
            mapping_name: mapping_name.into(),
            target: target.into(),
            source: source.into(),
            kind,
            created_at: Utc::now(),
            temporary,
        }
    }
}

/// Shared table of live binding records, keyed by mapping name.
///
/// Cloneable handle; the reconciler writes it, the lifecycle guard reads it
/// at shutdown. Entries are inserted and removed wholesale, never mutated in
/// place.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    inner: Arc<Mutex<HashMap<String, BindingRecord>>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, retiring any previous record for the same mapping.
    pub fn insert(&self, record: BindingRecord) -> Option<BindingRecord> {
        self.inner
            .lock()
            .insert(record.mapping_name.clone(), record)
    }

    /// Retire the record for a mapping, returning it if present.
    pub fn retire(&self, mapping_name: &str) -> Option<BindingRecord> {
        self.inner.lock().remove(mapping_name)
    }

    pub fn get(&self, mapping_name: &str) -> Option<BindingRecord> {
        self.inner.lock().get(mapping_name).cloned()
    }

    pub fn contains(&self, mapping_name: &str) -> bool {
        self.inner.lock().contains_key(mapping_name)
    }

    /// Snapshot of all current records.
    pub fn all(&self) -> Vec<BindingRecord> {
        self.inner.lock().values().cloned().collect()
    }

    /// Snapshot of records that must be removed on process exit.
    pub fn temporary(&self) -> Vec<BindingRecord> {
        self.inner
            .lock()
            .values()
            .filter(|r| r.temporary)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
