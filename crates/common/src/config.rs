//! Configuration snapshot consumed by the core.
//!
//! Loaded in full from a TOML file and treated as read-only; a configuration
//! change is a full reload, never a partial hot-patch of a single mapping.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::mapping::DesiredMapping;
use crate::platform::Platform;

/// Default localized names of the client's shared-drives folder. Drive for
/// Desktop localizes this folder after the OS locale, so mount probing has
/// to try every configured variant.
pub const DEFAULT_SHARED_DRIVE_NAMES: &[&str] = &[
    "Shared drives",
    "Shared Drives",
    "Drive partagés",
    "Drive partagé",
    "Disques partagés",
    "Geteilte Ablagen",
    "Drive condivisi",
    "Unidades compartidas",
    "Drives compartilhados",
    "共享云端硬盘",
    "共用雲端硬碟",
    "共有ドライブ",
    "공유 드라이브",
    "Gedeelde drives",
    "Общие диски",
    "Dyski udostępnione",
    "Delade enheter",
    "Delte drev",
    "Delte enheter",
];

const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_OP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("mapping {index} has an empty name")]
    EmptyName { index: usize },

    #[error("mapping '{name}' has an empty source path")]
    EmptySource { name: String },

    #[error("duplicate mapping name '{name}'")]
    DuplicateName { name: String },

    #[error("mappings '{first}' and '{second}' resolve to the same {platform} target '{target}'")]
    DuplicateTarget {
        first: String,
        second: String,
        platform: Platform,
        target: String,
    },
}

/// Per-platform path override table, used for both the client install
/// location and the desired mount point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformPaths {
    #[serde(default)]
    pub windows: Option<String>,
    #[serde(default)]
    pub macos: Option<String>,
    #[serde(default)]
    pub linux: Option<String>,
}

impl PlatformPaths {
    pub fn for_platform(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Windows => self.windows.as_deref(),
            Platform::MacOs => self.macos.as_deref(),
            Platform::Linux => self.linux.as_deref(),
        }
    }
}

/// Full configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between status polls.
    pub poll_interval_secs: u64,
    /// Deadline for a single OS bind/unbind/probe call.
    pub op_timeout_secs: u64,
    /// Start the cloud client on daemon startup when it is installed but
    /// not running.
    pub auto_start_client: bool,
    /// Warn when the client is mounted somewhere other than `desired_mount`.
    pub show_mount_mismatch_notifications: bool,
    /// macOS only: leave symlinks in place on exit instead of removing them.
    pub keep_symlinks_on_exit: bool,
    /// Install-location override per platform (Windows may contain a `*`
    /// version segment).
    pub client_path: PlatformPaths,
    /// Preferred mount point per platform; informational, the detected root
    /// always wins for binding resolution.
    pub desired_mount: PlatformPaths,
    /// Localized candidates for the shared-drives folder name.
    pub shared_drive_names: Vec<String>,
    pub mappings: Vec<DesiredMapping>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            op_timeout_secs: DEFAULT_OP_TIMEOUT_SECS,
            auto_start_client: true,
            show_mount_mismatch_notifications: false,
            keep_symlinks_on_exit: true,
            client_path: PlatformPaths::default(),
            desired_mount: PlatformPaths::default(),
            shared_drive_names: DEFAULT_SHARED_DRIVE_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            mappings: Vec::new(),
        }
    }
}

impl Settings {
    /// Default config file location: `<config dir>/drivemap/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("drivemap").join("config.toml"))
    }

    /// Load and validate a configuration file. A missing file yields the
    /// defaults (no mappings), matching a fresh install.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let settings = Settings::default();
            settings.validate()?;
            return Ok(settings);
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations the core would otherwise have to arbitrate at
    /// runtime: duplicate names and two mappings claiming the same target.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for (index, mapping) in self.mappings.iter().enumerate() {
            if mapping.name.trim().is_empty() {
                return Err(ConfigError::EmptyName { index });
            }
            if mapping.source_path.trim().is_empty() {
                return Err(ConfigError::EmptySource {
                    name: mapping.name.clone(),
                });
            }
            if !names.insert(mapping.name.clone()) {
                return Err(ConfigError::DuplicateName {
                    name: mapping.name.clone(),
                });
            }
        }

        for platform in [Platform::Windows, Platform::MacOs, Platform::Linux] {
            let mut targets: Vec<(&str, String)> = Vec::new();
            for mapping in &self.mappings {
                let Some(target) = mapping.target_for(platform) else {
                    continue;
                };
                let normalized = normalize_target(&target.to_string_lossy());
                if let Some((first, _)) = targets.iter().find(|(_, t)| *t == normalized) {
                    return Err(ConfigError::DuplicateTarget {
                        first: first.to_string(),
                        second: mapping.name.clone(),
                        platform,
                        target: target.to_string_lossy().into_owned(),
                    });
                }
                targets.push((&mapping.name, normalized));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn op_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.op_timeout_secs.max(1))
    }

    /// Shared-drive folder name candidates, falling back to the built-in
    /// list when the configured one is empty.
    pub fn shared_drive_names(&self) -> Vec<String> {
        if self.shared_drive_names.is_empty() {
            DEFAULT_SHARED_DRIVE_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            self.shared_drive_names.clone()
        }
    }
}

/// Targets compare case-insensitively on the drive-letter form and with
/// trailing separators stripped, so `P:`, `p:` and `P:\` collide.
fn normalize_target(target: &str) -> String {
    target
        .trim()
        .trim_end_matches(['/', '\\'])
        .to_ascii_lowercase()
}
