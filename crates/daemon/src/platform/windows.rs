//! Windows adapter: drive-letter substitutions via `subst`, process checks
//! via `tasklist`, mount-root discovery by scanning drive roots for a
//! localized shared-drives folder.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use common::{BindError, Binder, BindingKind, Drift, Locator, Platform, Settings};

use super::{exe_path, shared_drives_folder};

pub(crate) const CLIENT_EXE: &str = "GoogleDriveFS.exe";

pub(crate) const DEFAULT_INSTALL_GLOBS: &[&str] = &[
    r"C:\Program Files\Google\Drive File Stream\*\GoogleDriveFS.exe",
    r"C:\Program Files (x86)\Google\Drive File Stream\*\GoogleDriveFS.exe",
];

/// Resolve the client executable: configured override first (a directory
/// override gets the exe name appended), then the default install globs.
pub(crate) fn installed_executable(client_override: Option<&str>) -> Option<PathBuf> {
    if let Some(raw) = client_override {
        if let Some(path) = exe_path::resolve_install_path(raw) {
            return Some(if path.is_dir() {
                path.join(CLIENT_EXE)
            } else {
                path
            });
        }
    }
    DEFAULT_INSTALL_GLOBS
        .iter()
        .find_map(|glob| exe_path::resolve_install_path(glob))
}

/// Uppercase drive letter from a target like `P:`, `p:\`, or `P`.
fn drive_letter(target: &Path) -> Option<char> {
    let raw = target.to_string_lossy();
    // Accepts `P`, `P:`, `p:\`, and the `P:\:` form subst prints.
    let raw = raw.trim().trim_end_matches([':', '/', '\\']);
    let mut chars = raw.chars();
    let letter = chars.next()?;
    (chars.next().is_none() && letter.is_ascii_alphabetic())
        .then(|| letter.to_ascii_uppercase())
}

/// Parse `subst` listing lines of the form `P:\: => C:\some\path`.
fn parse_subst_output(raw: &str) -> Vec<(char, PathBuf)> {
    raw.lines()
        .filter_map(|line| {
            let (lhs, rhs) = line.split_once("=>")?;
            let letter = drive_letter(Path::new(lhs.trim()))?;
            Some((letter, PathBuf::from(rhs.trim())))
        })
        .collect()
}

async fn subst_table() -> Result<Vec<(char, PathBuf)>, BindError> {
    let output = Command::new("subst")
        .output()
        .await
        .map_err(|e| BindError::Unknown(format!("subst listing failed: {e}")))?;
    Ok(parse_subst_output(&String::from_utf8_lossy(&output.stdout)))
}

fn drive_root(letter: char) -> PathBuf {
    PathBuf::from(format!("{letter}:\\"))
}

pub struct SubstBinder;

#[async_trait]
impl Binder for SubstBinder {
    fn kind(&self) -> BindingKind {
        BindingKind::Substitution
    }

    // Substitutions never survive a reboot; always cleaned up on exit.
    fn temporary(&self) -> bool {
        true
    }

    async fn bind(&self, source: &Path, target: &Path) -> Result<BindingKind, BindError> {
        let letter = drive_letter(target).ok_or_else(|| {
            BindError::Unknown(format!("target {} is not a drive letter", target.display()))
        })?;
        if !source.exists() {
            return Err(BindError::SourceMissing(source.to_path_buf()));
        }

        if let Some((_, dest)) = subst_table().await?.iter().find(|(l, _)| *l == letter) {
            if dest == source {
                return Ok(BindingKind::Substitution);
            }
            return Err(BindError::Conflict(format!(
                "substitution to {}",
                dest.display()
            )));
        }
        // A real volume (or a mapping created elsewhere) owns the letter.
        if drive_root(letter).exists() {
            return Err(BindError::Conflict(format!("drive {letter}: is in use")));
        }

        let output = Command::new("subst")
            .arg(format!("{letter}:"))
            .arg(source)
            .output()
            .await
            .map_err(|e| BindError::Unknown(format!("subst spawn failed: {e}")))?;
        if output.status.success() {
            return Ok(BindingKind::Substitution);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.to_ascii_lowercase().contains("denied") {
            return Err(BindError::PermissionDenied(stderr));
        }
        Err(BindError::Unknown(format!("subst {letter}: failed: {stderr}")))
    }

    async fn unbind(&self, target: &Path) -> Result<(), BindError> {
        let Some(letter) = drive_letter(target) else {
            return Ok(());
        };
        if !subst_table().await?.iter().any(|(l, _)| *l == letter) {
            // Only substitutions are ours to remove.
            if drive_root(letter).exists() {
                return Err(BindError::Conflict(format!(
                    "drive {letter}: is not a substitution"
                )));
            }
            return Ok(());
        }
        let output = Command::new("subst")
            .arg("/D")
            .arg(format!("{letter}:"))
            .output()
            .await
            .map_err(|e| BindError::Unknown(format!("subst spawn failed: {e}")))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.to_ascii_lowercase().contains("denied") {
            return Err(BindError::PermissionDenied(stderr));
        }
        Err(BindError::Unknown(format!(
            "subst /D {letter}: failed: {stderr}"
        )))
    }

    async fn is_bound(&self, target: &Path, expected_source: &Path) -> Drift {
        let Some(letter) = drive_letter(target) else {
            return Drift::Unreachable(format!(
                "target {} is not a drive letter",
                target.display()
            ));
        };
        let table = match subst_table().await {
            Ok(table) => table,
            Err(err) => return Drift::Unreachable(err.to_string()),
        };
        if let Some((_, dest)) = table.iter().find(|(l, _)| *l == letter) {
            if dest == expected_source {
                return Drift::Correct;
            }
            return Drift::Stale(dest.clone());
        }
        if drive_root(letter).exists() {
            // Real volume on the letter; treated as a foreign occupant.
            return Drift::Stale(drive_root(letter));
        }
        Drift::Missing
    }
}

pub struct WindowsLocator {
    client_override: Option<String>,
    desired_mount: Option<String>,
    shared_names: Vec<String>,
}

impl WindowsLocator {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client_override: settings
                .client_path
                .for_platform(Platform::Windows)
                .map(str::to_string),
            desired_mount: settings
                .desired_mount
                .for_platform(Platform::Windows)
                .map(str::to_string),
            shared_names: settings.shared_drive_names(),
        }
    }
}

#[async_trait]
impl Locator for WindowsLocator {
    async fn detect_installed(&self) -> bool {
        installed_executable(self.client_override.as_deref()).is_some()
    }

    async fn detect_running(&self) -> bool {
        let filter = format!("IMAGENAME eq {CLIENT_EXE}");
        let output = Command::new("tasklist")
            .args(["/FI", filter.as_str(), "/NH"])
            .output()
            .await;
        match output {
            Ok(out) => String::from_utf8_lossy(&out.stdout).contains(CLIENT_EXE),
            Err(_) => false,
        }
    }

    async fn detect_mount_root(&self) -> Option<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(desired) = &self.desired_mount {
            if let Some(letter) = drive_letter(Path::new(desired)) {
                candidates.push(drive_root(letter));
            }
        }
        candidates.extend(('D'..='Z').map(drive_root));
        candidates
            .into_iter()
            .find(|root| shared_drives_folder(root, &self.shared_names).is_some())
    }
}
