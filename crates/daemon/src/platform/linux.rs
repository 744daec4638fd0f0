//! Linux adapter. There is no official Linux client, so detection covers
//! the FUSE-based community clients (google-drive-ocamlfuse, rclone) plus
//! whatever the config points at.

use std::path::PathBuf;

use async_trait::async_trait;

use common::{Locator, Platform, Settings};

use super::{exe_path, shared_drives_folder};

/// Binaries probed on PATH, in preference order.
pub(crate) const CLIENT_BINARIES: &[&str] = &["google-drive-ocamlfuse", "rclone"];

/// Process patterns matched against `pgrep -f`.
const PROCESS_PATTERNS: &[&str] = &["google-drive-ocamlfuse", "rclone mount"];

pub struct LinuxLocator {
    client_override: Option<String>,
    desired_mount: Option<String>,
    shared_names: Vec<String>,
}

impl LinuxLocator {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client_override: settings
                .client_path
                .for_platform(Platform::Linux)
                .map(str::to_string),
            desired_mount: settings
                .desired_mount
                .for_platform(Platform::Linux)
                .map(str::to_string),
            shared_names: settings.shared_drive_names(),
        }
    }

    fn candidate_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        if let Some(desired) = &self.desired_mount {
            roots.push(PathBuf::from(desired));
        }
        if let Some(home) = dirs::home_dir() {
            roots.push(home.join("google-drive"));
            roots.push(home.join("GoogleDrive"));
        }
        roots.push(PathBuf::from("/mnt/google_drive"));
        roots
    }
}

pub(crate) async fn which(binary: &str) -> Option<PathBuf> {
    let output = tokio::process::Command::new("which")
        .arg(binary)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!path.is_empty()).then(|| PathBuf::from(path))
}

async fn pgrep(pattern: &str) -> bool {
    tokio::process::Command::new("pgrep")
        .arg("-f")
        .arg(pattern)
        .output()
        .await
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// FUSE mount points from a `/proc/mounts` dump. Octal-escaped spaces in
/// mount paths are decoded.
fn fuse_mount_points(proc_mounts: &str) -> Vec<PathBuf> {
    proc_mounts
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _device = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            fs_type
                .starts_with("fuse")
                .then(|| PathBuf::from(mount_point.replace("\\040", " ")))
        })
        .collect()
}

#[async_trait]
impl Locator for LinuxLocator {
    async fn detect_installed(&self) -> bool {
        if let Some(raw) = &self.client_override {
            if exe_path::resolve_install_path(raw).is_some() {
                return true;
            }
        }
        for binary in CLIENT_BINARIES {
            if which(binary).await.is_some() {
                return true;
            }
        }
        false
    }

    async fn detect_running(&self) -> bool {
        for pattern in PROCESS_PATTERNS {
            if pgrep(pattern).await {
                return true;
            }
        }
        false
    }

    async fn detect_mount_root(&self) -> Option<PathBuf> {
        let mut candidates = self.candidate_roots();
        if let Ok(proc_mounts) = tokio::fs::read_to_string("/proc/mounts").await {
            candidates.extend(fuse_mount_points(&proc_mounts));
        }
        candidates
            .into_iter()
            .find(|root| shared_drives_folder(root, &self.shared_names).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fuse_mounts_from_proc() {
        let proc_mounts = "\
/dev/sda1 / ext4 rw,relatime 0 0
gdfuse#default /home/user/google-drive fuse.google-drive-ocamlfuse rw,nosuid 0 0
drive: /home/user/My\\040Drive fuse.rclone rw,nosuid,nodev 0 0
tmpfs /run tmpfs rw 0 0
";
        let points = fuse_mount_points(proc_mounts);
        assert_eq!(
            points,
            vec![
                PathBuf::from("/home/user/google-drive"),
                PathBuf::from("/home/user/My Drive"),
            ]
        );
    }
}
