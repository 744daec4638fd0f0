//! macOS adapter. Newer clients mount under `~/Library/CloudStorage/
//! GoogleDrive-<account>`, older ones under `/Volumes`.

use std::path::PathBuf;

use async_trait::async_trait;

use common::{Locator, Platform, Settings};

use super::{exe_path, shared_drives_folder};

pub(crate) const APP_PATHS: &[&str] = &[
    "/Applications/Google Drive.app",
    "/Applications/Google Drive File Stream.app",
];

pub struct MacLocator {
    client_override: Option<String>,
    desired_mount: Option<String>,
    shared_names: Vec<String>,
}

impl MacLocator {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client_override: settings
                .client_path
                .for_platform(Platform::MacOs)
                .map(str::to_string),
            desired_mount: settings
                .desired_mount
                .for_platform(Platform::MacOs)
                .map(str::to_string),
            shared_names: settings.shared_drive_names(),
        }
    }

    async fn candidate_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        if let Some(desired) = &self.desired_mount {
            roots.push(PathBuf::from(desired));
        }
        if let Some(home) = dirs::home_dir() {
            let cloud_storage = home.join("Library").join("CloudStorage");
            if let Ok(mut entries) = tokio::fs::read_dir(&cloud_storage).await {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    if entry
                        .file_name()
                        .to_string_lossy()
                        .starts_with("GoogleDrive-")
                    {
                        roots.push(entry.path());
                    }
                }
            }
        }
        roots.push(PathBuf::from("/Volumes/GoogleDrive"));
        roots
    }
}

#[async_trait]
impl Locator for MacLocator {
    async fn detect_installed(&self) -> bool {
        if let Some(raw) = &self.client_override {
            if exe_path::resolve_install_path(raw).is_some() {
                return true;
            }
        }
        APP_PATHS
            .iter()
            .any(|app| std::path::Path::new(app).exists())
    }

    async fn detect_running(&self) -> bool {
        tokio::process::Command::new("pgrep")
            .arg("-f")
            .arg("Google Drive")
            .output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    async fn detect_mount_root(&self) -> Option<PathBuf> {
        self.candidate_roots()
            .await
            .into_iter()
            .find(|root| shared_drives_folder(root, &self.shared_names).is_some())
    }
}
