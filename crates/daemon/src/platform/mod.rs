//! Per-OS adapters behind the `Binder` and `Locator` seams. The switch
//! happens once, here, at startup; everything above it is platform-agnostic.

mod exe_path;
#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(unix)]
pub(crate) mod symlink;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
compile_error!("drivemap supports Windows, macOS, and Linux targets");

use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{Binder, Locator, Platform, Settings};

pub use exe_path::resolve_install_path;

/// Locate the cloud client executable for the compile target: configured
/// override first (resolving any `*` version segment), then the platform's
/// default install locations.
pub async fn client_executable(settings: &Settings) -> Option<PathBuf> {
    let configured = settings.client_path.for_platform(Platform::current());
    #[cfg(target_os = "windows")]
    {
        windows::installed_executable(configured)
    }
    #[cfg(target_os = "macos")]
    {
        if let Some(path) = configured.and_then(resolve_install_path) {
            return Some(path);
        }
        macos::APP_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }
    #[cfg(target_os = "linux")]
    {
        if let Some(path) = configured.and_then(resolve_install_path) {
            return Some(path);
        }
        for binary in linux::CLIENT_BINARIES {
            if let Some(path) = linux::which(binary).await {
                return Some(path);
            }
        }
        None
    }
}

/// The binder for the compile target.
pub fn binder(settings: &Settings) -> Arc<dyn Binder> {
    #[cfg(target_os = "windows")]
    {
        let _ = settings;
        Arc::new(windows::SubstBinder)
    }
    #[cfg(target_os = "macos")]
    {
        if settings.keep_symlinks_on_exit {
            Arc::new(symlink::SymlinkBinder::persistent())
        } else {
            Arc::new(symlink::SymlinkBinder::removed_on_exit())
        }
    }
    #[cfg(target_os = "linux")]
    {
        let _ = settings;
        Arc::new(symlink::SymlinkBinder::persistent())
    }
}

/// The mount locator for the compile target.
pub fn locator(settings: &Settings) -> Arc<dyn Locator> {
    #[cfg(target_os = "windows")]
    {
        Arc::new(windows::WindowsLocator::new(settings))
    }
    #[cfg(target_os = "macos")]
    {
        Arc::new(macos::MacLocator::new(settings))
    }
    #[cfg(target_os = "linux")]
    {
        Arc::new(linux::LinuxLocator::new(settings))
    }
}

/// The localized shared-drives folder under a candidate mount root, if any.
pub(crate) fn shared_drives_folder(root: &Path, names: &[String]) -> Option<PathBuf> {
    names.iter().map(|name| root.join(name)).find(|p| p.is_dir())
}

/// Names of the shared drives visible under the mount root, sorted. Hidden
/// entries and the Windows `System Volume Information` folder are skipped.
pub async fn list_shared_drives(root: &Path, names: &[String]) -> Vec<String> {
    let Some(folder) = shared_drives_folder(root, names) else {
        return Vec::new();
    };
    let mut drives = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(&folder).await else {
        return Vec::new();
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || name == "System Volume Information" {
            continue;
        }
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            drives.push(name);
        }
    }
    drives.sort();
    drives
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_drives_under_localized_folder() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("Geteilte Ablagen");
        std::fs::create_dir(&folder).unwrap();
        for name in ["Projects", "Renders", ".hidden", "System Volume Information"] {
            std::fs::create_dir(folder.join(name)).unwrap();
        }
        std::fs::write(folder.join("stray-file"), b"").unwrap();

        let names = vec!["Shared drives".to_string(), "Geteilte Ablagen".to_string()];
        let drives = list_shared_drives(dir.path(), &names).await;
        assert_eq!(drives, vec!["Projects".to_string(), "Renders".to_string()]);
    }

    #[tokio::test]
    async fn no_shared_folder_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let names = vec!["Shared drives".to_string()];
        assert!(list_shared_drives(dir.path(), &names).await.is_empty());
    }
}
