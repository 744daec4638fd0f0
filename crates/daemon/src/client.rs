//! Starting the cloud client process. Installation and updates stay
//! external; this only launches an already-installed client.

use std::path::{Path, PathBuf};

use common::{Locator, Settings};

use crate::platform;

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("cloud client executable not found")]
    NotInstalled,

    #[error("cannot start this client automatically: {0}")]
    Unsupported(String),

    #[error("failed to launch {path}: {source}")]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    AlreadyRunning,
    Launched(PathBuf),
}

impl std::fmt::Display for StartOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartOutcome::AlreadyRunning => write!(f, "client is already running"),
            StartOutcome::Launched(path) => write!(f, "launched {}", path.display()),
        }
    }
}

/// Start the cloud client if it is installed and not already running. The
/// spawned process is detached; mount readiness is observed by polling, not
/// by waiting on the child.
pub async fn start_client(
    settings: &Settings,
    locator: &dyn Locator,
) -> Result<StartOutcome, StartError> {
    if locator.detect_running().await {
        return Ok(StartOutcome::AlreadyRunning);
    }
    let exe = platform::client_executable(settings)
        .await
        .ok_or(StartError::NotInstalled)?;
    spawn(settings, &exe)?;
    tracing::info!(executable = %exe.display(), "cloud client launched");
    Ok(StartOutcome::Launched(exe))
}

fn spawn(settings: &Settings, exe: &Path) -> Result<(), StartError> {
    let mut command;
    #[cfg(target_os = "macos")]
    {
        let _ = settings;
        // .app bundles go through launch services.
        if exe.extension().map(|e| e == "app").unwrap_or(false) {
            command = tokio::process::Command::new("open");
            command.arg(exe);
        } else {
            command = tokio::process::Command::new(exe);
        }
    }
    #[cfg(target_os = "linux")]
    {
        let name = exe
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.contains("rclone") {
            return Err(StartError::Unsupported(
                "rclone mounts are configured and started externally".into(),
            ));
        }
        command = tokio::process::Command::new(exe);
        if name.contains("ocamlfuse") {
            // ocamlfuse takes its mount point as an argument.
            let mount = settings
                .desired_mount
                .for_platform(common::Platform::Linux)
                .map(PathBuf::from)
                .or_else(|| dirs::home_dir().map(|home| home.join("google-drive")))
                .ok_or_else(|| StartError::Unsupported("no mount point configured".into()))?;
            std::fs::create_dir_all(&mount).map_err(|source| StartError::Spawn {
                path: exe.to_path_buf(),
                source,
            })?;
            command.arg(mount);
        }
    }
    #[cfg(target_os = "windows")]
    {
        let _ = settings;
        command = tokio::process::Command::new(exe);
    }
    command.spawn().map_err(|source| StartError::Spawn {
        path: exe.to_path_buf(),
        source,
    })?;
    Ok(())
}
