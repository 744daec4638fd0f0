//! Symlink binder shared by the macOS and Linux adapters. The two platforms
//! differ only in persistence: macOS links are removed on exit unless
//! `keep_symlinks_on_exit` is set, Linux links persist by default.

use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;

use common::{BindError, Binder, BindingKind, Drift};

pub struct SymlinkBinder {
    temporary: bool,
}

impl SymlinkBinder {
    pub fn persistent() -> Self {
        Self { temporary: false }
    }

    pub fn removed_on_exit() -> Self {
        Self { temporary: true }
    }
}

fn io_bind_error(err: std::io::Error, what: &Path) -> BindError {
    match err.kind() {
        ErrorKind::PermissionDenied => BindError::PermissionDenied(what.display().to_string()),
        _ => BindError::Unknown(format!("{}: {err}", what.display())),
    }
}

#[async_trait]
impl Binder for SymlinkBinder {
    fn kind(&self) -> BindingKind {
        BindingKind::Symlink
    }

    fn temporary(&self) -> bool {
        self.temporary
    }

    async fn bind(&self, source: &Path, target: &Path) -> Result<BindingKind, BindError> {
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(BindError::SourceMissing(source.to_path_buf()));
        }
        match tokio::fs::symlink_metadata(target).await {
            Ok(meta) if meta.file_type().is_symlink() => {
                let dest = tokio::fs::read_link(target)
                    .await
                    .map_err(|e| io_bind_error(e, target))?;
                if dest == source {
                    return Ok(BindingKind::Symlink);
                }
                return Err(BindError::Conflict(format!(
                    "symlink to {}",
                    dest.display()
                )));
            }
            Ok(_) => {
                return Err(BindError::Conflict(format!(
                    "existing entry at {}",
                    target.display()
                )));
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(io_bind_error(err, target)),
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_bind_error(e, parent))?;
        }
        tokio::fs::symlink(source, target)
            .await
            .map_err(|e| io_bind_error(e, target))?;
        Ok(BindingKind::Symlink)
    }

    async fn unbind(&self, target: &Path) -> Result<(), BindError> {
        match tokio::fs::symlink_metadata(target).await {
            Ok(meta) if meta.file_type().is_symlink() => tokio::fs::remove_file(target)
                .await
                .map_err(|e| io_bind_error(e, target)),
            // Only symlinks are ours to remove.
            Ok(_) => Err(BindError::Conflict(format!(
                "refusing to remove non-symlink {}",
                target.display()
            ))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_bind_error(err, target)),
        }
    }

    async fn is_bound(&self, target: &Path, expected_source: &Path) -> Drift {
        match tokio::fs::symlink_metadata(target).await {
            Ok(meta) if meta.file_type().is_symlink() => {
                match tokio::fs::read_link(target).await {
                    Ok(dest) if dest == expected_source => Drift::Correct,
                    Ok(dest) => Drift::Stale(dest),
                    Err(err) => Drift::Unreachable(err.to_string()),
                }
            }
            // A real file or directory occupies the target.
            Ok(_) => Drift::Stale(target.to_path_buf()),
            Err(err) if err.kind() == ErrorKind::NotFound => Drift::Missing,
            Err(err) => Drift::Unreachable(err.to_string()),
        }
    }
}
