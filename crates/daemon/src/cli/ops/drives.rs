use std::fmt;
use std::path::PathBuf;

use clap::Args;
use owo_colors::OwoColorize;

use common::ConfigError;

use crate::cli::op::{Op, OpContext};
use crate::platform;

/// List the shared drives visible under the detected mount root.
#[derive(Args, Debug, Clone)]
pub struct Drives;

#[derive(Debug)]
pub struct DrivesOutput {
    pub root: Option<PathBuf>,
    pub drives: Vec<String>,
}

impl fmt::Display for DrivesOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(root) = &self.root else {
            return write!(f, "{}", "Client is not mounted.".red());
        };
        writeln!(f, "{} ({})", "Shared drives".bold(), root.display())?;
        if self.drives.is_empty() {
            return write!(f, "  (none visible)");
        }
        for (i, drive) in self.drives.iter().enumerate() {
            if i + 1 == self.drives.len() {
                write!(f, "  - {drive}")?;
            } else {
                writeln!(f, "  - {drive}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DrivesError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

#[async_trait::async_trait]
impl Op for Drives {
    type Error = DrivesError;
    type Output = DrivesOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let settings = ctx.settings()?;
        let locator = platform::locator(&settings);

        let Some(root) = locator.detect_mount_root().await else {
            return Ok(DrivesOutput {
                root: None,
                drives: Vec::new(),
            });
        };
        let drives = platform::list_shared_drives(&root, &settings.shared_drive_names()).await;
        Ok(DrivesOutput {
            root: Some(root),
            drives,
        })
    }
}
