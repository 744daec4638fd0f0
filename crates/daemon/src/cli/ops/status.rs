use std::fmt;

use clap::Args;
use owo_colors::OwoColorize;

use common::{ConfigError, Drift, MapState, MappingStatus, MountState, Platform};

use crate::cli::op::{Op, OpContext};
use crate::platform;

/// One-shot probe: client state plus per-mapping drift, read-only.
#[derive(Args, Debug, Clone)]
pub struct Status;

#[derive(Debug)]
pub struct StatusOutput {
    pub mount: MountState,
    pub statuses: Vec<MappingStatus>,
}

impl fmt::Display for StatusOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yes_no = |value: bool| -> String {
            if value {
                "yes".green().to_string()
            } else {
                "no".red().to_string()
            }
        };
        writeln!(f, "{}:", "Client".bold())?;
        writeln!(f, "  {} {}", "installed:".dimmed(), yes_no(self.mount.installed))?;
        writeln!(f, "  {} {}", "running:".dimmed(), yes_no(self.mount.running))?;
        match &self.mount.mount_root {
            Some(root) => writeln!(f, "  {} {}", "mount root:".dimmed(), root.display())?,
            None => writeln!(f, "  {} {}", "mount root:".dimmed(), "not mounted".red())?,
        }
        writeln!(f)?;
        if self.statuses.is_empty() {
            return write!(f, "No mappings configured.");
        }
        write!(f, "{}", super::status_table(&self.statuses))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

#[async_trait::async_trait]
impl Op for Status {
    type Error = StatusError;
    type Output = StatusOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let settings = ctx.settings()?;
        let locator = platform::locator(&settings);
        let binder = platform::binder(&settings);

        let mount = super::probe_mount(&settings, locator.as_ref()).await;

        let current = Platform::current();
        let mut statuses = Vec::with_capacity(settings.mappings.len());
        for mapping in &settings.mappings {
            let Some(target) = mapping.target_for(current) else {
                statuses.push(MappingStatus {
                    name: mapping.name.clone(),
                    target: None,
                    state: MapState::Blocked(common::BlockReason::Unsupported),
                    drift: None,
                });
                continue;
            };
            let Some(root) = mount.mount_root.as_deref() else {
                statuses.push(MappingStatus {
                    name: mapping.name.clone(),
                    target: Some(target),
                    state: MapState::Blocked(common::BlockReason::Unreachable),
                    drift: None,
                });
                continue;
            };
            let source = mapping.source_under(root);
            let drift = binder.is_bound(&target, &source).await;
            let state = match &drift {
                Drift::Correct => MapState::Bound,
                Drift::Missing => MapState::Unbound,
                Drift::Stale(_) => MapState::Drifted,
                Drift::Unreachable(_) => MapState::Blocked(common::BlockReason::Unreachable),
            };
            statuses.push(MappingStatus {
                name: mapping.name.clone(),
                target: Some(target),
                state,
                drift: Some(drift),
            });
        }

        Ok(StatusOutput { mount, statuses })
    }
}
