use std::fmt;

use clap::Args;
use owo_colors::OwoColorize;

use common::{ConfigError, Platform, ReconcileReport, RecordStore, Reconciler};

use crate::cli::op::{Op, OpContext};
use crate::platform;

/// Run a single reconciliation pass and report what changed.
#[derive(Args, Debug, Clone)]
pub struct Reconcile;

#[derive(Debug)]
pub struct ReconcileOutput {
    pub report: ReconcileReport,
}

impl fmt::Display for ReconcileOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.report.converged() {
            writeln!(f, "{}", "Already converged; no changes made.".green())?;
        } else {
            writeln!(
                f,
                "Applied changes: {} bound, {} removed.",
                self.report.bound.green(),
                self.report.unbound.yellow()
            )?;
        }
        if self.report.statuses.is_empty() {
            return write!(f, "No mappings configured.");
        }
        write!(f, "{}", super::status_table(&self.report.statuses))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

#[async_trait::async_trait]
impl Op for Reconcile {
    type Error = ReconcileError;
    type Output = ReconcileOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let settings = ctx.settings()?;
        let locator = platform::locator(&settings);
        let binder = platform::binder(&settings);

        let mount = super::probe_mount(&settings, locator.as_ref()).await;
        let mut reconciler = Reconciler::new(
            Platform::current(),
            RecordStore::new(),
            settings.op_timeout(),
        );
        let report = reconciler
            .reconcile(&settings.mappings, &mount, binder.as_ref())
            .await;

        Ok(ReconcileOutput { report })
    }
}
