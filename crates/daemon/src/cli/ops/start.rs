use clap::Args;

use common::ConfigError;

use crate::cli::op::{Op, OpContext};
use crate::client::{self, StartOutcome};
use crate::platform;

/// Launch the cloud client if it is installed and not already running.
#[derive(Args, Debug, Clone)]
pub struct Start;

#[derive(Debug, thiserror::Error)]
pub enum StartOpError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Start(#[from] client::StartError),
}

#[async_trait::async_trait]
impl Op for Start {
    type Error = StartOpError;
    type Output = StartOutcome;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let settings = ctx.settings()?;
        let locator = platform::locator(&settings);
        Ok(client::start_client(&settings, locator.as_ref()).await?)
    }
}
