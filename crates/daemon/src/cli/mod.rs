pub mod op;
pub mod ops;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use op::{Op, OpContext};

#[derive(Parser, Debug)]
#[command(name = "drivemap", version, about = "Shared-drive mapping daemon")]
pub struct Cli {
    /// Path to the config file (default: <config dir>/drivemap/config.toml)
    #[arg(long, global = true, env = "DRIVEMAP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the monitor loop until interrupted
    Daemon(ops::Daemon),
    /// Probe the client and show per-mapping drift
    Status(ops::Status),
    /// Run a single reconciliation pass
    Reconcile(ops::Reconcile),
    /// List shared drives under the detected mount root
    Drives(ops::Drives),
    /// Start the cloud client
    Start(ops::Start),
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let ctx = OpContext {
            config_path: self.config,
        };
        match self.command {
            Command::Daemon(op) => dispatch(op, &ctx).await,
            Command::Status(op) => dispatch(op, &ctx).await,
            Command::Reconcile(op) => dispatch(op, &ctx).await,
            Command::Drives(op) => dispatch(op, &ctx).await,
            Command::Start(op) => dispatch(op, &ctx).await,
        }
    }
}

async fn dispatch<O: Op>(op: O, ctx: &OpContext) -> anyhow::Result<()> {
    let output = op.execute(ctx).await?;
    println!("{output}");
    Ok(())
}
