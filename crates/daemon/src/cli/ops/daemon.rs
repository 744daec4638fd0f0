use clap::Args;

use common::{ConfigError, RecordStore};

use crate::cli::op::{Op, OpContext};
use crate::guard::LifecycleGuard;
use crate::monitor::Monitor;
use crate::platform;

/// Run the monitor loop until interrupted, then clean up temporary bindings.
#[derive(Args, Debug, Clone)]
pub struct Daemon;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

/// Resolves on ctrl-c, and on Unix also on SIGTERM (the service-manager
/// stop signal), so cleanup runs for a plain `kill` too.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

#[async_trait::async_trait]
impl Op for Daemon {
    type Error = DaemonError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let settings = ctx.settings()?;
        let records = RecordStore::new();
        let locator = platform::locator(&settings);
        let binder = platform::binder(&settings);

        let (monitor, handle) = Monitor::new(
            settings,
            ctx.config_path.clone(),
            locator,
            binder.clone(),
            records.clone(),
        );
        let monitor_task = tokio::spawn(monitor.run());
        tracing::info!("drivemap daemon running; send ctrl-c or SIGTERM to stop");

        shutdown_signal().await?;
        tracing::info!("shutting down");

        // Stop the loop first so nothing races the cleanup.
        drop(handle);
        let _ = monitor_task.await;
        LifecycleGuard::new(records).cleanup(binder.as_ref()).await;

        Ok("daemon stopped".to_string())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn sigterm_resolves_the_shutdown_wait() {
        let wait = tokio::spawn(shutdown_signal());
        // Current-thread runtime: yielding lets the task install its
        // handlers before the signal is raised.
        tokio::task::yield_now().await;

        std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("shutdown wait did not observe SIGTERM")
            .unwrap()
            .unwrap();
    }
}
