//! The status monitor: one loop that owns the reconciler, polls the client
//! on an interval, and serves user commands through the same `select!` so
//! reconciliation passes never overlap.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{timeout, MissedTickBehavior};

use common::{
    mount, Binder, Locator, MappingStatus, MountState, Platform, RecordStore, Reconciler, Settings,
};

use crate::client;

/// User-initiated work, funneled into the monitor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Re-probe and reconcile now instead of waiting for the next tick.
    ForceReconcile,
    /// Same as `ForceReconcile`; the hook external installers call after
    /// installing or updating the client.
    RefreshNow,
    /// Launch the cloud client.
    StartClient,
    /// Re-read and re-validate the config file, retire bindings for
    /// mappings that were removed, then reconcile against the new set.
    ReloadConfig,
}

/// Published view of the world after a pass that changed something.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub mount: MountState,
    /// The previous client state, set when this snapshot was published
    /// because the mount observation changed.
    pub previous: Option<MountState>,
    pub mappings: Vec<MappingStatus>,
    pub updated_at: DateTime<Utc>,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            mount: MountState::unknown(),
            previous: None,
            mappings: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Cheap handle for talking to a running monitor.
#[derive(Clone)]
pub struct MonitorHandle {
    commands: flume::Sender<Command>,
    snapshots: watch::Receiver<Snapshot>,
}

impl MonitorHandle {
    /// Returns `false` when the monitor has already stopped.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Wait for the next published snapshot. Snapshots are only published
    /// when the observed state actually changed.
    pub async fn changed(&mut self) -> bool {
        self.snapshots.changed().await.is_ok()
    }
}

pub struct Monitor {
    settings: Settings,
    config_path: Option<PathBuf>,
    locator: Arc<dyn Locator>,
    binder: Arc<dyn Binder>,
    reconciler: Reconciler,
    records: RecordStore,
    last_mount: MountState,
    start_attempted: bool,
    snapshot_tx: watch::Sender<Snapshot>,
    commands: flume::Receiver<Command>,
}

impl Monitor {
    pub fn new(
        settings: Settings,
        config_path: Option<PathBuf>,
        locator: Arc<dyn Locator>,
        binder: Arc<dyn Binder>,
        records: RecordStore,
    ) -> (Self, MonitorHandle) {
        let (snapshot_tx, snapshots) = watch::channel(Snapshot::empty());
        let (command_tx, commands) = flume::unbounded();
        let reconciler =
            Reconciler::new(Platform::current(), records.clone(), settings.op_timeout());
        let monitor = Self {
            settings,
            config_path,
            locator,
            binder,
            reconciler,
            records,
            last_mount: MountState::unknown(),
            start_attempted: false,
            snapshot_tx,
            commands,
        };
        let handle = MonitorHandle {
            commands: command_tx,
            snapshots,
        };
        (monitor, handle)
    }

    /// Run until every `MonitorHandle` is dropped. The first tick fires
    /// immediately, so startup reconciles without waiting a full interval.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.settings.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                command = self.commands.recv_async() => match command {
                    Ok(Command::ForceReconcile | Command::RefreshNow) => self.tick().await,
                    Ok(Command::StartClient) => self.try_start_client().await,
                    Ok(Command::ReloadConfig) => {
                        if self.reload_config().await {
                            ticker = tokio::time::interval(self.settings.poll_interval());
                            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                        }
                        self.tick().await;
                    }
                    Err(_) => break,
                },
            }
        }
        tracing::debug!("monitor loop stopped");
    }

    async fn tick(&mut self) {
        let mount = match timeout(
            self.settings.op_timeout(),
            mount::probe(self.locator.as_ref()),
        )
        .await
        {
            Ok(mount) => mount,
            Err(_) => {
                tracing::warn!("client status probe timed out");
                MountState::unknown()
            }
        };

        let mount_changed = !mount.same_observation(&self.last_mount);
        if mount_changed {
            tracing::info!(
                installed = mount.installed,
                running = mount.running,
                mount_root = ?mount.mount_root,
                was_installed = self.last_mount.installed,
                was_running = self.last_mount.running,
                was_mount_root = ?self.last_mount.mount_root,
                "client state changed"
            );
            self.warn_on_mount_mismatch(&mount);
        }

        if mount.running {
            self.start_attempted = false;
        } else if self.settings.auto_start_client && mount.installed && !self.start_attempted {
            // One attempt per not-running streak.
            self.start_attempted = true;
            self.try_start_client().await;
        }

        let report = self
            .reconciler
            .reconcile(&self.settings.mappings, &mount, self.binder.as_ref())
            .await;
        if !report.converged() {
            tracing::info!(
                bound = report.bound,
                unbound = report.unbound,
                "reconciliation applied changes"
            );
        }

        // Publish only on change; on-demand readers use `snapshot()`.
        let statuses_changed = report.statuses != self.snapshot_tx.borrow().mappings;
        if mount_changed || statuses_changed {
            self.snapshot_tx.send_replace(Snapshot {
                mount: mount.clone(),
                previous: mount_changed.then(|| self.last_mount.clone()),
                mappings: report.statuses,
                updated_at: Utc::now(),
            });
        }
        self.last_mount = mount;
    }

    /// Re-read the config file. On success the whole snapshot is replaced
    /// and bindings for deleted mappings are retired; an invalid file keeps
    /// the previous configuration. Returns whether the poll interval moved.
    async fn reload_config(&mut self) -> bool {
        let Some(path) = self.config_path.clone().or_else(Settings::default_path) else {
            tracing::warn!("no config path to reload from");
            return false;
        };
        let reloaded = match Settings::load(&path) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "config reload failed; keeping previous configuration"
                );
                return false;
            }
        };

        let keep: HashSet<&str> = reloaded.mappings.iter().map(|m| m.name.as_str()).collect();
        for record in self.records.all() {
            if keep.contains(record.mapping_name.as_str()) {
                continue;
            }
            if let Err(err) = self
                .reconciler
                .unmap(&record.mapping_name, self.binder.as_ref())
                .await
            {
                tracing::warn!(
                    mapping = %record.mapping_name,
                    error = %err,
                    "failed to remove binding for deleted mapping"
                );
            }
        }

        let interval_changed = reloaded.poll_interval_secs != self.settings.poll_interval_secs;
        self.reconciler = Reconciler::new(
            Platform::current(),
            self.records.clone(),
            reloaded.op_timeout(),
        );
        tracing::info!(
            path = %path.display(),
            mappings = reloaded.mappings.len(),
            "configuration reloaded"
        );
        self.settings = reloaded;
        interval_changed
    }

    fn warn_on_mount_mismatch(&self, mount: &MountState) {
        if !self.settings.show_mount_mismatch_notifications {
            return;
        }
        let desired = self.settings.desired_mount.for_platform(Platform::current());
        if let (Some(root), Some(desired)) = (&mount.mount_root, desired) {
            if root != std::path::Path::new(desired) {
                tracing::warn!(
                    detected = %root.display(),
                    desired = %desired,
                    "client mounted away from the configured mount point; bindings follow the detected root"
                );
            }
        }
    }

    async fn try_start_client(&self) {
        match client::start_client(&self.settings, self.locator.as_ref()).await {
            Ok(outcome) => tracing::info!(%outcome, "client start requested"),
            Err(err) => tracing::warn!(error = %err, "client start failed"),
        }
    }
}
