//! The reconciliation engine: compares the desired mapping set against live
//! OS state and issues create/repair/remove operations through a `Binder`.
//!
//! Exactly one `reconcile` call is ever in flight (the daemon funnels every
//! tick and user command through a single loop), so this type is plain
//! single-threaded state behind that loop.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::bind::{BindError, Binder, Drift};
use crate::mapping::{BindingRecord, DesiredMapping, RecordStore};
use crate::mount::MountState;
use crate::platform::Platform;

/// Non-retryable condition parking a mapping until it is resolved
/// externally. Cleared by any later pass that no longer observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockReason {
    /// Client not installed, not running, or mount root absent.
    Unreachable,
    /// Target occupied by a binding we did not create.
    Conflict,
    PermissionDenied,
    SourceMissing,
    /// No target configured for this platform, or the binding kind is
    /// unavailable here.
    Unsupported,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BlockReason::Unreachable => "unreachable",
            BlockReason::Conflict => "conflict",
            BlockReason::PermissionDenied => "permission denied",
            BlockReason::SourceMissing => "source missing",
            BlockReason::Unsupported => "unsupported",
        };
        write!(f, "{s}")
    }
}

/// Logical state of one mapping. The transient states are observable in
/// status snapshots taken while a pass is mid-operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapState {
    Unbound,
    Binding,
    Bound,
    Drifted,
    Rebinding,
    Unbinding,
    Blocked(BlockReason),
}

impl std::fmt::Display for MapState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapState::Unbound => write!(f, "unbound"),
            MapState::Binding => write!(f, "binding"),
            MapState::Bound => write!(f, "bound"),
            MapState::Drifted => write!(f, "drifted"),
            MapState::Rebinding => write!(f, "rebinding"),
            MapState::Unbinding => write!(f, "unbinding"),
            MapState::Blocked(reason) => write!(f, "blocked: {reason}"),
        }
    }
}

/// Per-mapping outcome of a reconciliation pass, for UI consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingStatus {
    pub name: String,
    pub target: Option<PathBuf>,
    pub state: MapState,
    pub drift: Option<Drift>,
}

/// What a single pass did.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub statuses: Vec<MappingStatus>,
    /// Successful bind operations issued this pass.
    pub bound: usize,
    /// Successful unbind operations issued this pass.
    pub unbound: usize,
}

impl ReconcileReport {
    /// True when the pass issued no OS-level mutations; repeated calls with
    /// unchanged inputs converge to this.
    pub fn converged(&self) -> bool {
        self.bound == 0 && self.unbound == 0
    }

    pub fn status(&self, name: &str) -> Option<&MappingStatus> {
        self.statuses.iter().find(|s| s.name == name)
    }
}

/// Owns the desired-vs-actual comparison and the per-mapping state machine:
/// `Unbound → Binding → Bound → (Drifted → Rebinding → Bound) → Unbinding →
/// Unbound`, with `Blocked(reason)` reachable from anywhere on a
/// non-retryable error.
pub struct Reconciler {
    platform: Platform,
    records: RecordStore,
    states: HashMap<String, MapState>,
    op_timeout: Duration,
}

impl Reconciler {
    pub fn new(platform: Platform, records: RecordStore, op_timeout: Duration) -> Self {
        Self {
            platform,
            records,
            states: HashMap::new(),
            op_timeout,
        }
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn state_of(&self, name: &str) -> MapState {
        self.states.get(name).copied().unwrap_or(MapState::Unbound)
    }

    /// Reconcile every desired mapping against the given mount state.
    ///
    /// Mappings are processed independently and order-insensitively; one
    /// mapping's failure never aborts the others. When the mount root is
    /// absent no destructive action is taken: bindings from a previous
    /// session are left alone until the mount reappears, so a transient
    /// unmount does not cause a removal/recreate flap.
    pub async fn reconcile(
        &mut self,
        mappings: &[DesiredMapping],
        mount: &MountState,
        binder: &dyn Binder,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for mapping in mappings {
            let status = self.reconcile_one(mapping, mount, binder, &mut report).await;
            self.states.insert(status.name.clone(), status.state);
            report.statuses.push(status);
        }
        report
    }

    async fn reconcile_one(
        &mut self,
        mapping: &DesiredMapping,
        mount: &MountState,
        binder: &dyn Binder,
        report: &mut ReconcileReport,
    ) -> MappingStatus {
        let name = mapping.name.clone();

        let Some(target) = mapping.target_for(self.platform) else {
            tracing::warn!(mapping = %name, platform = %self.platform, "no target configured for this platform");
            return MappingStatus {
                name,
                target: None,
                state: MapState::Blocked(BlockReason::Unsupported),
                drift: None,
            };
        };

        let Some(root) = mount.mount_root.as_deref() else {
            tracing::debug!(mapping = %name, "mount root absent, leaving binding untouched");
            return MappingStatus {
                name,
                target: Some(target),
                state: MapState::Blocked(BlockReason::Unreachable),
                drift: Some(Drift::Unreachable("mount root not found".into())),
            };
        };

        let source = mapping.source_under(root);
        let drift = match timeout(self.op_timeout, binder.is_bound(&target, &source)).await {
            Ok(drift) => drift,
            Err(_) => Drift::Unreachable("binding inspection timed out".into()),
        };

        let state = match &drift {
            Drift::Correct => {
                // Adopt a pre-existing correct binding from an earlier
                // session so exit cleanup applies to it uniformly.
                if !self.records.contains(&name) {
                    self.records.insert(BindingRecord::new(
                        name.clone(),
                        target.clone(),
                        source.clone(),
                        binder.kind(),
                        binder.temporary(),
                    ));
                }
                MapState::Bound
            }
            Drift::Missing => self.bind_fresh(&name, &source, &target, binder, report).await,
            Drift::Stale(old) => {
                if self.records.contains(&name) {
                    tracing::info!(
                        mapping = %name,
                        old = %old.display(),
                        new = %source.display(),
                        "binding drifted, remapping"
                    );
                    self.rebind(&name, &source, &target, binder, report).await
                } else {
                    // The target is occupied by something we never created.
                    // Never removed, never overwritten.
                    tracing::warn!(
                        mapping = %name,
                        target = %target.display(),
                        occupant = %old.display(),
                        "target occupied by a foreign binding"
                    );
                    MapState::Blocked(BlockReason::Conflict)
                }
            }
            Drift::Unreachable(reason) => {
                tracing::debug!(mapping = %name, %reason, "binding state unreachable, retrying next tick");
                MapState::Blocked(BlockReason::Unreachable)
            }
        };

        MappingStatus {
            name,
            target: Some(target),
            state,
            drift: Some(drift),
        }
    }

    async fn bind_fresh(
        &mut self,
        name: &str,
        source: &std::path::Path,
        target: &std::path::Path,
        binder: &dyn Binder,
        report: &mut ReconcileReport,
    ) -> MapState {
        self.states.insert(name.to_string(), MapState::Binding);
        match self.bind_with_timeout(source, target, binder).await {
            Ok(kind) => {
                // Invariant: retire before insert, one record per name.
                self.records.retire(name);
                self.records.insert(BindingRecord::new(
                    name,
                    target,
                    source,
                    kind,
                    binder.temporary(),
                ));
                report.bound += 1;
                tracing::info!(mapping = %name, target = %target.display(), source = %source.display(), "binding created");
                MapState::Bound
            }
            Err(err) if err.is_retryable() => {
                tracing::warn!(mapping = %name, error = %err, "bind failed, will retry on next tick");
                MapState::Unbound
            }
            Err(err) => {
                tracing::warn!(mapping = %name, error = %err, "bind failed with non-retryable error");
                MapState::Blocked(block_reason(&err))
            }
        }
    }

    /// Remap is never done in place: unbind the old target first, then bind
    /// the new source. A failure after the unbind leaves the mapping
    /// `Unbound`, never bound to a wrong target.
    async fn rebind(
        &mut self,
        name: &str,
        source: &std::path::Path,
        target: &std::path::Path,
        binder: &dyn Binder,
        report: &mut ReconcileReport,
    ) -> MapState {
        self.states.insert(name.to_string(), MapState::Rebinding);
        match self.unbind_with_timeout(target, binder).await {
            Ok(()) => {
                self.records.retire(name);
                report.unbound += 1;
            }
            Err(err) if err.is_retryable() => {
                tracing::warn!(mapping = %name, error = %err, "unbind failed, will retry on next tick");
                return MapState::Drifted;
            }
            Err(err) => {
                tracing::warn!(mapping = %name, error = %err, "unbind failed with non-retryable error");
                return MapState::Blocked(block_reason(&err));
            }
        }
        self.bind_fresh(name, source, target, binder, report).await
    }

    /// Explicitly remove one mapping's binding (configuration removal or
    /// shutdown path). Removes only what our records say we own.
    pub async fn unmap(&mut self, name: &str, binder: &dyn Binder) -> Result<(), BindError> {
        let Some(record) = self.records.get(name) else {
            return Ok(());
        };
        self.states.insert(name.to_string(), MapState::Unbinding);
        self.unbind_with_timeout(&record.target, binder).await?;
        self.records.retire(name);
        self.states.insert(name.to_string(), MapState::Unbound);
        Ok(())
    }

    async fn bind_with_timeout(
        &self,
        source: &std::path::Path,
        target: &std::path::Path,
        binder: &dyn Binder,
    ) -> Result<crate::mapping::BindingKind, BindError> {
        timeout(self.op_timeout, binder.bind(source, target))
            .await
            .map_err(|_| BindError::Timeout(format!("bind {}", target.display())))?
    }

    async fn unbind_with_timeout(
        &self,
        target: &std::path::Path,
        binder: &dyn Binder,
    ) -> Result<(), BindError> {
        timeout(self.op_timeout, binder.unbind(target))
            .await
            .map_err(|_| BindError::Timeout(format!("unbind {}", target.display())))?
    }
}

fn block_reason(err: &BindError) -> BlockReason {
    match err {
        BindError::Conflict(_) => BlockReason::Conflict,
        BindError::PermissionDenied(_) => BlockReason::PermissionDenied,
        BindError::SourceMissing(_) => BlockReason::SourceMissing,
        BindError::PlatformUnsupported(_) => BlockReason::Unsupported,
        // Retryable errors never reach here.
        BindError::Timeout(_) | BindError::Unknown(_) => BlockReason::Unreachable,
    }
}
