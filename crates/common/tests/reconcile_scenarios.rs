//! Integration tests for the reconciliation engine against a scripted
//! in-memory binder, covering the drive-letter scenarios end to end.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use common::{
    BindError, Binder, BindingKind, BlockReason, DesiredMapping, Drift, MapState, MountState,
    Platform, RecordStore, Reconciler,
};

/// In-memory stand-in for a drive-letter substitution table. Entries in
/// `foreign` exist on the "OS" but were not created through this binder.
#[derive(Default)]
struct FakeBinder {
    bindings: Mutex<HashMap<PathBuf, PathBuf>>,
    foreign: Mutex<HashMap<PathBuf, PathBuf>>,
    bind_calls: AtomicUsize,
    unbind_calls: AtomicUsize,
    deny: Mutex<Vec<PathBuf>>,
}

impl FakeBinder {
    fn new() -> Self {
        Self::default()
    }

    fn with_foreign(self, target: &str, dest: &str) -> Self {
        self.foreign
            .lock()
            .insert(PathBuf::from(target), PathBuf::from(dest));
        self
    }

    fn deny_target(&self, target: &str) {
        self.deny.lock().push(PathBuf::from(target));
    }

    fn mutations(&self) -> usize {
        self.bind_calls.load(Ordering::SeqCst) + self.unbind_calls.load(Ordering::SeqCst)
    }

    fn bound_to(&self, target: &str) -> Option<PathBuf> {
        self.bindings.lock().get(Path::new(target)).cloned()
    }

    fn has_foreign(&self, target: &str) -> bool {
        self.foreign.lock().contains_key(Path::new(target))
    }
}

#[async_trait]
impl Binder for FakeBinder {
    fn kind(&self) -> BindingKind {
        BindingKind::Substitution
    }

    fn temporary(&self) -> bool {
        true
    }

    async fn bind(&self, source: &Path, target: &Path) -> Result<BindingKind, BindError> {
        if self.deny.lock().iter().any(|t| t == target) {
            return Err(BindError::PermissionDenied(target.display().to_string()));
        }
        if let Some(existing) = self.bindings.lock().get(target) {
            if existing == source {
                return Ok(BindingKind::Substitution);
            }
            return Err(BindError::Conflict(existing.display().to_string()));
        }
        if self.foreign.lock().contains_key(target) {
            return Err(BindError::Conflict("foreign substitution".into()));
        }
        self.bind_calls.fetch_add(1, Ordering::SeqCst);
        self.bindings
            .lock()
            .insert(target.to_path_buf(), source.to_path_buf());
        Ok(BindingKind::Substitution)
    }

    async fn unbind(&self, target: &Path) -> Result<(), BindError> {
        if self.foreign.lock().contains_key(target) {
            return Err(BindError::Conflict("foreign substitution".into()));
        }
        if self.bindings.lock().remove(target).is_some() {
            self.unbind_calls.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn is_bound(&self, target: &Path, expected_source: &Path) -> Drift {
        if let Some(dest) = self.bindings.lock().get(target) {
            if dest == expected_source {
                return Drift::Correct;
            }
            return Drift::Stale(dest.clone());
        }
        if let Some(dest) = self.foreign.lock().get(target) {
            return Drift::Stale(dest.clone());
        }
        Drift::Missing
    }
}

/// Binder whose operations can be made to hang, for exercising the
/// per-operation deadline. Delegates to a `FakeBinder` once unstalled.
#[derive(Default)]
struct StallingBinder {
    inner: FakeBinder,
    stall_probe: AtomicBool,
    stall_bind: AtomicBool,
}

impl StallingBinder {
    async fn hang() {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}

#[async_trait]
impl Binder for StallingBinder {
    fn kind(&self) -> BindingKind {
        self.inner.kind()
    }

    fn temporary(&self) -> bool {
        self.inner.temporary()
    }

    async fn bind(&self, source: &Path, target: &Path) -> Result<BindingKind, BindError> {
        if self.stall_bind.load(Ordering::SeqCst) {
            Self::hang().await;
        }
        self.inner.bind(source, target).await
    }

    async fn unbind(&self, target: &Path) -> Result<(), BindError> {
        self.inner.unbind(target).await
    }

    async fn is_bound(&self, target: &Path, expected_source: &Path) -> Drift {
        if self.stall_probe.load(Ordering::SeqCst) {
            Self::hang().await;
        }
        self.inner.is_bound(target, expected_source).await
    }
}

fn projects_mapping() -> DesiredMapping {
    DesiredMapping {
        name: "Projects".into(),
        source_path: "Shared drives/Projects".into(),
        windows_target: Some("P:".into()),
        macos_target: Some("/Volumes/Projects".into()),
        linux_target: Some("/mnt/projects".into()),
    }
}

fn mounted_at(root: &str) -> MountState {
    MountState {
        installed: true,
        running: true,
        mount_root: Some(PathBuf::from(root)),
        last_seen_at: Utc::now(),
    }
}

fn unmounted(installed: bool) -> MountState {
    MountState {
        installed,
        running: false,
        mount_root: None,
        last_seen_at: Utc::now(),
    }
}

fn reconciler() -> Reconciler {
    Reconciler::new(
        Platform::Windows,
        RecordStore::new(),
        Duration::from_secs(5),
    )
}

/// A fresh mapping binds to the source resolved under the mount root and
/// converges to Correct.
#[tokio::test]
async fn fresh_mapping_binds_and_converges() {
    let binder = FakeBinder::new();
    let mut rec = reconciler();
    let mappings = [projects_mapping()];

    let report = rec.reconcile(&mappings, &mounted_at("G:"), &binder).await;
    assert_eq!(report.bound, 1);
    assert_eq!(report.status("Projects").unwrap().state, MapState::Bound);

    let expected = Path::new("G:").join("Shared drives").join("Projects");
    assert_eq!(binder.bound_to("P:"), Some(expected));

    let second = rec.reconcile(&mappings, &mounted_at("G:"), &binder).await;
    assert_eq!(second.status("Projects").unwrap().drift, Some(Drift::Correct));
}

/// The mount root moves; the reconciler unbinds the stale target and
/// rebinds under the new root, in that order.
#[tokio::test]
async fn mount_move_remaps_unbind_first() {
    let binder = FakeBinder::new();
    let mut rec = reconciler();
    let mappings = [projects_mapping()];

    rec.reconcile(&mappings, &mounted_at("G:"), &binder).await;
    let report = rec.reconcile(&mappings, &mounted_at("H:"), &binder).await;

    assert_eq!(report.unbound, 1);
    assert_eq!(report.bound, 1);
    assert_eq!(report.status("Projects").unwrap().state, MapState::Bound);
    assert!(matches!(
        report.status("Projects").unwrap().drift,
        Some(Drift::Stale(_))
    ));

    let expected = Path::new("H:").join("Shared drives").join("Projects");
    assert_eq!(binder.bound_to("P:"), Some(expected.clone()));
    // Exactly one record survives the remap.
    assert_eq!(rec.records().len(), 1);
    assert_eq!(rec.records().get("Projects").unwrap().source, expected);
}

/// Client not installed, no mount root: every mapping reports
/// Blocked(Unreachable) and zero bind attempts are issued.
#[tokio::test]
async fn not_installed_blocks_without_side_effects() {
    let binder = FakeBinder::new();
    let mut rec = reconciler();
    let mappings = [projects_mapping()];

    let report = rec.reconcile(&mappings, &unmounted(false), &binder).await;
    assert_eq!(
        report.status("Projects").unwrap().state,
        MapState::Blocked(BlockReason::Unreachable)
    );
    assert_eq!(binder.mutations(), 0);
}

/// The target is an unrelated user substitution. The mapping blocks on
/// Conflict and the foreign binding is never removed.
#[tokio::test]
async fn foreign_target_blocks_and_is_never_removed() {
    let binder = FakeBinder::new().with_foreign("P:", "C:\\Other");
    let mut rec = reconciler();
    let mappings = [projects_mapping()];

    let report = rec.reconcile(&mappings, &mounted_at("G:"), &binder).await;
    assert_eq!(
        report.status("Projects").unwrap().state,
        MapState::Blocked(BlockReason::Conflict)
    );
    assert_eq!(binder.mutations(), 0);
    assert!(binder.has_foreign("P:"));
}

/// Idempotence: once converged, further passes with unchanged inputs issue
/// zero additional OS mutations.
#[tokio::test]
async fn reconcile_is_idempotent() {
    let binder = FakeBinder::new();
    let mut rec = reconciler();
    let mappings = [projects_mapping()];
    let mount = mounted_at("G:");

    rec.reconcile(&mappings, &mount, &binder).await;
    let after_first = binder.mutations();

    let report = rec.reconcile(&mappings, &mount, &binder).await;
    assert!(report.converged());
    assert_eq!(binder.mutations(), after_first);

    let report = rec.reconcile(&mappings, &mount, &binder).await;
    assert!(report.converged());
    assert_eq!(binder.mutations(), after_first);
}

/// Mount-loss safety: when the mount disappears, existing bindings and
/// their records are left untouched until it returns.
#[tokio::test]
async fn mount_loss_leaves_bindings_alone() {
    let binder = FakeBinder::new();
    let mut rec = reconciler();
    let mappings = [projects_mapping()];

    rec.reconcile(&mappings, &mounted_at("G:"), &binder).await;
    assert!(binder.bound_to("P:").is_some());

    let report = rec.reconcile(&mappings, &unmounted(true), &binder).await;
    assert_eq!(
        report.status("Projects").unwrap().state,
        MapState::Blocked(BlockReason::Unreachable)
    );
    assert!(binder.bound_to("P:").is_some());
    assert!(rec.records().contains("Projects"));

    // Mount returns at the same root: converges without churn.
    let report = rec.reconcile(&mappings, &mounted_at("G:"), &binder).await;
    assert!(report.converged());
    assert_eq!(report.status("Projects").unwrap().state, MapState::Bound);
}

/// One mapping's failure never aborts reconciliation of the others.
#[tokio::test]
async fn failures_are_isolated_per_mapping() {
    let binder = FakeBinder::new().with_foreign("P:", "C:\\Other");
    let mut rec = reconciler();
    let renders = DesiredMapping {
        name: "Renders".into(),
        source_path: "Shared drives/Renders".into(),
        windows_target: Some("R:".into()),
        macos_target: None,
        linux_target: None,
    };
    let mappings = [projects_mapping(), renders];

    let report = rec.reconcile(&mappings, &mounted_at("G:"), &binder).await;
    assert_eq!(
        report.status("Projects").unwrap().state,
        MapState::Blocked(BlockReason::Conflict)
    );
    assert_eq!(report.status("Renders").unwrap().state, MapState::Bound);
    assert!(binder.bound_to("R:").is_some());
}

/// PermissionDenied is surfaced as Blocked, not retried within the pass.
#[tokio::test]
async fn permission_denied_blocks_mapping() {
    let binder = FakeBinder::new();
    binder.deny_target("P:");
    let mut rec = reconciler();
    let mappings = [projects_mapping()];

    let report = rec.reconcile(&mappings, &mounted_at("G:"), &binder).await;
    assert_eq!(
        report.status("Projects").unwrap().state,
        MapState::Blocked(BlockReason::PermissionDenied)
    );
    assert!(!rec.records().contains("Projects"));
}

/// A mapping with no target for the active platform blocks as Unsupported.
#[tokio::test]
async fn missing_platform_target_is_unsupported() {
    let binder = FakeBinder::new();
    let mut rec = Reconciler::new(
        Platform::Linux,
        RecordStore::new(),
        Duration::from_secs(5),
    );
    let mapping = DesiredMapping {
        name: "Projects".into(),
        source_path: "Shared drives/Projects".into(),
        windows_target: Some("P:".into()),
        macos_target: None,
        linux_target: None,
    };

    let report = rec
        .reconcile(&[mapping], &mounted_at("/mnt/gd"), &binder)
        .await;
    assert_eq!(
        report.status("Projects").unwrap().state,
        MapState::Blocked(BlockReason::Unsupported)
    );
    assert_eq!(binder.mutations(), 0);
}

/// A binding left over from a previous session that already points at the
/// right source is adopted: a record is created without re-binding.
#[tokio::test]
async fn preexisting_correct_binding_is_adopted() {
    let binder = FakeBinder::new();
    let source = Path::new("G:").join("Shared drives").join("Projects");
    binder
        .bindings
        .lock()
        .insert(PathBuf::from("P:"), source.clone());

    let mut rec = reconciler();
    let report = rec
        .reconcile(&[projects_mapping()], &mounted_at("G:"), &binder)
        .await;

    assert!(report.converged());
    assert_eq!(report.status("Projects").unwrap().state, MapState::Bound);
    let record = rec.records().get("Projects").unwrap();
    assert_eq!(record.source, source);
    assert!(record.temporary);
}

/// Explicit unmap removes only what the record says we own, and is a no-op
/// for unknown names.
#[tokio::test]
async fn unmap_removes_owned_binding() {
    let binder = FakeBinder::new();
    let mut rec = reconciler();
    let mappings = [projects_mapping()];

    rec.reconcile(&mappings, &mounted_at("G:"), &binder).await;
    rec.unmap("Projects", &binder).await.unwrap();
    assert!(binder.bound_to("P:").is_none());
    assert!(!rec.records().contains("Projects"));

    rec.unmap("NoSuchMapping", &binder).await.unwrap();
}

/// A hung binding probe hits the per-operation deadline and parks the
/// mapping in Blocked(Unreachable) without touching the existing binding,
/// then recovers once the probe responds again.
#[tokio::test(start_paused = true)]
async fn hung_probe_times_out_without_side_effects() {
    let binder = StallingBinder::default();
    let mut rec = Reconciler::new(
        Platform::Windows,
        RecordStore::new(),
        Duration::from_millis(100),
    );
    let mappings = [projects_mapping()];

    rec.reconcile(&mappings, &mounted_at("G:"), &binder).await;
    assert!(binder.inner.bound_to("P:").is_some());
    let mutations = binder.inner.mutations();

    binder.stall_probe.store(true, Ordering::SeqCst);
    let report = rec.reconcile(&mappings, &mounted_at("G:"), &binder).await;
    assert_eq!(
        report.status("Projects").unwrap().state,
        MapState::Blocked(BlockReason::Unreachable)
    );
    assert!(matches!(
        report.status("Projects").unwrap().drift,
        Some(Drift::Unreachable(_))
    ));
    assert_eq!(binder.inner.mutations(), mutations);
    assert!(binder.inner.bound_to("P:").is_some());
    assert!(rec.records().contains("Projects"));

    binder.stall_probe.store(false, Ordering::SeqCst);
    let report = rec.reconcile(&mappings, &mounted_at("G:"), &binder).await;
    assert_eq!(report.status("Projects").unwrap().state, MapState::Bound);
}

/// A hung bind call times out as a retryable failure: the mapping stays
/// Unbound with no record, and the next pass binds it once the call returns.
#[tokio::test(start_paused = true)]
async fn hung_bind_times_out_and_is_retried() {
    let binder = StallingBinder::default();
    binder.stall_bind.store(true, Ordering::SeqCst);
    let mut rec = Reconciler::new(
        Platform::Windows,
        RecordStore::new(),
        Duration::from_millis(100),
    );
    let mappings = [projects_mapping()];

    let report = rec.reconcile(&mappings, &mounted_at("G:"), &binder).await;
    assert_eq!(report.bound, 0);
    assert_eq!(report.status("Projects").unwrap().state, MapState::Unbound);
    assert!(!rec.records().contains("Projects"));
    assert_eq!(binder.inner.mutations(), 0);

    binder.stall_bind.store(false, Ordering::SeqCst);
    let report = rec.reconcile(&mappings, &mounted_at("G:"), &binder).await;
    assert_eq!(report.bound, 1);
    assert_eq!(report.status("Projects").unwrap().state, MapState::Bound);
    let expected = Path::new("G:").join("Shared drives").join("Projects");
    assert_eq!(binder.inner.bound_to("P:"), Some(expected));
}
