//! Shutdown cleanup for temporary bindings. Runs after the monitor loop has
//! stopped, so nothing races the removals.

use common::{Binder, RecordStore};

pub struct LifecycleGuard {
    records: RecordStore,
}

impl LifecycleGuard {
    pub fn new(records: RecordStore) -> Self {
        Self { records }
    }

    /// Remove every binding recorded as `temporary`. Persistent bindings
    /// (Linux symlinks, macOS with `keep_symlinks_on_exit`) are left in
    /// place. Failures are logged and skipped; shutdown always completes.
    pub async fn cleanup(&self, binder: &dyn Binder) {
        let temporary = self.records.temporary();
        if temporary.is_empty() {
            return;
        }
        tracing::info!(count = temporary.len(), "removing temporary bindings");
        for record in temporary {
            match binder.unbind(&record.target).await {
                Ok(()) => {
                    self.records.retire(&record.mapping_name);
                    tracing::debug!(
                        mapping = %record.mapping_name,
                        target = %record.target.display(),
                        "binding removed"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        mapping = %record.mapping_name,
                        target = %record.target.display(),
                        error = %err,
                        "failed to remove binding on shutdown"
                    );
                }
            }
        }
    }
}
