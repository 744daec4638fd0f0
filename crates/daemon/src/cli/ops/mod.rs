pub mod daemon;
pub mod drives;
pub mod reconcile;
pub mod start;
pub mod status;

pub use daemon::Daemon;
pub use drives::Drives;
pub use reconcile::Reconcile;
pub use start::Start;
pub use status::Status;

use comfy_table::{Cell, Color, Table};

use common::{Locator, MapState, MappingStatus, MountState, Settings};

/// Probe the client, falling back to an unknown state when the probe
/// exceeds the configured per-operation deadline.
pub(crate) async fn probe_mount(settings: &Settings, locator: &dyn Locator) -> MountState {
    match tokio::time::timeout(settings.op_timeout(), common::mount::probe(locator)).await {
        Ok(mount) => mount,
        Err(_) => MountState::unknown(),
    }
}

pub(crate) fn status_table(statuses: &[MappingStatus]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Mapping", "Target", "State", "Drift"]);
    for status in statuses {
        let color = match status.state {
            MapState::Bound => Color::Green,
            MapState::Blocked(_) => Color::Red,
            _ => Color::Yellow,
        };
        table.add_row(vec![
            Cell::new(&status.name),
            Cell::new(
                status
                    .target
                    .as_ref()
                    .map(|t| t.display().to_string())
                    .unwrap_or_else(|| "-".into()),
            ),
            Cell::new(status.state.to_string()).fg(color),
            Cell::new(
                status
                    .drift
                    .as_ref()
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".into()),
            ),
        ]);
    }
    table
}
