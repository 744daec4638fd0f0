// Service modules (daemon functionality)
pub mod client;
pub mod guard;
pub mod monitor;
pub mod platform;

// CLI surface
pub mod cli;

pub use guard::LifecycleGuard;
pub use monitor::{Command, Monitor, MonitorHandle, Snapshot};
