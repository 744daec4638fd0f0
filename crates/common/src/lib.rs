//! Core model and reconciliation engine for drivemap.
//!
//! This crate is platform-agnostic: it defines the mapping data model, the
//! `Binder`/`Locator` seams the platform adapters implement, and the
//! reconciler that drives desired mappings toward live OS bindings. The
//! daemon crate supplies the per-OS implementations and the polling loop.

pub mod bind;
pub mod config;
pub mod locate;
pub mod mapping;
pub mod mount;
pub mod platform;
pub mod reconcile;

pub use bind::{BindError, Binder, Drift};
pub use config::{ConfigError, Settings};
pub use locate::Locator;
pub use mapping::{BindingKind, BindingRecord, DesiredMapping, RecordStore};
pub use mount::MountState;
pub use platform::Platform;
pub use reconcile::{BlockReason, MapState, MappingStatus, ReconcileReport, Reconciler};
