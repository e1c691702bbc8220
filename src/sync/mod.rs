//! Stateful synchronization between places, forecasts and the UI.
//!
//! The module includes:
//! - `orchestrator`: the owner task driving fetch scheduling, scoring and
//!   event emission
//! - `persist`: durable preferences and per-place sky snapshots
//! - `view`: the filtered/sorted projection handed to the UI

pub mod orchestrator;
pub mod persist;
mod view;

pub use orchestrator::{SyncError, SyncEvent, SyncHandle, TIMELINE_SEGMENTS};
pub use persist::{SkySnapshot, SyncPrefs};
