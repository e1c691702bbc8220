//! Place persistence across three ordered tiers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  SyncOrchestrator (sync module)                     │
//! └───────────────────┬─────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────┐
//! │  TieredPlaceStore (tiered.rs) - fallback facade     │
//! └───────┬───────────────┬────────────────┬────────────┘
//!         │ 1             │ 2              │ 3
//! ┌───────▼──────┐ ┌──────▼───────┐ ┌──────▼───────────┐
//! │   primary    │ │  REST mirror │ │  local snapshot  │
//! │ DocumentStore│ │  (rest.rs)   │ │  (snapshot.rs,   │
//! │ (document.rs)│ │              │ │   over kv.rs)    │
//! └──────────────┘ └──────────────┘ └──────────────────┘
//! ```
//!
//! Reads walk the tiers in order and take the first success; the snapshot
//! is read-only fallback and is refreshed on every successful network list.
//! Mutations stop at tier 2. Only the primary tier supports live `watch`
//! subscriptions.

pub mod config;
pub mod document;
pub mod error;
pub mod factory;
pub mod kv;
pub mod rest;
pub mod snapshot;
pub mod tiered;

pub use config::{MirrorSettings, PrimaryKind, StoreConfig};
pub use document::{DocumentStore, DocumentTier, MemoryDocumentStore, PlaceDocument, WatchHandle};
pub use error::{ErrorContext, StoreError, StoreResult};
pub use factory::TieredStoreBuilder;
pub use kv::KvStore;
pub use rest::{RestMirror, RestMirrorConfig};
pub use snapshot::SnapshotStore;
pub use tiered::TieredPlaceStore;
