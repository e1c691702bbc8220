//! # SkyScout Rust Engine
//!
//! Sky-quality scoring and tiered-synchronization engine for a stargazing
//! planner. The crate combines saved observing places with hourly
//! weather/moon forecasts into a freshness-bounded 0-100 score, a best
//! one-hour observation window, and a compact cloud timeline, keeping the
//! place list usable across a full network outage.
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`api`]: projection types handed to the UI layer
//! - [`models`]: domain value types plus timezone/geodesic helpers
//! - [`scoring`]: the pure scoring engine (no I/O, no state)
//! - [`forecast`]: the forecast-fetcher interface and Open-Meteo adapter
//! - [`store`]: place persistence across three ordered tiers (primary
//!   document store, REST mirror, on-device snapshot)
//! - [`sync`]: the orchestrator owning all mutable state and scheduling
//! - [`net`]: construction of the shared HTTP client
//!
//! ## Resilience model
//!
//! Reads fall back across the store tiers in order, reporting the primary
//! tier's failure only when nothing usable exists anywhere. Forecast or
//! scoring failures during a refresh never discard previously computed
//! state; the worst outcome is a place shown with stale or absent sky data.

pub mod api;
pub mod forecast;
pub mod models;
pub mod net;
pub mod scoring;
pub mod store;
pub mod sync;

pub use api::{Filter, Sort, UiPlace};
pub use forecast::{FetchError, ForecastFetcher, OpenMeteoFetcher};
pub use models::{
    ComputedFields, ForecastBundle, GeoPoint, HourSample, HourlySample, MoonTable, NightSettings,
    Place, PlaceDraft, PlaceSkyState, SkyStatus,
};
pub use net::{build_client, HttpConfig};
pub use scoring::{ScoreResult, ScoringError, Weights};
pub use store::{
    DocumentStore, DocumentTier, KvStore, MemoryDocumentStore, PlaceDocument, StoreConfig,
    StoreError, StoreResult, TieredPlaceStore, TieredStoreBuilder, WatchHandle,
};
pub use sync::{SkySnapshot, SyncError, SyncEvent, SyncHandle, SyncPrefs};
