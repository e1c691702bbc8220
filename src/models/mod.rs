//! Domain models shared across the crate.
//!
//! Value types only: places, forecast samples, computed sky state and the
//! process-wide night settings, plus timezone/geodesic helpers. Nothing in
//! here performs I/O.

pub mod geo;
pub mod place;
pub mod sky;
pub mod time;

pub use geo::{haversine_km, GeoPoint};
pub use place::{ComputedFields, Place, PlaceDraft};
pub use sky::{
    ForecastBundle, HourSample, HourlySample, MoonTable, NightSettings, PlaceSkyState, SkyStatus,
    FRESHNESS_WINDOW_MS,
};
pub use time::{day_key, resolve_night_window};
