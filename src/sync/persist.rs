//! Durable orchestrator preferences and per-place sky snapshots.
//!
//! Everything here is a structured record in the key-value store: the night
//! settings, the current filter/sort modes, the primary-place id, and one
//! `SkySnapshot` per place so scored state survives a restart with no
//! network at all.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::{Filter, Sort};
use crate::models::{HourSample, NightSettings, PlaceSkyState};
use crate::scoring::to_status;
use crate::store::KvStore;

const KEY_NIGHT_SETTINGS: &str = "night_settings";
const KEY_FILTER: &str = "places_filter";
const KEY_SORT: &str = "places_sort";
const KEY_PRIMARY: &str = "places_primary";

fn sky_state_key(place_id: &str) -> String {
    format!("sky_state/{}", place_id)
}

/// Replayable per-place snapshot of the last computed sky state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkySnapshot {
    pub score: i64,
    pub clear_pct: u8,
    pub moon_pct: u8,
    pub window_start_ms: i64,
    pub window_end_ms: i64,
    pub updated_at_ms: i64,
    pub timeline: Vec<u8>,
    pub hours: Vec<HourSample>,
    pub timezone: String,
    pub avg_cloud: f64,
    pub avg_wind: f64,
    pub precip_free: bool,
}

impl SkySnapshot {
    pub fn from_state(state: &PlaceSkyState) -> Self {
        Self {
            score: state.score,
            clear_pct: state.clear_pct,
            moon_pct: state.moon_pct,
            window_start_ms: state.window_start_ms,
            window_end_ms: state.window_end_ms,
            updated_at_ms: state.updated_at_ms,
            timeline: state.timeline.clone(),
            hours: state.hours.clone(),
            timezone: state.timezone.name().to_string(),
            avg_cloud: state.avg_cloud,
            avg_wind: state.avg_wind,
            precip_free: state.precip_free,
        }
    }

    pub fn into_state(self, from_cache: bool) -> PlaceSkyState {
        let score = self.score.clamp(0, 100);
        PlaceSkyState {
            score,
            status: to_status(self.score as f64),
            window_start_ms: self.window_start_ms,
            window_end_ms: self.window_end_ms,
            clear_pct: self.clear_pct,
            moon_pct: self.moon_pct,
            updated_at_ms: self.updated_at_ms,
            from_cache,
            timeline: self.timeline,
            hours: self.hours,
            avg_cloud: self.avg_cloud,
            avg_wind: self.avg_wind,
            precip_free: self.precip_free,
            timezone: self.timezone.parse().unwrap_or(chrono_tz::UTC),
        }
    }
}

/// Synchronous access to the orchestrator's durable preferences.
#[derive(Clone)]
pub struct SyncPrefs {
    kv: Arc<KvStore>,
}

impl SyncPrefs {
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self { kv }
    }

    pub fn night_settings(&self) -> NightSettings {
        self.kv.get(KEY_NIGHT_SETTINGS).unwrap_or_default()
    }

    pub fn save_night_settings(&self, settings: &NightSettings) {
        self.put(KEY_NIGHT_SETTINGS, settings);
    }

    pub fn filter(&self) -> Filter {
        self.kv
            .get::<String>(KEY_FILTER)
            .and_then(|raw| Filter::from_str(&raw).ok())
            .unwrap_or(Filter::All)
    }

    pub fn save_filter(&self, filter: Filter) {
        self.put(KEY_FILTER, &filter.as_str());
    }

    pub fn sort(&self) -> Sort {
        self.kv
            .get::<String>(KEY_SORT)
            .and_then(|raw| Sort::from_str(&raw).ok())
            .unwrap_or(Sort::Score)
    }

    pub fn save_sort(&self, sort: Sort) {
        self.put(KEY_SORT, &sort.as_str());
    }

    pub fn primary_place(&self) -> Option<String> {
        self.kv.get(KEY_PRIMARY)
    }

    pub fn save_primary_place(&self, place_id: Option<&str>) {
        match place_id {
            Some(id) => self.put(KEY_PRIMARY, &id),
            None => {
                if let Err(err) = self.kv.remove(KEY_PRIMARY) {
                    log::warn!("failed to clear primary place: {}", err);
                }
            }
        }
    }

    pub fn sky_snapshot(&self, place_id: &str) -> Option<SkySnapshot> {
        self.kv.get(&sky_state_key(place_id))
    }

    pub fn save_sky_snapshot(&self, place_id: &str, snapshot: &SkySnapshot) {
        self.put(&sky_state_key(place_id), snapshot);
    }

    pub fn clear_sky_snapshot(&self, place_id: &str) {
        if let Err(err) = self.kv.remove(&sky_state_key(place_id)) {
            log::warn!("failed to clear sky snapshot for {}: {}", place_id, err);
        }
    }

    fn put<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(err) = self.kv.put(key, value) {
            log::warn!("failed to persist {}: {}", key, err);
        }
    }
}
