//! Forecast samples and the in-memory sky state shown for a place.

use std::collections::HashMap;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::place::ComputedFields;

/// Cached sky state older than this is stale and eligible for a background
/// refetch. Staleness never invalidates display.
pub const FRESHNESS_WINDOW_MS: i64 = 30 * 60 * 1000;

/// Observing-condition bucket derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkyStatus {
    Good,
    Ok,
    Poor,
}

/// One hour of forecast data, UTC-normalized.
///
/// `day_key` is the start of the local calendar day the hour falls in,
/// derived from the forecast timezone; it joins hourly samples with the
/// once-daily moon table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlySample {
    pub timestamp_ms: i64,
    pub day_key: i64,
    pub cloud_cover_pct: f64,
    pub precipitation_mm: f64,
    pub wind_speed_ms: f64,
    pub visibility_km: Option<f64>,
}

/// Moon illumination percent per local-day bucket.
pub type MoonTable = HashMap<i64, u8>;

/// Parsed forecast for one location: ordered hourly samples plus the moon
/// table, in the forecast location's own timezone.
#[derive(Debug, Clone)]
pub struct ForecastBundle {
    pub timezone: Tz,
    pub hours: Vec<HourlySample>,
    pub moon_pct_by_day: MoonTable,
}

/// Compact persisted form of an hour sample (the fields the UI redraws from).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourSample {
    pub timestamp_ms: i64,
    pub cloud_pct: u8,
    pub precipitation_mm: f64,
    pub wind_speed_ms: f64,
}

/// UI-facing sky state for a place: the durable computed fields plus the
/// timeline and raw hours they were derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceSkyState {
    pub score: i64,
    pub status: SkyStatus,
    pub window_start_ms: i64,
    pub window_end_ms: i64,
    pub clear_pct: u8,
    pub moon_pct: u8,
    pub updated_at_ms: i64,
    /// True when restored from a durable cache rather than a live fetch.
    pub from_cache: bool,
    pub timeline: Vec<u8>,
    pub hours: Vec<HourSample>,
    pub avg_cloud: f64,
    pub avg_wind: f64,
    pub precip_free: bool,
    pub timezone: Tz,
}

impl PlaceSkyState {
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms - self.updated_at_ms <= FRESHNESS_WINDOW_MS
    }

    /// The durable projection pushed back to the place document.
    pub fn computed_fields(&self) -> ComputedFields {
        ComputedFields {
            score: self.score,
            window_start_ms: self.window_start_ms,
            window_end_ms: self.window_end_ms,
            clear_pct: self.clear_pct,
            moon_pct: self.moon_pct,
            updated_at_ms: self.updated_at_ms,
        }
    }
}

/// Process-wide scoring configuration.
///
/// Window bounds are minutes since local midnight in the forecast timezone.
/// Loaded once at orchestrator construction and persisted immediately on
/// every explicit update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NightSettings {
    pub window_start_minutes: u32,
    pub window_end_minutes: u32,
    pub wind_cap_ms: f64,
    pub weight_cloud: f64,
    pub weight_precip: f64,
    pub weight_wind: f64,
    pub weight_moon: f64,
}

impl Default for NightSettings {
    fn default() -> Self {
        Self {
            window_start_minutes: 19 * 60,
            window_end_minutes: 3 * 60,
            wind_cap_ms: 12.0,
            weight_cloud: 0.6,
            weight_precip: 0.2,
            weight_wind: 0.1,
            weight_moon: 0.1,
        }
    }
}
