//! Pure sky-quality scoring.
//!
//! Converts hourly forecast samples plus a moon-illumination table into a
//! composite 0-100 score, the best one-hour observation window, and a
//! compact cloud-cover timeline. Every function here is stateless and
//! side-effect free; identical inputs always produce identical outputs, so
//! the engine is safe to call concurrently without synchronization.
//!
//! The weight/threshold scheme is the user-visible contract tuned through
//! `NightSettings` and must not drift: per hour,
//! `score = w_cloud*(100-cloud) + w_precip*(20 | -100) + w_wind*max(0, cap-wind)
//!        + w_moon*(100-moon_pct)`, with `>= 80` Good and `>= 60` Ok.

use thiserror::Error;

use crate::models::{HourlySample, MoonTable, SkyStatus};

const HOUR_MS: i64 = 3_600_000;

/// Relative importance of each forecast component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub cloud: f64,
    pub precip: f64,
    pub wind: f64,
    pub moon: f64,
}

/// Best-window evaluation for one set of hourly samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    /// Raw composite score; unbounded until the caller clamps for display.
    pub score: f64,
    pub window_start_ms: i64,
    pub window_end_ms: i64,
    pub clear_pct: u8,
    pub moon_pct: u8,
    pub avg_cloud: f64,
    pub avg_wind: f64,
    pub precip_free: bool,
    pub status: SkyStatus,
}

/// Why a refresh produced no usable score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScoringError {
    #[error("no forecast hours inside the night window")]
    NoHoursInWindow,
    #[error("no scoreable window found")]
    NoWindowFound,
}

/// Converts a moon phase value (0 new, 0.5 full, wrapping at 1) into an
/// illumination percent.
pub fn moon_illumination_percent(phase: f64) -> u8 {
    let normalized = 1.0 - (0.5 - phase).abs() * 2.0;
    clamp_percent((normalized * 100.0).round() as i64)
}

/// Scores every sample and returns the best one-hour window, or `None` when
/// `samples` is empty.
///
/// Ties on the maximum score resolve to the first sample in input order;
/// this is a documented contract, not an accident of iteration.
pub fn find_best_window(
    samples: &[HourlySample],
    moon_pct_by_day: &MoonTable,
    weights: &Weights,
    wind_cap_ms: f64,
) -> Option<ScoreResult> {
    let mut best: Option<ScoreResult> = None;
    for sample in samples {
        let moon_pct = clamp_percent(i64::from(
            moon_pct_by_day.get(&sample.day_key).copied().unwrap_or(0),
        ));
        let cloud_component = weights.cloud * (100.0 - sample.cloud_cover_pct);
        let precip_component = weights.precip
            * if sample.precipitation_mm <= 0.0 {
                20.0
            } else {
                -100.0
            };
        let wind_component = weights.wind * (wind_cap_ms - sample.wind_speed_ms).max(0.0);
        let moon_component = weights.moon * (100.0 - f64::from(moon_pct));
        let score = cloud_component + precip_component + wind_component + moon_component;

        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(ScoreResult {
                score,
                window_start_ms: sample.timestamp_ms,
                window_end_ms: sample.timestamp_ms + HOUR_MS,
                clear_pct: clamp_percent((100.0 - sample.cloud_cover_pct).round() as i64),
                moon_pct,
                avg_cloud: sample.cloud_cover_pct,
                avg_wind: sample.wind_speed_ms,
                precip_free: sample.precipitation_mm <= 0.0,
                status: to_status(score),
            });
        }
    }
    best
}

/// Downsamples (or pads) cloud-cover values into exactly `segments` points.
///
/// `segments == 0` yields an empty timeline; empty input yields all zeros.
/// When there are at most `segments` samples, each contributes one point and
/// the last value repeats to fill. Otherwise `segments` evenly spaced
/// indices are picked by nearest rounding.
pub fn build_timeline(samples: &[HourlySample], segments: usize) -> Vec<u8> {
    if segments == 0 {
        return Vec::new();
    }
    if samples.is_empty() {
        return vec![0; segments];
    }

    let mut bars = Vec::with_capacity(segments);
    if samples.len() <= segments {
        for sample in samples {
            bars.push(clamp_percent(sample.cloud_cover_pct.round() as i64));
        }
        let last = *bars.last().unwrap_or(&0);
        while bars.len() < segments {
            bars.push(last);
        }
        return bars;
    }

    let step = (samples.len() - 1) as f64 / (segments - 1) as f64;
    for i in 0..segments {
        let index = ((i as f64 * step).round() as usize).min(samples.len() - 1);
        bars.push(clamp_percent(samples[index].cloud_cover_pct.round() as i64));
    }
    bars
}

/// Maps a composite score onto the status buckets.
pub fn to_status(score: f64) -> SkyStatus {
    if score >= 80.0 {
        SkyStatus::Good
    } else if score >= 60.0 {
        SkyStatus::Ok
    } else {
        SkyStatus::Poor
    }
}

fn clamp_percent(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}
