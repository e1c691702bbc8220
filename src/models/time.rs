//! Timezone-local day bucketing and night-window resolution.
//!
//! All arithmetic is done in epoch milliseconds; timezone conversions go
//! through `chrono-tz` so forecast-local wall time (not device time) drives
//! the day keys and the observation window.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use super::sky::NightSettings;

const DAY_MS: i64 = 86_400_000;

/// Start of the local calendar day containing `timestamp_ms`, as a UTC epoch
/// millisecond value. Two instants in the same local day map to the same key.
pub fn day_key(timestamp_ms: i64, tz: Tz) -> i64 {
    let offset_ms = zone_offset_ms(timestamp_ms, tz);
    let local = timestamp_ms + offset_ms;
    let start_local = local.div_euclid(DAY_MS) * DAY_MS;
    start_local - offset_ms
}

/// Resolve the active observation window for `settings` in `tz`.
///
/// If the window end is at or before the window start it spans past local
/// midnight. If local now is already past the window end, both bounds roll
/// forward one calendar day. Returns `(start_ms, end_ms)`.
pub fn resolve_night_window(tz: Tz, now_ms: i64, settings: &NightSettings) -> (i64, i64) {
    let today = utc_ms_to_zoned(now_ms, tz).date_naive();
    let spans_midnight = settings.window_end_minutes <= settings.window_start_minutes;

    let mut start_day = today;
    let mut end_day = if spans_midnight { next_day(today) } else { today };
    let mut start = local_instant_ms(tz, start_day, settings.window_start_minutes);
    let mut end = local_instant_ms(tz, end_day, settings.window_end_minutes);

    if now_ms > end {
        start_day = next_day(start_day);
        end_day = next_day(end_day);
        start = local_instant_ms(tz, start_day, settings.window_start_minutes);
        end = local_instant_ms(tz, end_day, settings.window_end_minutes);
    }
    (start, end)
}

/// UTC epoch milliseconds of the given local wall-clock time in `tz`.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant; a
/// nonexistent local time (spring-forward gap) is shifted one hour later.
pub fn local_naive_ms(tz: Tz, naive: NaiveDateTime) -> i64 {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.timestamp_millis(),
        LocalResult::Ambiguous(earliest, _) => earliest.timestamp_millis(),
        LocalResult::None => match tz.from_local_datetime(&(naive + Duration::hours(1))) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.timestamp_millis(),
            LocalResult::None => Utc.from_utc_datetime(&naive).timestamp_millis(),
        },
    }
}

fn local_instant_ms(tz: Tz, date: NaiveDate, minutes: u32) -> i64 {
    let naive = date
        .and_hms_opt(minutes / 60, minutes % 60, 0)
        .unwrap_or_else(|| date.and_time(NaiveTime::default()));
    local_naive_ms(tz, naive)
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

fn utc_ms_to_zoned(timestamp_ms: i64, tz: Tz) -> DateTime<Tz> {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .with_timezone(&tz)
}

fn zone_offset_ms(timestamp_ms: i64, tz: Tz) -> i64 {
    i64::from(
        utc_ms_to_zoned(timestamp_ms, tz)
            .offset()
            .fix()
            .local_minus_utc(),
    ) * 1000
}

#[cfg(test)]
#[path = "time_tests.rs"]
mod time_tests;
