//! Open-Meteo forecast adapter.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::models::time::local_naive_ms;
use crate::models::{day_key, ForecastBundle, HourlySample, MoonTable};
use crate::scoring::moon_illumination_percent;

use super::{FetchError, ForecastFetcher};

const DEFAULT_FORECAST_ENDPOINT: &str = "https://api.open-meteo.com/v1/forecast";
const DEFAULT_ASTRONOMY_ENDPOINT: &str = "https://api.open-meteo.com/v1/astronomy";

const HOUR_FORMAT: &str = "%Y-%m-%dT%H:%M";
const DAY_FORMAT: &str = "%Y-%m-%d";

/// Client for the Open-Meteo forecast and astronomy endpoints.
///
/// The moon request is best-effort: a failure there leaves the moon table
/// empty, which the scoring engine treats as dark skies. The forecast
/// request itself is fatal to the fetch.
pub struct OpenMeteoFetcher {
    client: reqwest::Client,
    forecast_endpoint: String,
    astronomy_endpoint: String,
}

impl OpenMeteoFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoints(client, DEFAULT_FORECAST_ENDPOINT, DEFAULT_ASTRONOMY_ENDPOINT)
    }

    /// Override the endpoints (used against mock servers).
    pub fn with_endpoints(
        client: reqwest::Client,
        forecast_endpoint: impl Into<String>,
        astronomy_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client,
            forecast_endpoint: forecast_endpoint.into(),
            astronomy_endpoint: astronomy_endpoint.into(),
        }
    }

    async fn fetch_moon_table(&self, lat: f64, lon: f64, tz: Tz) -> MoonTable {
        match self.try_fetch_moon_table(lat, lon, tz).await {
            Ok(table) => table,
            Err(err) => {
                log::warn!("moon phase request failed, scoring without moon data: {}", err);
                MoonTable::new()
            }
        }
    }

    async fn try_fetch_moon_table(
        &self,
        lat: f64,
        lon: f64,
        tz: Tz,
    ) -> Result<MoonTable, FetchError> {
        let today = Utc::now().with_timezone(&tz).date_naive();
        let end = today
            .checked_add_days(chrono::Days::new(2))
            .unwrap_or(today);

        let response = self
            .client
            .get(&self.astronomy_endpoint)
            .query(&[
                ("latitude", format!("{:.5}", lat)),
                ("longitude", format!("{:.5}", lon)),
                ("daily", "moon_phase".to_string()),
                ("timezone", tz.name().to_string()),
                ("start_date", today.format(DAY_FORMAT).to_string()),
                ("end_date", end.format(DAY_FORMAT).to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::Network(format!(
                "HTTP {}",
                response.status().as_u16()
            )));
        }

        let wire: AstronomyWire = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;
        let daily = match wire.daily {
            Some(daily) => daily,
            None => return Ok(MoonTable::new()),
        };

        let mut table = MoonTable::new();
        for (stamp, phase) in daily.time.iter().zip(daily.moon_phase.iter()) {
            let Some(phase) = phase else { continue };
            let date = NaiveDate::parse_from_str(stamp, DAY_FORMAT)
                .map_err(|e| FetchError::Parse(format!("bad day stamp {:?}: {}", stamp, e)))?;
            let midnight_ms = local_naive_ms(tz, date.and_time(NaiveTime::default()));
            table.insert(day_key(midnight_ms, tz), moon_illumination_percent(*phase));
        }
        Ok(table)
    }
}

#[async_trait]
impl ForecastFetcher for OpenMeteoFetcher {
    async fn fetch(&self, lat: f64, lon: f64) -> Result<ForecastBundle, FetchError> {
        log::debug!("fetching forecast for lat={:.5}, lon={:.5}", lat, lon);

        let response = self
            .client
            .get(&self.forecast_endpoint)
            .query(&[
                ("latitude", format!("{:.5}", lat)),
                ("longitude", format!("{:.5}", lon)),
                (
                    "hourly",
                    "cloud_cover,precipitation,wind_speed_10m,visibility".to_string(),
                ),
                ("wind_speed_unit", "ms".to_string()),
                ("timezone", "auto".to_string()),
                ("forecast_days", "2".to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::Network(format!(
                "HTTP {}",
                response.status().as_u16()
            )));
        }

        let wire: ForecastWire = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;
        let tz: Tz = wire.timezone.parse().unwrap_or(chrono_tz::UTC);
        let hours = parse_hours(&wire, tz)?;
        let moon_pct_by_day = self.fetch_moon_table(lat, lon, tz).await;

        Ok(ForecastBundle {
            timezone: tz,
            hours,
            moon_pct_by_day,
        })
    }
}

fn parse_hours(wire: &ForecastWire, tz: Tz) -> Result<Vec<HourlySample>, FetchError> {
    let hourly = wire
        .hourly
        .as_ref()
        .ok_or_else(|| FetchError::Parse("missing hourly data".into()))?;

    let mut hours = Vec::with_capacity(hourly.time.len());
    for (i, stamp) in hourly.time.iter().enumerate() {
        let naive = parse_local_hour(stamp)?;
        let timestamp_ms = local_naive_ms(tz, naive);
        hours.push(HourlySample {
            timestamp_ms,
            day_key: day_key(timestamp_ms, tz),
            cloud_cover_pct: value_at(&hourly.cloud_cover, i),
            precipitation_mm: value_at(&hourly.precipitation, i),
            wind_speed_ms: value_at(&hourly.wind_speed_10m, i),
            visibility_km: hourly
                .visibility
                .get(i)
                .copied()
                .flatten()
                .map(|meters| meters / 1000.0),
        });
    }
    Ok(hours)
}

fn parse_local_hour(stamp: &str) -> Result<NaiveDateTime, FetchError> {
    NaiveDateTime::parse_from_str(stamp, HOUR_FORMAT)
        .map_err(|e| FetchError::Parse(format!("bad hour stamp {:?}: {}", stamp, e)))
}

fn value_at(values: &[Option<f64>], index: usize) -> f64 {
    values.get(index).copied().flatten().unwrap_or(0.0)
}

#[derive(Debug, Deserialize)]
struct ForecastWire {
    #[serde(default = "default_timezone")]
    timezone: String,
    hourly: Option<HourlyWire>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Deserialize)]
struct HourlyWire {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    cloud_cover: Vec<Option<f64>>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    visibility: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AstronomyWire {
    daily: Option<DailyWire>,
}

#[derive(Debug, Deserialize)]
struct DailyWire {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    moon_phase: Vec<Option<f64>>,
}
