//! Forecast retrieval.
//!
//! The orchestrator only depends on the [`ForecastFetcher`] trait: given a
//! coordinate it returns structured hourly samples and a per-day moon table
//! in the forecast location's own timezone, or fails. The bundled
//! implementation talks to Open-Meteo; tests substitute their own.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ForecastBundle;

pub mod open_meteo;

pub use open_meteo::OpenMeteoFetcher;

/// Forecast retrieval failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("forecast network error: {0}")]
    Network(String),
    #[error("forecast parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Source of hourly forecast data for a coordinate.
///
/// Implementations must supply at least 24 hours of forward-looking hourly
/// data and report the forecast location's local timezone (never the device
/// zone).
#[async_trait]
pub trait ForecastFetcher: Send + Sync {
    async fn fetch(&self, lat: f64, lon: f64) -> Result<ForecastBundle, FetchError>;
}
