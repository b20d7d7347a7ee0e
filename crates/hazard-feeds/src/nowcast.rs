//! Open-Meteo 15-minute precipitation nowcast

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{get_json, Coordinate, FeedError, FeedsConfig, NowcastSource, Result};

const SERVICE: &str = "open-meteo";

/// Parallel 15-minute series. Open-Meteo reports gaps as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NowcastSeries {
    pub times: Vec<String>,
    /// mm/h
    pub precipitation: Vec<Option<f64>>,
    /// %
    pub probability: Vec<Option<f64>>,
}

impl NowcastSeries {
    /// Single zeroed entry, served when the upstream is unavailable.
    pub fn empty() -> Self {
        Self {
            times: Vec::new(),
            precipitation: vec![Some(0.0)],
            probability: vec![Some(0.0)],
        }
    }

    pub fn len(&self) -> usize {
        self.precipitation.len().max(self.probability.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Current rainfall signal used by the risk score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    /// mm/h
    pub rate: f64,
    /// 0-100
    pub probability: f64,
}

impl WeatherSample {
    /// First entry of each series; a missing or null entry reads as 0.
    pub fn from_series(series: &NowcastSeries) -> Self {
        let first = |values: &[Option<f64>]| {
            values
                .first()
                .copied()
                .flatten()
                .filter(|v| v.is_finite())
                .unwrap_or(0.0)
        };
        Self {
            rate: first(&series.precipitation),
            probability: first(&series.probability),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    minutely_15: Option<Minutely15>,
}

#[derive(Debug, Deserialize)]
struct Minutely15 {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability: Vec<Option<f64>>,
}

impl TryFrom<ForecastResponse> for NowcastSeries {
    type Error = FeedError;

    fn try_from(response: ForecastResponse) -> Result<Self> {
        let block = response.minutely_15.ok_or(FeedError::MissingField {
            service: SERVICE,
            field: "minutely_15",
        })?;
        Ok(Self {
            times: block.time,
            precipitation: block.precipitation,
            probability: block.precipitation_probability,
        })
    }
}

#[derive(Debug, Clone)]
pub struct OpenMeteoNowcastClient {
    client: reqwest::Client,
    url: String,
    forecast_hours: u32,
    timeout: Duration,
}

impl OpenMeteoNowcastClient {
    pub fn new(config: &FeedsConfig) -> Result<Self> {
        Ok(Self::with_client(config.http_client()?, config))
    }

    pub fn with_client(client: reqwest::Client, config: &FeedsConfig) -> Self {
        Self {
            client,
            url: config.open_meteo_url.clone(),
            forecast_hours: config.nowcast_forecast_hours,
            timeout: config.nowcast_timeout(),
        }
    }

    pub async fn fetch(&self, at: Coordinate) -> Result<NowcastSeries> {
        let request = self.client.get(&self.url).query(&[
            ("latitude", at.lat.to_string()),
            ("longitude", at.lon.to_string()),
            (
                "minutely_15",
                "precipitation,precipitation_probability".to_string(),
            ),
            ("forecast_hours", self.forecast_hours.to_string()),
        ]);

        let response: ForecastResponse = get_json(request, SERVICE, self.timeout).await?;
        let series = NowcastSeries::try_from(response)?;
        debug!(
            "Nowcast for ({:.4}, {:.4}): {} steps, first={:?}",
            at.lat,
            at.lon,
            series.len(),
            series.precipitation.first()
        );
        Ok(series)
    }
}

impl NowcastSource for OpenMeteoNowcastClient {
    async fn nowcast(&self, at: Coordinate) -> Result<NowcastSeries> {
        self.fetch(at).await
    }
}
