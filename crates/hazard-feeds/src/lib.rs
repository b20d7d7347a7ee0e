//! Hazard Feeds
//!
//! Upstream data sources for the flood-risk pipeline, each behind a trait so
//! the pipeline can be driven by live HTTP clients or by in-process fakes:
//!
//! | Trait              | Live client              | Service |
//! |--------------------|--------------------------|---------|
//! | `ElevationSampler` | `OpenElevationClient`    | Open-Elevation point lookup |
//! | `NowcastSource`    | `OpenMeteoNowcastClient` | Open-Meteo 15-minute precipitation |
//! | `TideSource`       | `WorldTidesClient`       | WorldTides v3 extremes/heights |
//!
//! Every call returns `Result<_, FeedError>`. Fallback values are chosen by
//! the caller, never here.

use std::future::Future;
use std::time::Duration;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use risk_grid::Coordinate;

pub mod config;
pub mod elevation;
pub mod nowcast;
pub mod tides;

pub use config::FeedsConfig;
pub use elevation::OpenElevationClient;
pub use nowcast::{NowcastSeries, OpenMeteoNowcastClient, WeatherSample};
pub use tides::{TideExtreme, TideHeight, TideKind, TideReport, TideSample, WorldTidesClient};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
    #[error("{service} request failed: {message}")]
    RequestFailed { service: &'static str, message: String },
    #[error("{service} timed out after {after:?}")]
    Timeout { service: &'static str, after: Duration },
    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },
    #[error("{service} response could not be parsed: {message}")]
    Parse { service: &'static str, message: String },
    #[error("{service} response is missing {field}")]
    MissingField { service: &'static str, field: &'static str },
    #[error("{service} reported an error: {message}")]
    Upstream { service: &'static str, message: String },
    #[error("{service} is not configured: {setting} is unset")]
    NotConfigured { service: &'static str, setting: &'static str },
    #[error("{service} returned no data")]
    NoData { service: &'static str },
}

pub type Result<T> = std::result::Result<T, FeedError>;

/// Point elevation lookup, in meters.
pub trait ElevationSampler: Send + Sync {
    fn sample(&self, at: Coordinate) -> impl Future<Output = Result<f64>> + Send;
}

/// Short-term precipitation nowcast; the first entry of each series is "now".
pub trait NowcastSource: Send + Sync {
    fn nowcast(&self, at: Coordinate) -> impl Future<Output = Result<NowcastSeries>> + Send;
}

/// Tide extremes and/or heights around the current time.
pub trait TideSource: Send + Sync {
    fn tides(&self, at: Coordinate) -> impl Future<Output = Result<TideReport>> + Send;
}

/// The three live clients sharing one connection pool.
#[derive(Debug, Clone)]
pub struct HttpFeeds {
    pub elevation: OpenElevationClient,
    pub nowcast: OpenMeteoNowcastClient,
    pub tides: WorldTidesClient,
}

impl HttpFeeds {
    pub fn new(config: FeedsConfig) -> Result<Self> {
        let client = config.http_client()?;
        Ok(Self {
            elevation: OpenElevationClient::with_client(client.clone(), &config),
            nowcast: OpenMeteoNowcastClient::with_client(client.clone(), &config),
            tides: WorldTidesClient::with_client(client, &config),
        })
    }
}

/// Send a request with `timeout` and decode a JSON body.
pub(crate) async fn get_json<T: DeserializeOwned>(
    request: RequestBuilder,
    service: &'static str,
    timeout: Duration,
) -> Result<T> {
    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| transport_error(service, timeout, e))?;

    if !response.status().is_success() {
        return Err(FeedError::Status {
            service,
            status: response.status().as_u16(),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| transport_error(service, timeout, e))?;

    serde_json::from_str(&body).map_err(|e| FeedError::Parse {
        service,
        message: e.to_string(),
    })
}

fn transport_error(service: &'static str, timeout: Duration, e: reqwest::Error) -> FeedError {
    if e.is_timeout() {
        FeedError::Timeout { service, after: timeout }
    } else {
        FeedError::RequestFailed {
            service,
            message: e.to_string(),
        }
    }
}
