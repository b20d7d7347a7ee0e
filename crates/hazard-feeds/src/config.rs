//! Upstream feed configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{FeedError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedsConfig {
    /// Open-Elevation lookup endpoint
    pub elevation_url: String,
    /// Open-Meteo forecast endpoint
    pub open_meteo_url: String,
    /// WorldTides v3 endpoint
    pub worldtides_url: String,
    /// WorldTides API key; tide lookups are skipped without one
    pub worldtides_key: Option<String>,
    pub elevation_timeout_sec: u64,
    pub nowcast_timeout_sec: u64,
    pub tide_timeout_sec: u64,
    /// Hours of 15-minute nowcast to request
    pub nowcast_forecast_hours: u32,
    /// Tide window starts this many hours before now
    pub tide_lookback_hours: i64,
    /// Tide window ends this many hours after now
    pub tide_lookahead_hours: i64,
    pub user_agent: String,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            elevation_url: "https://api.open-elevation.com/api/v1/lookup".to_string(),
            open_meteo_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            worldtides_url: "https://www.worldtides.info/api/v3".to_string(),
            worldtides_key: None,
            elevation_timeout_sec: 10,
            nowcast_timeout_sec: 10,
            tide_timeout_sec: 15,
            nowcast_forecast_hours: 6,
            tide_lookback_hours: 6,
            tide_lookahead_hours: 12,
            user_agent: concat!("floodwatch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FeedsConfig {
    pub fn elevation_timeout(&self) -> Duration {
        Duration::from_secs(self.elevation_timeout_sec)
    }

    pub fn nowcast_timeout(&self) -> Duration {
        Duration::from_secs(self.nowcast_timeout_sec)
    }

    pub fn tide_timeout(&self) -> Duration {
        Duration::from_secs(self.tide_timeout_sec)
    }

    /// Shared pooled client; per-request timeouts are applied by each feed.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| FeedError::Client(e.to_string()))
    }
}
