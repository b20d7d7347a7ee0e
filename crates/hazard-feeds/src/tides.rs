//! WorldTides v3 extremes and heights
//!
//! When the service returns only a height series, a high/low pair is derived
//! from the series maximum and minimum. That pair is a window heuristic, not a
//! real extremum detector.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{get_json, Coordinate, FeedError, FeedsConfig, Result, TideSource};

const SERVICE: &str = "worldtides";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TideKind {
    High,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TideExtreme {
    /// Unix seconds
    pub dt: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Meters relative to the service datum
    pub height: f64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TideKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TideHeight {
    pub dt: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TideSample {
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TideReport {
    #[serde(default)]
    pub extremes: Vec<TideExtreme>,
    #[serde(default)]
    pub heights: Vec<TideHeight>,
}

impl TideReport {
    pub fn is_empty(&self) -> bool {
        self.extremes.is_empty() && self.heights.is_empty()
    }

    /// Reported extremes, or a high/low pair derived from the height series
    /// ordered by time.
    pub fn derived_extremes(&self) -> Vec<TideExtreme> {
        if !self.extremes.is_empty() {
            return self.extremes.clone();
        }

        let finite = self.heights.iter().filter(|h| h.height.is_finite());
        let max = finite.clone().max_by(|a, b| a.height.total_cmp(&b.height));
        let min = finite.min_by(|a, b| a.height.total_cmp(&b.height));

        let (Some(max), Some(min)) = (max, min) else {
            return Vec::new();
        };
        let to_extreme = |h: &TideHeight, kind| TideExtreme {
            dt: h.dt,
            date: h.date.clone(),
            height: h.height,
            kind: Some(kind),
        };

        if max.dt == min.dt {
            return vec![to_extreme(max, TideKind::High)];
        }
        let mut pair = vec![to_extreme(max, TideKind::High), to_extreme(min, TideKind::Low)];
        pair.sort_by_key(|e| e.dt);
        pair
    }

    /// Most imminent extreme at `now_unix`: the first at or after now,
    /// otherwise the latest one in the window.
    pub fn sample(&self, now_unix: i64) -> Option<TideSample> {
        let mut extremes = self.derived_extremes();
        extremes.sort_by_key(|e| e.dt);

        extremes
            .iter()
            .find(|e| e.dt >= now_unix)
            .or_else(|| extremes.last())
            .map(|e| TideSample { height: e.height })
    }
}

#[derive(Debug, Deserialize)]
struct WorldTidesResponse {
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    extremes: Vec<TideExtreme>,
    #[serde(default)]
    heights: Vec<TideHeight>,
}

impl TryFrom<WorldTidesResponse> for TideReport {
    type Error = FeedError;

    fn try_from(response: WorldTidesResponse) -> Result<Self> {
        if let Some(message) = response.error {
            return Err(FeedError::Upstream {
                service: SERVICE,
                message,
            });
        }
        if let Some(status) = response.status.filter(|s| *s != 200) {
            return Err(FeedError::Upstream {
                service: SERVICE,
                message: format!("status {}", status),
            });
        }

        let report = TideReport {
            extremes: response.extremes,
            heights: response.heights,
        };
        if report.is_empty() {
            return Err(FeedError::NoData { service: SERVICE });
        }
        Ok(report)
    }
}

#[derive(Debug, Clone)]
pub struct WorldTidesClient {
    client: reqwest::Client,
    url: String,
    key: Option<String>,
    lookback_hours: i64,
    lookahead_hours: i64,
    timeout: Duration,
}

impl WorldTidesClient {
    pub fn new(config: &FeedsConfig) -> Result<Self> {
        Ok(Self::with_client(config.http_client()?, config))
    }

    pub fn with_client(client: reqwest::Client, config: &FeedsConfig) -> Self {
        Self {
            client,
            url: config.worldtides_url.clone(),
            key: config.worldtides_key.clone().filter(|k| !k.is_empty()),
            lookback_hours: config.tide_lookback_hours,
            lookahead_hours: config.tide_lookahead_hours,
            timeout: config.tide_timeout(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    pub async fn fetch(&self, at: Coordinate) -> Result<TideReport> {
        let key = self.key.as_deref().ok_or(FeedError::NotConfigured {
            service: SERVICE,
            setting: "WORLDTIDES_KEY",
        })?;

        let start = Utc::now().timestamp() - self.lookback_hours * 3600;
        let length = (self.lookback_hours + self.lookahead_hours) * 3600;

        let request = self
            .client
            .get(format!("{}?extremes&heights", self.url))
            .query(&[
                ("lat", at.lat.to_string()),
                ("lon", at.lon.to_string()),
                ("start", start.to_string()),
                ("length", length.to_string()),
                ("key", key.to_string()),
            ]);

        let response: WorldTidesResponse = get_json(request, SERVICE, self.timeout).await?;
        let report = TideReport::try_from(response)?;
        debug!(
            "Tides for ({:.4}, {:.4}): {} extremes, {} heights",
            at.lat,
            at.lon,
            report.extremes.len(),
            report.heights.len()
        );
        Ok(report)
    }
}

impl TideSource for WorldTidesClient {
    async fn tides(&self, at: Coordinate) -> Result<TideReport> {
        self.fetch(at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn height(dt: i64, height: f64) -> TideHeight {
        TideHeight { dt, date: None, height }
    }

    fn extreme(dt: i64, height: f64, kind: TideKind) -> TideExtreme {
        TideExtreme {
            dt,
            date: None,
            height,
            kind: Some(kind),
        }
    }

    #[test]
    fn test_parse_worldtides_payload() {
        let body = r#"{
            "status": 200,
            "callCount": 1,
            "extremes": [
                {"dt": 1000, "date": "2025-10-27T03:10+0000", "height": 1.6, "type": "High"},
                {"dt": 2000, "date": "2025-10-27T09:20+0000", "height": -0.4, "type": "Low"}
            ]
        }"#;
        let response: WorldTidesResponse = serde_json::from_str(body).unwrap();
        let report = TideReport::try_from(response).unwrap();
        assert_eq!(report.extremes.len(), 2);
        assert_eq!(report.extremes[0].kind, Some(TideKind::High));
        assert!(report.heights.is_empty());
    }

    #[test]
    fn test_error_payload_is_upstream_failure() {
        let body = r#"{"status": 400, "error": "Invalid API key"}"#;
        let response: WorldTidesResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(
            TideReport::try_from(response),
            Err(FeedError::Upstream { .. })
        ));

        let response: WorldTidesResponse = serde_json::from_str(r#"{"status": 200}"#).unwrap();
        assert!(matches!(
            TideReport::try_from(response),
            Err(FeedError::NoData { .. })
        ));
    }

    #[test]
    fn test_sample_picks_most_imminent_extreme() {
        let report = TideReport {
            extremes: vec![
                extreme(100, 0.2, TideKind::Low),
                extreme(500, 1.6, TideKind::High),
                extreme(900, 0.1, TideKind::Low),
            ],
            heights: Vec::new(),
        };
        assert_eq!(report.sample(300), Some(TideSample { height: 1.6 }));
        assert_eq!(report.sample(500), Some(TideSample { height: 1.6 }));
        // Past the window: latest extreme
        assert_eq!(report.sample(1000), Some(TideSample { height: 0.1 }));
    }

    #[test]
    fn test_extremes_derived_from_heights() {
        let report = TideReport {
            extremes: Vec::new(),
            heights: vec![height(0, 0.5), height(100, 1.8), height(200, -0.3), height(300, 0.9)],
        };
        let derived = report.derived_extremes();
        assert_eq!(derived.len(), 2);
        assert_eq!(derived[0], extreme(100, 1.8, TideKind::High));
        assert_eq!(derived[1], extreme(200, -0.3, TideKind::Low));

        assert_eq!(report.sample(50), Some(TideSample { height: 1.8 }));
        assert_eq!(report.sample(150), Some(TideSample { height: -0.3 }));
    }

    #[test]
    fn test_empty_report_has_no_sample() {
        assert_eq!(TideReport::default().sample(0), None);
    }

    #[tokio::test]
    async fn test_missing_key_skips_request() {
        let config = FeedsConfig {
            worldtides_url: "http://127.0.0.1:9/api/v3".to_string(),
            worldtides_key: None,
            ..Default::default()
        };
        let client = WorldTidesClient::new(&config).unwrap();
        assert!(!client.is_configured());
        assert!(matches!(
            client.tides(Coordinate { lat: 16.0, lon: 108.0 }).await,
            Err(FeedError::NotConfigured { .. })
        ));
    }
}
