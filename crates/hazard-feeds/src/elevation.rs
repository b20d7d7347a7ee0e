//! Open-Elevation point lookup

use std::time::Duration;

use serde::Deserialize;
use tracing::trace;

use crate::{get_json, Coordinate, ElevationSampler, FeedError, FeedsConfig, Result};

const SERVICE: &str = "open-elevation";

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    #[serde(default)]
    elevation: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct OpenElevationClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl OpenElevationClient {
    pub fn new(config: &FeedsConfig) -> Result<Self> {
        Ok(Self::with_client(config.http_client()?, config))
    }

    pub fn with_client(client: reqwest::Client, config: &FeedsConfig) -> Self {
        Self {
            client,
            url: config.elevation_url.clone(),
            timeout: config.elevation_timeout(),
        }
    }

    pub async fn lookup(&self, at: Coordinate) -> Result<f64> {
        let request = self
            .client
            .get(&self.url)
            .query(&[("locations", format!("{},{}", at.lat, at.lon))]);

        let response: LookupResponse = get_json(request, SERVICE, self.timeout).await?;
        let elevation = first_elevation(&response)?;
        trace!("Elevation at ({}, {}) = {} m", at.lat, at.lon, elevation);
        Ok(elevation)
    }
}

fn first_elevation(response: &LookupResponse) -> Result<f64> {
    response
        .results
        .first()
        .and_then(|r| r.elevation)
        .filter(|e| e.is_finite())
        .ok_or(FeedError::MissingField {
            service: SERVICE,
            field: "results[0].elevation",
        })
}

impl ElevationSampler for OpenElevationClient {
    async fn sample(&self, at: Coordinate) -> Result<f64> {
        self.lookup(at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<f64> {
        let response: LookupResponse = serde_json::from_str(body).unwrap();
        first_elevation(&response)
    }

    #[test]
    fn test_parse_elevation() {
        let body = r#"{"results":[{"latitude":16.05,"longitude":108.2,"elevation":3.0}]}"#;
        assert_eq!(parse(body).unwrap(), 3.0);
    }

    #[test]
    fn test_null_elevation_is_missing() {
        let body = r#"{"results":[{"latitude":16.05,"longitude":108.2,"elevation":null}]}"#;
        assert!(matches!(parse(body), Err(FeedError::MissingField { .. })));
    }

    #[test]
    fn test_empty_results_is_missing() {
        assert!(matches!(parse(r#"{"results":[]}"#), Err(FeedError::MissingField { .. })));
        assert!(matches!(parse("{}"), Err(FeedError::MissingField { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_an_error() {
        let config = FeedsConfig {
            elevation_url: "http://127.0.0.1:9/lookup".to_string(),
            elevation_timeout_sec: 2,
            ..Default::default()
        };
        let client = OpenElevationClient::new(&config).unwrap();
        let result = client.sample(Coordinate { lat: 16.0, lon: 108.0 }).await;
        assert!(matches!(
            result,
            Err(FeedError::RequestFailed { .. }) | Err(FeedError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_silent_service_times_out() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = FeedsConfig {
            elevation_url: format!("http://{}/lookup", addr),
            elevation_timeout_sec: 1,
            ..Default::default()
        };
        let client = OpenElevationClient::new(&config).unwrap();
        let result = client.sample(Coordinate { lat: 16.0, lon: 108.0 }).await;

        match result {
            Err(FeedError::Timeout { service, after }) => {
                assert_eq!(service, "open-elevation");
                assert_eq!(after, Duration::from_secs(1));
            }
            other => panic!("expected a timeout, got {:?}", other),
        }
    }
}
