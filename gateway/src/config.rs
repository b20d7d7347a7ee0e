//! Environment configuration

use std::str::FromStr;

use anyhow::{Context, Result};
use hazard_feeds::FeedsConfig;
use risk_zones::PipelineConfig;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub feeds: FeedsConfig,
    pub pipeline: PipelineConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            feeds: FeedsConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Defaults overridden by `FLOODWATCH_PORT`/`PORT`, `WORLDTIDES_KEY`,
    /// `ELEVATION_API_URL`, `OPEN_METEO_URL`, `WORLDTIDES_API_URL`,
    /// `RISK_CACHE_TTL_SECS` and `RISK_CACHE_CAPACITY`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        let port = lookup("FLOODWATCH_PORT").or_else(|| lookup("PORT"));
        if let Some(port) = port {
            config.port = parse("FLOODWATCH_PORT", &port)?;
        }

        if let Some(key) = lookup("WORLDTIDES_KEY").filter(|k| !k.is_empty()) {
            config.feeds.worldtides_key = Some(key);
        }
        if let Some(url) = lookup("ELEVATION_API_URL") {
            config.feeds.elevation_url = url;
        }
        if let Some(url) = lookup("OPEN_METEO_URL") {
            config.feeds.open_meteo_url = url;
        }
        if let Some(url) = lookup("WORLDTIDES_API_URL") {
            config.feeds.worldtides_url = url;
        }

        if let Some(ttl) = lookup("RISK_CACHE_TTL_SECS") {
            config.pipeline.cache_ttl_sec = parse("RISK_CACHE_TTL_SECS", &ttl)?;
        }
        if let Some(capacity) = lookup("RISK_CACHE_CAPACITY") {
            config.pipeline.cache_capacity = parse("RISK_CACHE_CAPACITY", &capacity)?;
        }

        Ok(config)
    }
}

fn parse<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{} has an invalid value: {:?}", name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<GatewayConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.feeds.worldtides_key, None);
        assert_eq!(config.pipeline.cache_capacity, 50);
        assert_eq!(config.pipeline.cache_ttl_sec, 1800);
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("WORLDTIDES_KEY", "secret"),
            ("OPEN_METEO_URL", "http://localhost:9000/v1/forecast"),
            ("RISK_CACHE_TTL_SECS", "60"),
            ("RISK_CACHE_CAPACITY", "5"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.feeds.worldtides_key.as_deref(), Some("secret"));
        assert_eq!(config.feeds.open_meteo_url, "http://localhost:9000/v1/forecast");
        assert_eq!(config.pipeline.cache_ttl_sec, 60);
        assert_eq!(config.pipeline.cache_capacity, 5);
    }

    #[test]
    fn test_floodwatch_port_wins() {
        let config = from_pairs(&[("FLOODWATCH_PORT", "4000"), ("PORT", "8080")]).unwrap();
        assert_eq!(config.port, 4000);
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        assert!(from_pairs(&[("RISK_CACHE_CAPACITY", "lots")]).is_err());
        assert!(from_pairs(&[("PORT", "-1")]).is_err());
    }
}
