//! Flood-risk API routes
//!
//! Upstream failures never become 5xx here: the pipeline substitutes fallback
//! values and these handlers serve whatever it produced. The exceptions are
//! invalid input (400) and an elevation grid that cannot be built (503).

use axum::{
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hazard_feeds::{Coordinate, NowcastSeries, NowcastSource, TideReport, TideSource, WeatherSample};
use risk_zones::{CacheStats, GridOptions, PipelineError, RiskOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::AppState;

const RISK_STATUS: HeaderName = HeaderName::from_static("x-risk-status");

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/risk-zones", get(get_risk_zones))
        .route("/elevation-grid", get(get_elevation_grid))
        .route("/nowcast", get(get_nowcast))
        .route("/tides", get(get_tides))
        .route("/cache/stats", get(cache_stats))
        .route("/cache/clear", post(clear_cache))
        .with_state(state)
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unavailable(String),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        if e.is_invalid_input() {
            ApiError::BadRequest(e.to_string())
        } else {
            ApiError::Unavailable(e.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

/// Raw query parameters; parsed by hand so bad values get a JSON 400.
#[derive(Deserialize)]
pub struct AreaQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
    #[serde(rename = "radiusKm")]
    pub radius_km: Option<String>,
    #[serde(rename = "cellKm")]
    pub cell_km: Option<String>,
}

impl AreaQuery {
    fn center(&self) -> Result<Coordinate, ApiError> {
        let lat = required("lat", self.lat.as_deref())?;
        let lon = required("lon", self.lon.as_deref())?;
        Coordinate::new(lat, lon).map_err(|e| ApiError::BadRequest(e.to_string()))
    }

    fn sizes(&self) -> Result<(Option<f64>, Option<f64>), ApiError> {
        Ok((
            optional("radiusKm", self.radius_km.as_deref())?,
            optional("cellKm", self.cell_km.as_deref())?,
        ))
    }
}

fn required(name: &str, value: Option<&str>) -> Result<f64, ApiError> {
    optional(name, value)?.ok_or_else(|| ApiError::BadRequest(format!("{} is required", name)))
}

fn optional(name: &str, value: Option<&str>) -> Result<Option<f64>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("{} must be a number, got {:?}", name, v))),
    }
}

/// Risky cells for the current weather and tide.
pub async fn get_risk_zones(
    State(state): State<AppState>,
    Query(query): Query<AreaQuery>,
) -> Result<Response, ApiError> {
    let center = query.center()?;
    let (radius_km, cell_km) = query.sizes()?;

    let options = RiskOptions {
        radius_km,
        cell_km,
        thresholds: None,
    };
    let zones = state.pipeline.compute_risk_zones(center, options).await?;

    Ok((
        [
            (header::CACHE_CONTROL, "no-store"),
            (RISK_STATUS, zones.status.as_str()),
        ],
        Json(zones.collection),
    )
        .into_response())
}

/// Every banded cell, unfiltered by risk.
pub async fn get_elevation_grid(
    State(state): State<AppState>,
    Query(query): Query<AreaQuery>,
) -> Result<Response, ApiError> {
    let center = query.center()?;
    let (radius_km, cell_km) = query.sizes()?;

    let grid = state
        .pipeline
        .elevation_grid(center, GridOptions { radius_km, cell_km })
        .await?;

    Ok((
        [(header::CACHE_CONTROL, "public, max-age=1800")],
        Json(grid.to_feature_collection()),
    )
        .into_response())
}

#[derive(Serialize)]
pub struct NowcastResponse {
    #[serde(flatten)]
    pub series: NowcastSeries,
    pub current: WeatherSample,
}

pub async fn get_nowcast(
    State(state): State<AppState>,
    Query(query): Query<AreaQuery>,
) -> Result<Response, ApiError> {
    let center = query.center()?;

    match state.pipeline.nowcast_source().nowcast(center).await {
        Ok(series) => {
            let current = WeatherSample::from_series(&series);
            Ok((
                [(header::CACHE_CONTROL, "public, s-maxage=300, stale-while-revalidate=600")],
                Json(NowcastResponse { series, current }),
            )
                .into_response())
        }
        Err(e) => {
            tracing::warn!(
                "Nowcast unavailable for ({:.5}, {:.5}), serving zeroed series: {}",
                center.lat,
                center.lon,
                e
            );
            let series = NowcastSeries::empty();
            let current = WeatherSample::from_series(&series);
            Ok(Json(NowcastResponse { series, current }).into_response())
        }
    }
}

pub async fn get_tides(
    State(state): State<AppState>,
    Query(query): Query<AreaQuery>,
) -> Result<Json<TideReport>, ApiError> {
    let center = query.center()?;

    let report = state
        .pipeline
        .tide_source()
        .tides(center)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(
                "Tides unavailable for ({:.5}, {:.5}), serving empty report: {}",
                center.lat,
                center.lon,
                e
            );
            TideReport::default()
        });

    Ok(Json(report))
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.pipeline.cache().stats())
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<CacheStats> {
    state.pipeline.cache().clear();
    tracing::info!("Grid cache cleared");
    Json(state.pipeline.cache().stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    /// Every upstream points at a closed local port.
    fn offline_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.feeds.elevation_url = "http://127.0.0.1:9/api/v1/lookup".to_string();
        config.feeds.open_meteo_url = "http://127.0.0.1:9/v1/forecast".to_string();
        config.feeds.worldtides_url = "http://127.0.0.1:9/api/v3".to_string();
        config.feeds.worldtides_key = Some("test".to_string());
        config.feeds.elevation_timeout_sec = 2;
        config.feeds.nowcast_timeout_sec = 2;
        config.feeds.tide_timeout_sec = 2;
        config
    }

    fn offline_app(config: GatewayConfig) -> Router {
        crate::app(AppState::from_config(&config).unwrap())
    }

    async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, headers, body)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, _, body) = send(offline_app(offline_config()), "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "floodwatch-gateway");
    }

    #[tokio::test]
    async fn test_missing_or_bad_coordinates_are_rejected() {
        let app = offline_app(offline_config());
        for uri in [
            "/api/v1/risk-zones?lon=108.2",
            "/api/v1/risk-zones?lat=abc&lon=108.2",
            "/api/v1/risk-zones?lat=95&lon=108.2",
            "/api/v1/elevation-grid?lat=16.05&lon=108.2&radiusKm=0",
            "/api/v1/elevation-grid?lat=16.05&lon=108.2&cellKm=-1",
            "/api/v1/nowcast?lat=16.05",
            "/api/v1/tides",
        ] {
            let (status, _, body) = send(app.clone(), "GET", uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert!(body["error"].is_string(), "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_risk_zones_degrade_when_offline() {
        let app = offline_app(offline_config());
        let (status, headers, body) = send(
            app,
            "GET",
            "/api/v1/risk-zones?lat=16.0544&lon=108.2022&radiusKm=1&cellKm=1",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CACHE_CONTROL], "no-store");
        // Grid still builds from fallback elevations; no rain means no risk
        assert_eq!(headers[RISK_STATUS], "computed");
        assert_eq!(body, serde_json::json!({"type": "FeatureCollection", "features": []}));
    }

    #[tokio::test]
    async fn test_risk_zones_unavailable_when_grid_fails() {
        let mut config = offline_config();
        config.pipeline.max_cells = 1;
        let (status, headers, body) = send(
            offline_app(config),
            "GET",
            "/api/v1/risk-zones?lat=16.0544&lon=108.2022",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[RISK_STATUS], "unavailable");
        assert_eq!(body["features"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_elevation_grid_is_cached() {
        let app = offline_app(offline_config());
        let uri = "/api/v1/elevation-grid?lat=16.0544&lon=108.2022&radiusKm=1&cellKm=1";

        let (status, headers, body) = send(app.clone(), "GET", uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=1800");
        let features = body["features"].as_array().unwrap();
        assert!(!features.is_empty());
        assert_eq!(features[0]["properties"]["band"], "0-0.5");
        assert_eq!(features[0]["properties"]["elev"], 0.0);
        assert_eq!(features[0]["geometry"]["type"], "Polygon");

        let (_, _, stats) = send(app.clone(), "GET", "/api/v1/cache/stats").await;
        assert_eq!(stats["total_entries"], 1);

        let (_, _, cleared) = send(app, "POST", "/api/v1/cache/clear").await;
        assert_eq!(cleared["total_entries"], 0);
    }

    #[tokio::test]
    async fn test_elevation_grid_unavailable_is_503() {
        let mut config = offline_config();
        config.pipeline.max_cells = 1;
        let (status, _, body) = send(
            offline_app(config),
            "GET",
            "/api/v1/elevation-grid?lat=16.0544&lon=108.2022",
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_nowcast_and_tides_fall_back_when_offline() {
        let app = offline_app(offline_config());

        let (status, _, nowcast) = send(app.clone(), "GET", "/api/v1/nowcast?lat=16.05&lon=108.2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(nowcast["precipitation"], serde_json::json!([0.0]));
        assert_eq!(nowcast["current"]["rate"], 0.0);

        let (status, _, tides) = send(app, "GET", "/api/v1/tides?lat=16.05&lon=108.2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tides, serde_json::json!({"extremes": [], "heights": []}));
    }
}
