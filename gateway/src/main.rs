use anyhow::Result;
use axum::{routing::get, Json, Router};
use hazard_feeds::{HttpFeeds, OpenElevationClient, OpenMeteoNowcastClient, WorldTidesClient};
use risk_zones::RiskZonePipeline;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod routes;

use config::GatewayConfig;

pub type LivePipeline =
    RiskZonePipeline<OpenElevationClient, OpenMeteoNowcastClient, WorldTidesClient>;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<LivePipeline>,
}

impl AppState {
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let feeds = HttpFeeds::new(config.feeds.clone())?;
        if !feeds.tides.is_configured() {
            tracing::warn!("WORLDTIDES_KEY not set, tide height will fall back to 0 m");
        }

        let pipeline = RiskZonePipeline::new(
            config.pipeline.clone(),
            feeds.elevation,
            feeds.nowcast,
            feeds.tides,
        );
        Ok(Self {
            pipeline: Arc::new(pipeline),
        })
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", routes::api_routes(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "floodwatch_gateway=debug,risk_zones=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from_env()?;
    let state = AppState::from_config(&config)?;

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("🌊 Floodwatch gateway starting on {}", addr);
    tracing::info!(
        "   Risk zones: r={}km cell={}km, grid cache {} entries / {}s",
        config.pipeline.radius_km,
        config.pipeline.cell_km,
        config.pipeline.cache_capacity,
        config.pipeline.cache_ttl_sec
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "floodwatch-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
