//! Risk-zone orchestration
//!
//! The nowcast, the tide and the banded grid are fetched concurrently and each
//! result is inspected on its own. Weather and tide failures fall back to
//! zero values; a grid failure short-circuits to an empty collection.
//!
//! Grid builds run on their own task. `grid_timeout` bounds how long a
//! risk-zone request waits for one, not the build itself, so a slow build
//! still fills the cache for the requests that follow.

use std::sync::Arc;

use chrono::Utc;
use flood_risk::{RiskScorer, RiskThresholds};
use geojson::{FeatureCollection, JsonValue};
use hazard_feeds::{
    Coordinate, ElevationSampler, NowcastSource, TideSample, TideSource, WeatherSample,
};
use risk_grid::GridBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bander::{feature, BandedGrid, ElevationBander};
use crate::cache::ResultCache;
use crate::{PipelineConfig, PipelineError, Result};

/// Tide height used when no tide is available.
pub const FALLBACK_TIDE_M: f64 = 0.0;

/// Per-request overrides for [`RiskZonePipeline::compute_risk_zones`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct RiskOptions {
    pub radius_km: Option<f64>,
    pub cell_km: Option<f64>,
    pub thresholds: Option<RiskThresholds>,
}

/// Per-request overrides for [`RiskZonePipeline::elevation_grid`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct GridOptions {
    pub radius_km: Option<f64>,
    pub cell_km: Option<f64>,
}

/// Whether an empty result means "no risk" or "nothing could be computed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneStatus {
    Computed,
    Unavailable,
}

impl ZoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneStatus::Computed => "computed",
            ZoneStatus::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskZones {
    /// Risky cells only
    pub collection: FeatureCollection,
    pub status: ZoneStatus,
    pub weather: WeatherSample,
    pub tide: TideSample,
}

impl RiskZones {
    fn unavailable(weather: WeatherSample, tide: TideSample) -> Self {
        Self {
            collection: empty_collection(),
            status: ZoneStatus::Unavailable,
            weather,
            tide,
        }
    }
}

fn empty_collection() -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}

pub struct RiskZonePipeline<E, W, T> {
    config: PipelineConfig,
    grid_builder: GridBuilder,
    bander: Arc<ElevationBander<E>>,
    nowcast: W,
    tides: T,
    cache: Arc<ResultCache<BandedGrid>>,
}

impl<E, W, T> RiskZonePipeline<E, W, T>
where
    E: ElevationSampler + 'static,
    W: NowcastSource,
    T: TideSource,
{
    pub fn new(config: PipelineConfig, elevation: E, nowcast: W, tides: T) -> Self {
        let cache = ResultCache::new(config.cache_capacity, config.cache_ttl());
        let bander = ElevationBander::new(elevation, config.bands.clone(), config.batch_size);
        Self {
            grid_builder: GridBuilder::new(config.max_cells),
            bander: Arc::new(bander),
            nowcast,
            tides,
            cache: Arc::new(cache),
            config,
        }
    }

    /// Replace the grid cache, e.g. to share one between pipelines.
    pub fn with_cache(mut self, cache: Arc<ResultCache<BandedGrid>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResultCache<BandedGrid>> {
        &self.cache
    }

    pub fn nowcast_source(&self) -> &W {
        &self.nowcast
    }

    pub fn tide_source(&self) -> &T {
        &self.tides
    }

    /// Risky cells around `center`.
    ///
    /// Only invalid input is an error. Upstream failures degrade to fallback
    /// values, or to an empty collection with [`ZoneStatus::Unavailable`] when
    /// the grid itself cannot be built.
    pub async fn compute_risk_zones(
        &self,
        center: Coordinate,
        options: RiskOptions,
    ) -> Result<RiskZones> {
        let radius_km = options.radius_km.unwrap_or(self.config.radius_km);
        let cell_km = options.cell_km.unwrap_or(self.config.cell_km);
        validate(center, radius_km, cell_km)?;

        let (weather, tide, grid) = tokio::join!(
            self.current_weather(center),
            self.current_tide(center),
            self.banded_grid_within(center, radius_km, cell_km),
        );

        let grid = match grid {
            Ok(grid) => grid,
            Err(e) => {
                warn!(
                    "No risk zones for ({:.5}, {:.5}): grid unavailable: {}",
                    center.lat, center.lon, e
                );
                return Ok(RiskZones::unavailable(weather, tide));
            }
        };

        let scorer = match options.thresholds {
            Some(thresholds) => self.config.scorer.with_thresholds(thresholds),
            None => self.config.scorer,
        };
        let collection = score_cells(&grid, &scorer, weather, tide);

        info!(
            "Risk zones for ({:.5}, {:.5}): {}/{} cells at risk (rate={} prob={} tide={})",
            center.lat,
            center.lon,
            collection.features.len(),
            grid.len(),
            weather.rate,
            weather.probability,
            tide.height
        );

        Ok(RiskZones {
            collection,
            status: ZoneStatus::Computed,
            weather,
            tide,
        })
    }

    /// Every banded cell around `center`, served from the cache when fresh.
    ///
    /// Waits for the build to finish; only the per-sample timeouts bound it.
    pub async fn elevation_grid(
        &self,
        center: Coordinate,
        options: GridOptions,
    ) -> Result<Arc<BandedGrid>> {
        let radius_km = options.radius_km.unwrap_or(self.config.grid_radius_km);
        let cell_km = options.cell_km.unwrap_or(self.config.grid_cell_km);
        validate(center, radius_km, cell_km)?;
        self.banded_grid(center, radius_km, cell_km).await
    }

    /// First nowcast entry, or no rain when the nowcast is unavailable.
    pub async fn current_weather(&self, center: Coordinate) -> WeatherSample {
        match self.nowcast.nowcast(center).await {
            Ok(series) => WeatherSample::from_series(&series),
            Err(e) => {
                warn!(
                    "Nowcast unavailable for ({:.5}, {:.5}), assuming no rain: {}",
                    center.lat, center.lon, e
                );
                WeatherSample::default()
            }
        }
    }

    /// Most imminent tide extreme, or [`FALLBACK_TIDE_M`].
    pub async fn current_tide(&self, center: Coordinate) -> TideSample {
        let fallback = TideSample {
            height: FALLBACK_TIDE_M,
        };
        match self.tides.tides(center).await {
            Ok(report) => report.sample(Utc::now().timestamp()).unwrap_or_else(|| {
                warn!(
                    "Tide report for ({:.5}, {:.5}) has no extremes, using {} m",
                    center.lat, center.lon, FALLBACK_TIDE_M
                );
                fallback
            }),
            Err(e) => {
                warn!(
                    "Tide unavailable for ({:.5}, {:.5}), using {} m: {}",
                    center.lat, center.lon, FALLBACK_TIDE_M, e
                );
                fallback
            }
        }
    }

    /// [`Self::banded_grid`], giving up the wait after `grid_timeout`.
    async fn banded_grid_within(
        &self,
        center: Coordinate,
        radius_km: f64,
        cell_km: f64,
    ) -> Result<Arc<BandedGrid>> {
        let timeout = self.config.grid_timeout();
        tokio::time::timeout(timeout, self.banded_grid(center, radius_km, cell_km))
            .await
            .map_err(|_| PipelineError::Timeout(timeout))?
    }

    async fn banded_grid(
        &self,
        center: Coordinate,
        radius_km: f64,
        cell_km: f64,
    ) -> Result<Arc<BandedGrid>> {
        let key = cache_key(center, radius_km, cell_km);
        let grid_builder = self.grid_builder;
        let bander = Arc::clone(&self.bander);
        self.cache
            .get_or_build(&key, move || async move {
                let cells = grid_builder.build(center, radius_km, cell_km)?;
                debug!("Sampling elevation for {} cells", cells.len());
                Ok::<_, PipelineError>(bander.band(cells).await)
            })
            .await
    }
}

/// Grid cache key; fixed precision so equivalent requests share an entry.
pub fn cache_key(center: Coordinate, radius_km: f64, cell_km: f64) -> String {
    format!(
        "iso:{:.5}:{:.5}:{:.3}:{:.3}",
        center.lat, center.lon, radius_km, cell_km
    )
}

fn validate(center: Coordinate, radius_km: f64, cell_km: f64) -> Result<()> {
    if !center.is_valid() {
        return Err(PipelineError::InvalidInput(format!(
            "lat/lon out of range: ({}, {})",
            center.lat, center.lon
        )));
    }
    for (name, value) in [("radiusKm", radius_km), ("cellKm", cell_km)] {
        if !value.is_finite() || value <= 0.0 {
            return Err(PipelineError::InvalidInput(format!(
                "{} must be a positive number, got {}",
                name, value
            )));
        }
    }
    Ok(())
}

/// Score every banded cell at its band midpoint and keep the risky ones, in
/// grid order.
fn score_cells(
    grid: &BandedGrid,
    scorer: &RiskScorer,
    weather: WeatherSample,
    tide: TideSample,
) -> FeatureCollection {
    let features = grid
        .cells
        .iter()
        .filter_map(|cell| {
            let mid = cell.band.midpoint();
            let assessment = scorer.assess(weather.rate, weather.probability, tide.height, mid);
            if !assessment.risky {
                return None;
            }

            let mut properties = cell.properties();
            properties.insert("rate".to_string(), JsonValue::from(weather.rate));
            properties.insert("prob".to_string(), JsonValue::from(weather.probability));
            properties.insert("tideLevel".to_string(), JsonValue::from(tide.height));
            properties.insert("mid".to_string(), JsonValue::from(mid));
            properties.insert("risk".to_string(), JsonValue::from(assessment.risky));
            properties.insert("score".to_string(), JsonValue::from(assessment.score));
            Some(feature(cell, properties))
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
