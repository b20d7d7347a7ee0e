//! Elevation sampling and band assignment

use flood_risk::{ElevationBand, ElevationBands};
use futures::future::join_all;
use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};
use hazard_feeds::ElevationSampler;
use risk_grid::GridCell;
use serde::Serialize;
use tracing::{info, warn};

/// Elevation used when a sample fails.
pub const FALLBACK_ELEVATION_M: f64 = 0.0;

/// A grid cell with its sampled elevation and band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandedCell {
    pub cell: GridCell,
    /// Raw sample in meters, or the fallback
    pub elevation: f64,
    pub band: ElevationBand,
}

impl BandedCell {
    /// Band properties: `band`, `low`, `up`, `elev`.
    pub fn properties(&self) -> JsonObject {
        let mut properties = JsonObject::new();
        properties.insert("band".to_string(), JsonValue::from(self.band.label()));
        properties.insert("low".to_string(), JsonValue::from(self.band.low));
        properties.insert("up".to_string(), JsonValue::from(self.band.up));
        properties.insert("elev".to_string(), JsonValue::from(self.elevation));
        properties
    }

    pub fn to_feature(&self) -> Feature {
        feature(self, self.properties())
    }
}

pub(crate) fn feature(cell: &BandedCell, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(cell.cell.to_geometry()),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Banded cells in generation order, plus sampling counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BandedGrid {
    pub cells: Vec<BandedCell>,
    /// Cells whose elevation came from the fallback
    pub fallbacks: usize,
    /// Cells above the top band
    pub dropped: usize,
}

impl BandedGrid {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self.cells.iter().map(BandedCell::to_feature).collect(),
            foreign_members: None,
        }
    }
}

pub struct ElevationBander<S> {
    sampler: S,
    bands: ElevationBands,
    batch_size: usize,
}

impl<S: ElevationSampler> ElevationBander<S> {
    /// `batch_size` is clamped to at least one.
    pub fn new(sampler: S, bands: ElevationBands, batch_size: usize) -> Self {
        Self {
            sampler,
            bands,
            batch_size: batch_size.max(1),
        }
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn bands(&self) -> &ElevationBands {
        &self.bands
    }

    /// Sample every centroid and band the cells.
    ///
    /// Batches run one after another; the cells of a batch are sampled
    /// concurrently. A failed sample becomes [`FALLBACK_ELEVATION_M`], which
    /// lands in the lowest band.
    pub async fn band(&self, cells: Vec<GridCell>) -> BandedGrid {
        let mut grid = BandedGrid {
            cells: Vec::with_capacity(cells.len()),
            ..Default::default()
        };

        for batch in cells.chunks(self.batch_size) {
            let samples = join_all(batch.iter().map(|cell| self.sample(cell))).await;

            for (cell, sample) in batch.iter().zip(samples) {
                let elevation = sample.unwrap_or_else(|| {
                    grid.fallbacks += 1;
                    FALLBACK_ELEVATION_M
                });
                match self.bands.classify(elevation) {
                    Some(band) => grid.cells.push(BandedCell {
                        cell: *cell,
                        elevation,
                        band,
                    }),
                    None => grid.dropped += 1,
                }
            }
        }

        self.log_histogram(&grid);
        grid
    }

    async fn sample(&self, cell: &GridCell) -> Option<f64> {
        let centroid = cell.centroid();
        match self.sampler.sample(centroid).await {
            Ok(elevation) if elevation.is_finite() => Some(elevation),
            Ok(elevation) => {
                warn!(
                    "Elevation at ({:.5}, {:.5}) is not finite ({}), using {} m",
                    centroid.lat, centroid.lon, elevation, FALLBACK_ELEVATION_M
                );
                None
            }
            Err(e) => {
                warn!(
                    "Elevation lookup failed at ({:.5}, {:.5}), using {} m: {}",
                    centroid.lat, centroid.lon, FALLBACK_ELEVATION_M, e
                );
                None
            }
        }
    }

    fn log_histogram(&self, grid: &BandedGrid) {
        let counts: Vec<String> = self
            .bands
            .iter()
            .map(|band| {
                let count = grid.cells.iter().filter(|c| c.band == band).count();
                format!("{}: {}", band.label(), count)
            })
            .collect();

        info!(
            "Banded {} cells [{}], {} above top band, {} fallbacks",
            grid.cells.len(),
            counts.join(", "),
            grid.dropped,
            grid.fallbacks
        );
    }
}
