//! Risk Zones
//!
//! Turns a center point into flood-risk zones:
//!
//! 1. `GridBuilder` tiles the bounding box of the area of interest.
//! 2. `ElevationBander` samples each cell centroid in sequential batches and
//!    assigns an elevation band; cells above the top band are dropped.
//! 3. `ResultCache` keeps banded grids per `(center, radius, cell)` for a TTL.
//! 4. `RiskZonePipeline` joins the banded grid with the rainfall nowcast and
//!    the tide, scores every cell and keeps the risky ones.
//!
//! Upstream failures never escape the pipeline. Each one is replaced by its
//! fallback (0 m elevation, no rain, 0 m tide) and logged at `warn`. A grid
//! that cannot be built at all yields an empty collection marked
//! [`ZoneStatus::Unavailable`].

use std::time::Duration;

use thiserror::Error;

pub mod bander;
pub mod cache;
pub mod config;
pub mod pipeline;

pub use bander::{BandedCell, BandedGrid, ElevationBander};
pub use cache::{CacheStats, ResultCache};
pub use config::PipelineConfig;
pub use pipeline::{GridOptions, RiskOptions, RiskZonePipeline, RiskZones, ZoneStatus};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Grid build failed: {0}")]
    GridBuild(#[from] risk_grid::GridError),
    #[error("Grid build timed out after {0:?}")]
    Timeout(Duration),
    #[error("Grid build task failed: {0}")]
    BuildTask(#[from] tokio::task::JoinError),
}

impl PipelineError {
    /// Caller errors, as opposed to environmental failures.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, PipelineError::InvalidInput(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
