use std::time::Duration;

use flood_risk::{ElevationBands, RiskScorer};
use risk_grid::DEFAULT_MAX_CELLS;
use serde::{Deserialize, Serialize};

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Default radius for risk zones (km)
    pub radius_km: f64,
    /// Default cell side for risk zones (km)
    pub cell_km: f64,
    /// Default radius for the raw elevation grid (km)
    pub grid_radius_km: f64,
    /// Default cell side for the raw elevation grid (km)
    pub grid_cell_km: f64,
    /// Concurrent elevation lookups per batch
    pub batch_size: usize,
    pub max_cells: usize,
    /// How long a risk-zone request waits for a grid build. The build runs on
    /// and still fills the cache.
    pub grid_timeout_sec: u64,
    pub cache_capacity: usize,
    pub cache_ttl_sec: u64,
    pub bands: ElevationBands,
    pub scorer: RiskScorer,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            radius_km: 10.0,
            cell_km: 1.0,
            grid_radius_km: 15.0,
            grid_cell_km: 0.5,
            batch_size: 10,
            max_cells: DEFAULT_MAX_CELLS,
            grid_timeout_sec: 30,
            cache_capacity: 50,
            cache_ttl_sec: 30 * 60,
            bands: ElevationBands::default(),
            scorer: RiskScorer::default(),
        }
    }
}

impl PipelineConfig {
    pub fn grid_timeout(&self) -> Duration {
        Duration::from_secs(self.grid_timeout_sec)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_sec)
    }
}
