//! Flood Risk Library
//!
//! Pure, I/O-free building blocks of the risk-zone computation:
//! - Elevation banding (fixed ascending band bounds in meters)
//! - Linear risk scoring from rainfall, rain probability, tide and elevation
//! - Hard threshold classification of a cell as "at risk"
//!
//! # Scoring Model
//!
//! ```text
//! score = a·rate + b·prob + c·tide − d·elev
//! risky = rate ≥ 2 ∧ prob ≥ 70 ∧ tide ≥ 1.5 ∧ elev ≤ 1.5
//! ```
//!
//! | Term | Default | Unit |
//! |------|---------|------|
//! | a    | 1.0     | per mm/h rainfall rate |
//! | b    | 0.2     | per % rain probability |
//! | c    | 0.8     | per m tide height |
//! | d    | 1.2     | per m band-midpoint elevation |

use thiserror::Error;

pub mod bands;
pub mod scorer;

pub use bands::{ElevationBand, ElevationBands, DEFAULT_BAND_BOUNDS};
pub use scorer::{RiskAssessment, RiskScorer, RiskThresholds, RiskWeights};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error("Invalid band bounds: {0}")]
    InvalidBands(String),
}

pub type Result<T> = std::result::Result<T, RiskError>;
