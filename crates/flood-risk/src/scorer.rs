//! Risk scoring for a single grid cell.
//!
//! `elev` is always the midpoint of the cell's elevation band, never the raw
//! sample.

use serde::{Deserialize, Serialize};

/// Linear weights of the risk score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    /// `a`: weight on rainfall rate (mm/h)
    pub rain_rate: f64,
    /// `b`: weight on rain probability (%)
    pub rain_probability: f64,
    /// `c`: weight on tide height (m)
    pub tide: f64,
    /// `d`: weight subtracted per meter of elevation
    pub elevation: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            rain_rate: 1.0,
            rain_probability: 0.2,
            tide: 0.8,
            elevation: 1.2,
        }
    }
}

/// All four must hold for a cell to be classified as at risk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub min_rate_mm_h: f64,
    pub min_probability_pct: f64,
    pub min_tide_m: f64,
    pub max_elevation_m: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            min_rate_mm_h: 2.0,
            min_probability_pct: 70.0,
            min_tide_m: 1.5,
            max_elevation_m: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: f64,
    pub risky: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskScorer {
    pub weights: RiskWeights,
    pub thresholds: RiskThresholds,
}

impl RiskScorer {
    pub fn new(weights: RiskWeights, thresholds: RiskThresholds) -> Self {
        Self {
            weights,
            thresholds,
        }
    }

    pub fn with_thresholds(mut self, thresholds: RiskThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Unbounded linear score; higher means more exposed.
    pub fn score(&self, rate: f64, prob: f64, tide: f64, elev: f64) -> f64 {
        let w = &self.weights;
        w.rain_rate * rate + w.rain_probability * prob + w.tide * tide - w.elevation * elev
    }

    pub fn is_risky(&self, rate: f64, prob: f64, tide: f64, elev: f64) -> bool {
        let t = &self.thresholds;
        rate >= t.min_rate_mm_h
            && prob >= t.min_probability_pct
            && tide >= t.min_tide_m
            && elev <= t.max_elevation_m
    }

    pub fn assess(&self, rate: f64, prob: f64, tide: f64, elev: f64) -> RiskAssessment {
        RiskAssessment {
            score: self.score(rate, prob, tide, elev),
            risky: self.is_risky(rate, prob, tide, elev),
        }
    }
}
