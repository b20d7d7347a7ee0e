//! Elevation banding
//!
//! A band is the half-open interval `[low, up)`. The first band starts at 0,
//! every later band starts at the previous upper bound. Elevations at or above
//! the last bound belong to no band.

use serde::{Deserialize, Serialize};

use crate::{Result, RiskError};

/// Default band upper bounds in meters.
pub const DEFAULT_BAND_BOUNDS: [f64; 5] = [0.5, 1.0, 1.5, 2.0, 3.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationBand {
    pub low: f64,
    pub up: f64,
}

impl ElevationBand {
    /// Representative elevation used for risk scoring.
    pub fn midpoint(&self) -> f64 {
        (self.low + self.up) / 2.0
    }

    /// Display label such as `"0-0.5"` or `"2-3"`.
    pub fn label(&self) -> String {
        format!("{}-{}", self.low, self.up)
    }
}

/// Ascending sequence of band upper bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct ElevationBands {
    bounds: Vec<f64>,
}

impl ElevationBands {
    pub fn new(bounds: Vec<f64>) -> Result<Self> {
        if bounds.is_empty() {
            return Err(RiskError::InvalidBands("no bounds given".to_string()));
        }
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(RiskError::InvalidBands("bounds must be finite".to_string()));
        }
        if bounds[0] <= 0.0 {
            return Err(RiskError::InvalidBands(format!(
                "first bound must be positive, got {}",
                bounds[0]
            )));
        }
        if bounds.windows(2).any(|w| w[1] <= w[0]) {
            return Err(RiskError::InvalidBands(format!(
                "bounds must be strictly ascending: {:?}",
                bounds
            )));
        }
        Ok(Self { bounds })
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// All bands in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ElevationBand> + '_ {
        self.bounds.iter().enumerate().map(|(i, &up)| ElevationBand {
            low: if i == 0 { 0.0 } else { self.bounds[i - 1] },
            up,
        })
    }

    /// The first band whose upper bound exceeds `elevation`.
    ///
    /// Returns `None` above the last bound and for NaN.
    pub fn classify(&self, elevation: f64) -> Option<ElevationBand> {
        self.iter().find(|band| elevation < band.up)
    }

    pub fn lowest(&self) -> ElevationBand {
        ElevationBand {
            low: 0.0,
            up: self.bounds[0],
        }
    }
}

impl Default for ElevationBands {
    fn default() -> Self {
        Self {
            bounds: DEFAULT_BAND_BOUNDS.to_vec(),
        }
    }
}

impl TryFrom<Vec<f64>> for ElevationBands {
    type Error = RiskError;

    fn try_from(bounds: Vec<f64>) -> Result<Self> {
        Self::new(bounds)
    }
}

impl From<ElevationBands> for Vec<f64> {
    fn from(bands: ElevationBands) -> Self {
        bands.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_classify_default_bands() {
        let bands = ElevationBands::default();

        assert_eq!(bands.classify(0.0), Some(ElevationBand { low: 0.0, up: 0.5 }));
        assert_eq!(bands.classify(0.49), Some(ElevationBand { low: 0.0, up: 0.5 }));
        // Upper bound is exclusive
        assert_eq!(bands.classify(0.5), Some(ElevationBand { low: 0.5, up: 1.0 }));
        assert_eq!(bands.classify(1.0), Some(ElevationBand { low: 1.0, up: 1.5 }));
        assert_eq!(bands.classify(2.99), Some(ElevationBand { low: 2.0, up: 3.0 }));
        assert_eq!(bands.classify(3.0), None);
        assert_eq!(bands.classify(120.0), None);
        assert_eq!(bands.classify(f64::NAN), None);
    }

    #[test]
    fn test_negative_elevation_lands_in_lowest_band() {
        let bands = ElevationBands::default();
        assert_eq!(bands.classify(-2.0), Some(bands.lowest()));
    }

    #[test]
    fn test_midpoint_and_label() {
        let band = ElevationBand { low: 0.5, up: 1.0 };
        assert!((band.midpoint() - 0.75).abs() < 1e-12);
        assert_eq!(band.label(), "0.5-1");
        assert_eq!(ElevationBand { low: 0.0, up: 0.5 }.label(), "0-0.5");
        assert_eq!(ElevationBand { low: 2.0, up: 3.0 }.label(), "2-3");
    }

    #[test]
    fn test_rejects_bad_bounds() {
        assert!(ElevationBands::new(vec![]).is_err());
        assert!(ElevationBands::new(vec![0.0, 1.0]).is_err());
        assert!(ElevationBands::new(vec![1.0, 1.0]).is_err());
        assert!(ElevationBands::new(vec![2.0, 1.0]).is_err());
        assert!(ElevationBands::new(vec![1.0, f64::INFINITY]).is_err());
        assert!(ElevationBands::new(vec![0.25, 4.0]).is_ok());
    }

    #[test]
    fn test_bands_deserialize_validates() {
        let ok: ElevationBands = serde_json::from_str("[1.0, 2.0]").expect("valid bounds");
        assert_eq!(ok.bounds(), &[1.0, 2.0]);
        assert!(serde_json::from_str::<ElevationBands>("[2.0, 1.0]").is_err());
    }

    proptest! {
        #[test]
        fn fuzz_classify_is_deterministic(e in -50.0f64..50.0) {
            let bands = ElevationBands::default();
            prop_assert_eq!(bands.classify(e), bands.classify(e));
        }

        #[test]
        fn fuzz_band_contains_elevation(e in 0.0f64..3.0) {
            let bands = ElevationBands::default();
            let band = bands.classify(e).expect("elevation below last bound has a band");
            prop_assert!(band.low <= e && e < band.up);
        }
    }
}
