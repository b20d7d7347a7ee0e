//! Risk Grid Library
//!
//! Geographic primitives for the flood-risk grid:
//! - WGS84 coordinates with range validation
//! - Great-circle distance and destination (haversine, mean Earth radius)
//! - Bounding-box square tessellation around a center point
//! - GeoJSON polygon rendering of grid cells

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

pub mod grid;

pub use grid::{BoundingBox, GridBuilder, GridCell, DEFAULT_MAX_CELLS};

/// Mean Earth radius in km
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

const DEG_TO_RAD: f64 = PI / 180.0;
const RAD_TO_DEG: f64 = 180.0 / PI;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("Invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },
    #[error("Invalid {name}: {value} (must be a positive number)")]
    InvalidDimension { name: &'static str, value: f64 },
    #[error("Grid too large: {cells} cells exceeds limit of {limit}")]
    TooManyCells { cells: usize, limit: usize },
}

pub type Result<T> = std::result::Result<T, GridError>;

/// A (latitude, longitude) pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        let coord = Self { lat, lon };
        if coord.is_valid() {
            Ok(coord)
        } else {
            Err(GridError::InvalidCoordinate { lat, lon })
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// GeoJSON position order: `[lon, lat]`.
    pub fn to_position(&self) -> Vec<f64> {
        vec![self.lon, self.lat]
    }
}

/// Haversine distance between two points in km
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat * DEG_TO_RAD;
    let lat2 = b.lat * DEG_TO_RAD;
    let dlat = (b.lat - a.lat) * DEG_TO_RAD;
    let dlon = (b.lon - a.lon) * DEG_TO_RAD;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Point reached by travelling `distance_km` from `origin` along `bearing_deg`
/// (clockwise from north).
pub fn destination(origin: Coordinate, distance_km: f64, bearing_deg: f64) -> Coordinate {
    let lat1 = origin.lat * DEG_TO_RAD;
    let lon1 = origin.lon * DEG_TO_RAD;
    let bearing = bearing_deg * DEG_TO_RAD;
    let delta = distance_km / EARTH_RADIUS_KM;

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    Coordinate {
        lat: lat2 * RAD_TO_DEG,
        lon: lon2 * RAD_TO_DEG,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(16.0544, 108.2022).is_ok());
        assert!(Coordinate::new(90.0, -180.0).is_ok());
        assert!(Coordinate::new(90.1, 0.0).is_err());
        assert!(Coordinate::new(0.0, 181.0).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_haversine() {
        // NYC to London: ~5,570 km
        let nyc = Coordinate { lat: 40.7128, lon: -74.0060 };
        let london = Coordinate { lat: 51.5074, lon: -0.1278 };
        assert!((haversine_km(nyc, london) - 5570.0).abs() < 50.0);

        assert!(haversine_km(nyc, nyc).abs() < 1e-9);
    }

    #[test]
    fn test_destination_round_trips_distance() {
        let origin = Coordinate { lat: 16.0544, lon: 108.2022 };
        for bearing in [0.0, 90.0, 180.0, 270.0, 45.0] {
            let dest = destination(origin, 10.0, bearing);
            assert!((haversine_km(origin, dest) - 10.0).abs() < 1e-6);
        }
        let north = destination(origin, 10.0, 0.0);
        assert!(north.lat > origin.lat);
        assert!((north.lon - origin.lon).abs() < 1e-9);
    }

    #[test]
    fn test_position_order() {
        let c = Coordinate { lat: 1.0, lon: 2.0 };
        assert_eq!(c.to_position(), vec![2.0, 1.0]);
    }
}
