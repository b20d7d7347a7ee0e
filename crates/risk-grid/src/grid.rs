//! Bounding-box square grid
//!
//! The grid tiles the bounding box of a circle, not the circle itself: corner
//! cells outside the radius are kept. Cells are emitted row-major, south to
//! north, west to east within a row. Leftover width/height that does not fit a
//! whole cell is split evenly on both sides.

use geojson::{Geometry, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{destination, haversine_km, Coordinate, GridError, Result};

/// Upper bound on cells per build, to protect the elevation service.
pub const DEFAULT_MAX_CELLS: usize = 5000;

/// Absorbs float noise when a side is an exact multiple of the cell size.
const FIT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Enclosing box of the circle of `radius_km` around `center`.
    pub fn around(center: Coordinate, radius_km: f64) -> Self {
        let north = destination(center, radius_km, 0.0);
        let east = destination(center, radius_km, 90.0);
        let south = destination(center, radius_km, 180.0);
        let west = destination(center, radius_km, 270.0);

        Self {
            south: south.lat.max(-90.0),
            west: west.lon,
            north: north.lat.min(90.0),
            east: east.lon,
        }
    }

    pub fn south_west(&self) -> Coordinate {
        Coordinate { lat: self.south, lon: self.west }
    }

    pub fn center(&self) -> Coordinate {
        Coordinate {
            lat: (self.south + self.north) / 2.0,
            lon: (self.west + self.east) / 2.0,
        }
    }
}

/// One square cell of the tessellation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
    pub bounds: BoundingBox,
}

impl GridCell {
    /// Closed ring, counter-clockwise from the south-west corner.
    pub fn ring(&self) -> [Coordinate; 5] {
        let b = &self.bounds;
        let sw = Coordinate { lat: b.south, lon: b.west };
        [
            sw,
            Coordinate { lat: b.south, lon: b.east },
            Coordinate { lat: b.north, lon: b.east },
            Coordinate { lat: b.north, lon: b.west },
            sw,
        ]
    }

    pub fn centroid(&self) -> Coordinate {
        self.bounds.center()
    }

    pub fn to_geometry(&self) -> Geometry {
        let ring = self.ring().iter().map(Coordinate::to_position).collect();
        Geometry::new(Value::Polygon(vec![ring]))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GridBuilder {
    max_cells: usize,
}

impl Default for GridBuilder {
    fn default() -> Self {
        Self {
            max_cells: DEFAULT_MAX_CELLS,
        }
    }
}

impl GridBuilder {
    pub fn new(max_cells: usize) -> Self {
        Self { max_cells }
    }

    pub fn max_cells(&self) -> usize {
        self.max_cells
    }

    /// Tile the bounding box of the `radius_km` circle around `center` with
    /// `cell_km` squares.
    ///
    /// A cell larger than the box yields an empty grid, not an error.
    pub fn build(&self, center: Coordinate, radius_km: f64, cell_km: f64) -> Result<Vec<GridCell>> {
        if !center.is_valid() {
            return Err(GridError::InvalidCoordinate {
                lat: center.lat,
                lon: center.lon,
            });
        }
        check_dimension("radius_km", radius_km)?;
        check_dimension("cell_km", cell_km)?;

        let bbox = BoundingBox::around(center, radius_km);
        let sw = bbox.south_west();
        let width_km = haversine_km(sw, Coordinate { lat: bbox.south, lon: bbox.east });
        let height_km = haversine_km(sw, Coordinate { lat: bbox.north, lon: bbox.west });
        if width_km <= 0.0 || height_km <= 0.0 {
            return Ok(Vec::new());
        }

        let width_deg = bbox.east - bbox.west;
        let height_deg = bbox.north - bbox.south;
        let cell_w_deg = cell_km / width_km * width_deg;
        let cell_h_deg = cell_km / height_km * height_deg;

        let cols = (width_km / cell_km + FIT_EPSILON).floor() as usize;
        let rows = (height_km / cell_km + FIT_EPSILON).floor() as usize;
        let total = rows.saturating_mul(cols);
        if total > self.max_cells {
            return Err(GridError::TooManyCells {
                cells: total,
                limit: self.max_cells,
            });
        }

        let dx = (width_deg - cols as f64 * cell_w_deg) / 2.0;
        let dy = (height_deg - rows as f64 * cell_h_deg) / 2.0;

        let mut cells = Vec::with_capacity(total);
        for row in 0..rows {
            let south = bbox.south + dy + row as f64 * cell_h_deg;
            for col in 0..cols {
                let west = bbox.west + dx + col as f64 * cell_w_deg;
                cells.push(GridCell {
                    row,
                    col,
                    bounds: BoundingBox {
                        south,
                        west,
                        north: south + cell_h_deg,
                        east: west + cell_w_deg,
                    },
                });
            }
        }

        debug!(
            "Built {}x{} grid ({} cells) around ({:.4}, {:.4}) r={}km cell={}km",
            rows,
            cols,
            cells.len(),
            center.lat,
            center.lon,
            radius_km,
            cell_km
        );

        Ok(cells)
    }
}

fn check_dimension(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(GridError::InvalidDimension { name, value })
    }
}
