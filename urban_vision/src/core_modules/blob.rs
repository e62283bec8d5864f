// THEORY:
// A `Blob` is one spatially coherent region of vehicle-coloured cells on the
// downsampled occupancy grid. It is the output of the connected-component pass and
// the unit every vehicle figure is counted in.
//
// Key architectural principles:
// 1.  **Grid coordinates**: every field is measured in grid cells, not image pixels.
//     Consumers that need a pixel footprint multiply by the downscale factor.
// 2.  **Dumb data container**: a blob knows its bounding box and its area. It has no
//     identity across frames and no notion of what kind of vehicle it is; typing
//     happens later in the vehicle detector.

use serde::{Deserialize, Serialize};

/// A cell on the occupancy grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub x: u32,
    pub y: u32,
}

/// A 4-connected component of marked grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    /// Number of cells in the component, its area on the grid.
    pub pixel_count: usize,
}

impl Blob {
    /// A blob made of a single seed cell.
    pub fn from_seed(seed: Cell) -> Self {
        Self {
            min_x: seed.x,
            min_y: seed.y,
            max_x: seed.x,
            max_y: seed.y,
            pixel_count: 1,
        }
    }

    /// Grows the bounding box and the area by one cell.
    pub fn absorb(&mut self, cell: Cell) {
        self.min_x = self.min_x.min(cell.x);
        self.min_y = self.min_y.min(cell.y);
        self.max_x = self.max_x.max(cell.x);
        self.max_y = self.max_y.max(cell.y);
        self.pixel_count += 1;
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Bounding-box width over height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width() as f64 / self.height() as f64
    }

    /// Bounding-box centre in grid coordinates.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) as f64 / 2.0,
            (self.min_y + self.max_y) as f64 / 2.0,
        )
    }
}
