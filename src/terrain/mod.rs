pub mod ascii;
pub mod hgt;

use ndarray::Array2;

use crate::error::{ViewshedError, ViewshedResult};
use crate::geo::{GridGeometry, WorldPoint};

pub use ascii::{read_ascii_grid, write_ascii_grid};
pub use hgt::HgtLoader;

/// Sentinel used when a raster source does not declare its own.
pub const DEFAULT_NOVALUE: f64 = -9999.0;

/// A georeferenced grid of f64 samples with a no-data sentinel.
///
/// Samples are stored row-major, indexed `[row, col]`. Every accessor is
/// bounds-checked: reads outside the grid return `None`, writes are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub geometry: GridGeometry,
    pub novalue: f64,
    pub data: Array2<f64>,
}

/// The input DEM.
pub type ElevationGrid = Raster;

/// Per-cell number of stations that see the cell (stored as f64, `novalue` until first hit).
pub type CountGrid = Raster;

impl Raster {
    /// A raster of the given geometry where every cell holds `novalue`.
    pub fn filled_novalue(geometry: GridGeometry, novalue: f64) -> Self {
        Self {
            geometry,
            novalue,
            data: Array2::from_elem((geometry.rows, geometry.cols), novalue),
        }
    }

    pub fn from_array(
        data: Array2<f64>,
        geometry: GridGeometry,
        novalue: f64,
    ) -> ViewshedResult<Self> {
        let (rows, cols) = data.dim();
        if rows != geometry.rows || cols != geometry.cols {
            return Err(ViewshedError::Shape {
                expected: (geometry.rows, geometry.cols),
                actual: (rows, cols),
            });
        }
        if !geometry.is_valid() {
            return Err(ViewshedError::InvalidGeometry(format!("{:?}", geometry)));
        }
        Ok(Self { geometry, novalue, data })
    }

    /// Convenience constructor for row-major samples with square cells.
    pub fn from_rows(
        samples: Vec<f64>,
        cols: usize,
        rows: usize,
        west: f64,
        north: f64,
        cell_size: f64,
        novalue: f64,
    ) -> ViewshedResult<Self> {
        let len = samples.len();
        let data = Array2::from_shape_vec((rows, cols), samples).map_err(|_| ViewshedError::Shape {
            expected: (rows, cols),
            actual: (len / cols.max(1), cols),
        })?;
        let geometry = GridGeometry::new(cols, rows, west, north, cell_size, cell_size);
        Self::from_array(data, geometry, novalue)
    }

    pub fn cols(&self) -> usize {
        self.geometry.cols
    }

    pub fn rows(&self) -> usize {
        self.geometry.rows
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline(always)]
    pub fn is_novalue(&self, value: f64) -> bool {
        value.is_nan() || value == self.novalue
    }

    /// Raw sample, including the sentinel. `None` only outside the grid.
    #[inline(always)]
    pub fn raw(&self, col: isize, row: isize) -> Option<f64> {
        if !self.geometry.contains(col, row) {
            return None;
        }
        self.data.get((row as usize, col as usize)).copied()
    }

    /// Defined sample: `None` outside the grid or on a no-data cell.
    #[inline(always)]
    pub fn get(&self, col: isize, row: isize) -> Option<f64> {
        self.raw(col, row).filter(|v| !self.is_novalue(*v))
    }

    #[inline(always)]
    pub fn set(&mut self, col: isize, row: isize, value: f64) {
        if self.geometry.contains(col, row) {
            self.data[(row as usize, col as usize)] = value;
        }
    }

    /// Nearest-cell sample at a world coordinate.
    pub fn sample_world(&self, point: WorldPoint) -> Option<f64> {
        let (col, row) = self.geometry.world_to_cell(point)?;
        self.get(col as isize, row as isize)
    }

    /// Number of cells holding a defined value.
    pub fn defined_count(&self) -> usize {
        self.data.iter().filter(|v| !self.is_novalue(**v)).count()
    }

    /// Same geometry and sentinel, all cells set to `novalue`.
    pub fn blank_like(&self) -> Self {
        Self::filled_novalue(self.geometry, self.novalue)
    }
}
