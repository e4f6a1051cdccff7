use serde::{Deserialize, Serialize};

/// A point in the grid's world (map) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

impl WorldPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: WorldPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned affine mapping between grid cells and world coordinates.
///
/// Row 0 is the northern edge; rows grow southwards, columns eastwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub cols: usize,
    pub rows: usize,
    /// World x of the western edge of column 0.
    pub west: f64,
    /// World y of the northern edge of row 0.
    pub north: f64,
    pub cell_width: f64,
    pub cell_height: f64,
}

impl GridGeometry {
    pub fn new(
        cols: usize,
        rows: usize,
        west: f64,
        north: f64,
        cell_width: f64,
        cell_height: f64,
    ) -> Self {
        Self {
            cols,
            rows,
            west,
            north,
            cell_width,
            cell_height,
        }
    }

    /// Geometry anchored on the lower-left corner, as raster headers usually give it.
    pub fn from_lower_left(
        cols: usize,
        rows: usize,
        west: f64,
        south: f64,
        cell_size: f64,
    ) -> Self {
        Self::new(cols, rows, west, south + rows as f64 * cell_size, cell_size, cell_size)
    }

    pub fn south(&self) -> f64 {
        self.north - self.rows as f64 * self.cell_height
    }

    pub fn contains(&self, col: isize, row: isize) -> bool {
        col >= 0 && row >= 0 && (col as usize) < self.cols && (row as usize) < self.rows
    }

    /// World coordinate of a cell centre.
    pub fn cell_to_world(&self, col: usize, row: usize) -> WorldPoint {
        WorldPoint {
            x: self.west + (col as f64 + 0.5) * self.cell_width,
            y: self.north - (row as f64 + 0.5) * self.cell_height,
        }
    }

    /// Cell containing a world coordinate, `None` when it falls outside the grid.
    pub fn world_to_cell(&self, point: WorldPoint) -> Option<(usize, usize)> {
        let col = ((point.x - self.west) / self.cell_width).floor();
        let row = ((self.north - point.y) / self.cell_height).floor();

        if !col.is_finite() || !row.is_finite() {
            return None;
        }
        if col < 0.0 || row < 0.0 || col >= self.cols as f64 || row >= self.rows as f64 {
            return None;
        }

        Some((col as usize, row as usize))
    }

    pub fn is_valid(&self) -> bool {
        self.cols > 0
            && self.rows > 0
            && self.cell_width.is_finite()
            && self.cell_height.is_finite()
            && self.cell_width > 0.0
            && self.cell_height > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_centre_round_trip() {
        let geometry = GridGeometry::from_lower_left(10, 5, 1000.0, 2000.0, 10.0);
        assert_eq!(geometry.north, 2050.0);

        let centre = geometry.cell_to_world(3, 2);
        assert_eq!(centre, WorldPoint::new(1035.0, 2025.0));
        assert_eq!(geometry.world_to_cell(centre), Some((3, 2)));
    }

    #[test]
    fn test_world_to_cell_outside() {
        let geometry = GridGeometry::new(4, 4, 0.0, 4.0, 1.0, 1.0);
        assert_eq!(geometry.world_to_cell(WorldPoint::new(-0.1, 2.0)), None);
        assert_eq!(geometry.world_to_cell(WorldPoint::new(4.0, 2.0)), None);
        assert_eq!(geometry.world_to_cell(WorldPoint::new(2.0, 4.5)), None);
        assert_eq!(geometry.world_to_cell(WorldPoint::new(0.0, 4.0)), Some((0, 0)));
    }
}
