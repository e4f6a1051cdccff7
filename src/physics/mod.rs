//! Per-station visibility kernel.

pub mod horizon;
pub mod view_angle;
pub mod visibility;

use crate::geo::WorldPoint;
use crate::io::Station;
use crate::terrain::ElevationGrid;

pub use horizon::{HorizonField, Octant, propagate_horizon};
pub use view_angle::{ANGLE_SCALE, ViewAngleField, compute_view_angles};
pub use visibility::{VisibilityMask, accumulate_visibility, add_mask, visibility_mask};

/// A station placed on the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedStation {
    /// Position in the caller's station list.
    pub index: usize,
    pub col: usize,
    pub row: usize,
    pub location: WorldPoint,
    pub ground_elevation: f64,
    /// Ground elevation plus the station's height offset.
    pub elevation: f64,
}

impl ResolvedStation {
    /// `None` when the station lies outside the grid or on a no-data cell.
    pub fn resolve(index: usize, station: &Station, dem: &ElevationGrid) -> Option<Self> {
        let location = station.location();
        let (col, row) = dem.geometry.world_to_cell(location)?;
        let ground_elevation = dem.get(col as isize, row as isize)?;

        Some(Self {
            index,
            col,
            row,
            location,
            ground_elevation,
            elevation: ground_elevation + station.height_offset,
        })
    }
}

/// View-angle and horizon fields for one station. Both are owned by the
/// caller and dropped once the station's visibility has been recorded.
pub fn station_fields(
    dem: &ElevationGrid,
    station: &ResolvedStation,
    scale: f64,
) -> (ViewAngleField, HorizonField) {
    let angles = compute_view_angles(dem, station, scale);
    let horizon = propagate_horizon(&angles, station.col, station.row);
    (angles, horizon)
}
