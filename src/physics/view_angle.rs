use crate::physics::ResolvedStation;
use crate::terrain::{ElevationGrid, Raster};

/// Scale applied to elevation-difference over distance.
pub const ANGLE_SCALE: f64 = 1000.0;

/// Angle given to the cell whose centre coincides with the observer.
pub const OBSERVER_CELL_ANGLE: f64 = 0.0;

/// Per-cell view angle relative to one station. `novalue` where the DEM has no data.
pub type ViewAngleField = Raster;

/// Builds the view-angle field for a station.
///
/// Each defined cell holds `(z_cell - z_station) / distance * scale`, with the
/// distance measured from the station's exact location to the cell centre.
/// A cell at zero distance keeps [`OBSERVER_CELL_ANGLE`].
pub fn compute_view_angles(
    dem: &ElevationGrid,
    station: &ResolvedStation,
    scale: f64,
) -> ViewAngleField {
    let mut field = dem.blank_like();

    for ((row, col), &z) in dem.data.indexed_iter() {
        if dem.is_novalue(z) {
            continue;
        }

        let dist = dem.geometry.cell_to_world(col, row).distance(station.location);
        let angle = if dist != 0.0 {
            (z - station.elevation) / dist * scale
        } else {
            OBSERVER_CELL_ANGLE
        };
        field.data[(row, col)] = angle;
    }

    field
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::WorldPoint;
    use approx::assert_relative_eq;

    fn station_at(dem: &ElevationGrid, col: usize, row: usize, offset: f64) -> ResolvedStation {
        let location = dem.geometry.cell_to_world(col, row);
        let ground = dem.get(col as isize, row as isize).unwrap();
        ResolvedStation {
            index: 0,
            col,
            row,
            location,
            ground_elevation: ground,
            elevation: ground + offset,
        }
    }

    #[test]
    fn test_angles_follow_elevation_over_distance() {
        let dem = Raster::from_rows(vec![0.0, 10.0, 20.0], 3, 1, 0.0, 1.0, 1.0, -9999.0).unwrap();
        let station = station_at(&dem, 0, 0, 0.0);
        let field = compute_view_angles(&dem, &station, ANGLE_SCALE);

        assert_eq!(field.raw(0, 0), Some(OBSERVER_CELL_ANGLE));
        assert_relative_eq!(field.raw(1, 0).unwrap(), 10_000.0);
        assert_relative_eq!(field.raw(2, 0).unwrap(), 10_000.0);
    }

    #[test]
    fn test_novalue_cells_stay_novalue() {
        let samples = vec![5.0, -9999.0, 5.0, 5.0];
        let dem = Raster::from_rows(samples, 2, 2, 0.0, 2.0, 1.0, -9999.0).unwrap();
        let station = station_at(&dem, 0, 0, 2.0);
        let field = compute_view_angles(&dem, &station, ANGLE_SCALE);

        assert_eq!(field.get(1, 0), None);
        assert_relative_eq!(field.raw(0, 1).unwrap(), -2000.0);
        assert_relative_eq!(field.raw(1, 1).unwrap(), -2000.0 / 2f64.sqrt());
    }

    #[test]
    fn test_off_centre_station_has_no_zero_distance() {
        let dem = Raster::from_rows(vec![0.0; 4], 2, 2, 0.0, 2.0, 1.0, -9999.0).unwrap();
        let mut station = station_at(&dem, 0, 0, 1.0);
        station.location = WorldPoint::new(0.25, 1.75);
        let field = compute_view_angles(&dem, &station, ANGLE_SCALE);

        let dist = (0.25f64 * 0.25 + 0.25 * 0.25).sqrt();
        assert_relative_eq!(field.raw(0, 0).unwrap(), -1.0 / dist * ANGLE_SCALE);
    }
}
