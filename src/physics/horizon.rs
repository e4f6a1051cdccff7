//! Horizon propagation: the running maximum view angle along sight lines.
//!
//! Rather than casting one ray per cell, the horizon grows outward from the
//! station along twelve fronts: the four grid axes, then the eight triangular
//! octants between an axis and its neighbouring diagonal. Inside an octant a
//! cell's horizon is predicted by linear interpolation between the two cells
//! of the previous (nearer) row that bracket its sight line.

use itertools::iproduct;

use crate::physics::view_angle::ViewAngleField;
use crate::terrain::Raster;

/// Per-cell maximum view angle between the station and the cell (inclusive).
/// `novalue` where no scan front reached the cell.
pub type HorizonField = Raster;

/// Unit step in (col, row) grid space. Rows grow southwards.
pub type Step = (isize, isize);

pub const NORTH: Step = (0, -1);
pub const SOUTH: Step = (0, 1);
pub const EAST: Step = (1, 0);
pub const WEST: Step = (-1, 0);

/// A triangular wedge growing along `axis`, widening towards `lateral`.
///
/// Cell `(v, h)` of the wedge lies at `station + v * axis + h * lateral`,
/// with `v >= 2` and `1 <= h <= v`; `h == v` is the diagonal edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Octant {
    pub axis: Step,
    pub lateral: Step,
}

impl Octant {
    pub const fn new(axis: Step, lateral: Step) -> Self {
        Self { axis, lateral }
    }

    /// Previous-row neighbour on the diagonal side of the sight line.
    fn diagonal_behind(&self, col: isize, row: isize) -> (isize, isize) {
        (col - self.axis.0 - self.lateral.0, row - self.axis.1 - self.lateral.1)
    }

    /// Previous-row neighbour on the axis side of the sight line.
    fn straight_behind(&self, col: isize, row: isize) -> (isize, isize) {
        (col - self.axis.0, row - self.axis.1)
    }
}

/// Processing order of the octant passes.
pub const OCTANTS: [Octant; 8] = [
    Octant::new(NORTH, EAST),
    Octant::new(NORTH, WEST),
    Octant::new(SOUTH, WEST),
    Octant::new(SOUTH, EAST),
    Octant::new(EAST, NORTH),
    Octant::new(EAST, SOUTH),
    Octant::new(WEST, SOUTH),
    Octant::new(WEST, NORTH),
];

pub const AXES: [Step; 4] = [NORTH, SOUTH, EAST, WEST];

/// Propagates the horizon for a station at (`col`, `row`).
pub fn propagate_horizon(angles: &ViewAngleField, col: usize, row: usize) -> HorizonField {
    let mut horizon = angles.blank_like();
    let (sc, sr) = (col as isize, row as isize);

    seed_neighbourhood(angles, &mut horizon, sc, sr);
    for axis in AXES {
        scan_axis(angles, &mut horizon, sc, sr, axis);
    }
    for octant in OCTANTS {
        sweep_octant(angles, &mut horizon, sc, sr, octant);
    }

    horizon
}

/// Copies the 3x3 block around the station verbatim.
fn seed_neighbourhood(angles: &ViewAngleField, horizon: &mut HorizonField, sc: isize, sr: isize) {
    for (dr, dc) in iproduct!(-1..=1, -1..=1) {
        if let Some(value) = angles.raw(sc + dc, sr + dr) {
            horizon.set(sc + dc, sr + dr, value);
        }
    }
}

/// Running maximum along one axis, starting two cells out. No-data cells are
/// neither written nor folded into the maximum.
fn scan_axis(
    angles: &ViewAngleField,
    horizon: &mut HorizonField,
    sc: isize,
    sr: isize,
    axis: Step,
) {
    let (dc, dr) = axis;
    let mut max_angle = angles.get(sc + dc, sr + dr);

    let mut distance = 2;
    loop {
        let (col, row) = (sc + distance * dc, sr + distance * dr);
        if !angles.geometry.contains(col, row) {
            break;
        }
        if let Some(angle) = angles.get(col, row) {
            let running = max_angle.map_or(angle, |m| m.max(angle));
            max_angle = Some(running);
            horizon.set(col, row, running);
        }
        distance += 1;
    }
}

fn sweep_octant(
    angles: &ViewAngleField,
    horizon: &mut HorizonField,
    sc: isize,
    sr: isize,
    octant: Octant,
) {
    let (ac, ar) = octant.axis;
    let (lc, lr) = octant.lateral;

    let mut vert_count: isize = 2;
    loop {
        let (axis_col, axis_row) = (sc + vert_count * ac, sr + vert_count * ar);
        if !angles.geometry.contains(axis_col, axis_row) {
            break;
        }

        let mut horiz_count: isize = 0;
        for offset in 1..=vert_count {
            let (col, row) = (axis_col + offset * lc, axis_row + offset * lr);
            if !angles.geometry.contains(col, row) {
                break;
            }
            let Some(angle) = angles.get(col, row) else {
                continue;
            };
            horiz_count += 1;

            let (dc, dr) = octant.diagonal_behind(col, row);
            let diagonal = horizon.get(dc, dr);
            let predicted = if horiz_count == vert_count {
                diagonal
            } else {
                let (bc, br) = octant.straight_behind(col, row);
                let weight = horiz_count as f64 / vert_count as f64;
                interpolate(diagonal, horizon.get(bc, br), weight)
            };

            horizon.set(col, row, predicted.map_or(angle, |p| p.max(angle)));
        }

        vert_count += 1;
    }
}

/// `straight + weight * (diagonal - straight)`.
///
/// A missing side falls back to the other one rather than blending in the
/// no-data sentinel. The straight side can only be missing when a no-data
/// cell earlier in the row leaves the valid-cell count behind the offset.
fn interpolate(diagonal: Option<f64>, straight: Option<f64>, weight: f64) -> Option<f64> {
    match (diagonal, straight) {
        (Some(t1), Some(t2)) => Some(t2 + weight * (t1 - t2)),
        (Some(t), None) | (None, Some(t)) => Some(t),
        (None, None) => None,
    }
}
