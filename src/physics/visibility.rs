use ndarray::{Array2, Zip};

use crate::error::{ViewshedError, ViewshedResult};
use crate::geo::GridGeometry;
use crate::physics::horizon::HorizonField;
use crate::physics::view_angle::ViewAngleField;
use crate::terrain::{CountGrid, Raster};

/// Cells a single station sees.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityMask {
    pub geometry: GridGeometry,
    pub visible: Array2<bool>,
}

impl VisibilityMask {
    pub fn visible_count(&self) -> usize {
        self.visible.iter().filter(|v| **v).count()
    }

    pub fn is_visible(&self, col: usize, row: usize) -> bool {
        self.visible.get((row, col)).copied().unwrap_or(false)
    }
}

/// A cell is visible when its own angle reaches the horizon in front of it.
/// Ties are visible; cells the sweep never reached are not.
#[inline(always)]
fn sees(angle: f64, horizon: f64, fields: &Raster) -> bool {
    !fields.is_novalue(angle) && !fields.is_novalue(horizon) && horizon <= angle
}

fn check_shape(expected: &Raster, actual: &Raster) -> ViewshedResult<()> {
    if expected.data.dim() != actual.data.dim() {
        return Err(ViewshedError::Shape {
            expected: expected.data.dim(),
            actual: actual.data.dim(),
        });
    }
    Ok(())
}

pub fn visibility_mask(
    angles: &ViewAngleField,
    horizon: &HorizonField,
) -> ViewshedResult<VisibilityMask> {
    check_shape(angles, horizon)?;

    let visible = Zip::from(&angles.data)
        .and(&horizon.data)
        .map_collect(|&angle, &max| sees(angle, max, angles));

    Ok(VisibilityMask {
        geometry: angles.geometry,
        visible,
    })
}

/// Adds one station's contribution to the shared count grid in place.
pub fn accumulate_visibility(
    angles: &ViewAngleField,
    horizon: &HorizonField,
    counts: &mut CountGrid,
) -> ViewshedResult<()> {
    check_shape(angles, horizon)?;
    check_shape(angles, counts)?;

    let novalue = counts.novalue;
    Zip::from(&mut counts.data)
        .and(&angles.data)
        .and(&horizon.data)
        .for_each(|count, &angle, &max| {
            if sees(angle, max, angles) {
                increment(count, novalue);
            }
        });
    Ok(())
}

/// Adds a precomputed mask to the count grid.
pub fn add_mask(mask: &VisibilityMask, counts: &mut CountGrid) -> ViewshedResult<()> {
    if mask.visible.dim() != counts.data.dim() {
        return Err(ViewshedError::Shape {
            expected: counts.data.dim(),
            actual: mask.visible.dim(),
        });
    }

    let novalue = counts.novalue;
    Zip::from(&mut counts.data).and(&mask.visible).for_each(|count, &visible| {
        if visible {
            increment(count, novalue);
        }
    });
    Ok(())
}

#[inline(always)]
fn increment(count: &mut f64, novalue: f64) {
    if count.is_nan() || *count == novalue {
        *count = 0.0;
    }
    *count += 1.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    const NV: f64 = -9999.0;

    fn raster(values: Vec<f64>) -> Raster {
        Raster::from_rows(values, 2, 2, 0.0, 2.0, 1.0, NV).unwrap()
    }

    #[test]
    fn test_ties_are_visible() {
        let angles = raster(vec![1.0, 2.0, 3.0, 4.0]);
        let horizon = raster(vec![1.0, 5.0, 3.0, 3.5]);
        let mask = visibility_mask(&angles, &horizon).unwrap();

        assert!(mask.is_visible(0, 0));
        assert!(!mask.is_visible(1, 0));
        assert!(mask.is_visible(0, 1));
        assert!(mask.is_visible(1, 1));
        assert_eq!(mask.visible_count(), 3);
    }

    #[test]
    fn test_novalue_cells_never_counted() {
        let angles = raster(vec![NV, 2.0, 3.0, 4.0]);
        let horizon = raster(vec![-50.0, NV, 3.0, 4.0]);
        let mut counts = angles.blank_like();
        accumulate_visibility(&angles, &horizon, &mut counts).unwrap();

        assert_eq!(counts.raw(0, 0), Some(NV));
        assert_eq!(counts.raw(1, 0), Some(NV));
        assert_eq!(counts.raw(0, 1), Some(1.0));
        assert_eq!(counts.raw(1, 1), Some(1.0));
    }

    #[test]
    fn test_counts_accumulate_across_calls() {
        let angles = raster(vec![1.0, 1.0, 1.0, 1.0]);
        let horizon = raster(vec![0.0, 2.0, 1.0, 0.0]);
        let mut counts = angles.blank_like();
        for _ in 0..3 {
            accumulate_visibility(&angles, &horizon, &mut counts).unwrap();
        }
        assert_eq!(counts.raw(0, 0), Some(3.0));
        assert_eq!(counts.raw(1, 0), Some(NV));

        let mask = visibility_mask(&angles, &horizon).unwrap();
        add_mask(&mask, &mut counts).unwrap();
        assert_eq!(counts.raw(1, 1), Some(4.0));
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let angles = raster(vec![1.0; 4]);
        let horizon = Raster::from_rows(vec![1.0; 6], 3, 2, 0.0, 2.0, 1.0, NV).unwrap();
        assert!(visibility_mask(&angles, &horizon).is_err());
    }
}
