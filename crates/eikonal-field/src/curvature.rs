//! Curvature check on a fitted surface.
//!
//! A physically plausible travel-time surface bends gently away from the
//! source. The 5-point Laplacian, computed in km with the longitude
//! spacing shrinking towards the poles, flags nodes where the surface
//! curves more sharply than the configured threshold.

use ndarray::Array2;

use crate::builder::{CurvatureMask, Surface};
use crate::error::FieldError;
use crate::geodesy;
use crate::region::StudyRegion;

/// Compute the Laplacian of `surface` and flag nodes above `threshold`.
///
/// The outer ring of nodes has no complete stencil; it carries NaN and is
/// never flagged. Interior nodes with a non-finite Laplacian are flagged.
///
/// # Errors
///
/// Returns [`FieldError::ShapeMismatch`] if the surface is not on the grid.
#[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
pub fn laplacian_check(
    region: &StudyRegion,
    surface: &Surface,
    threshold: f64,
) -> Result<CurvatureMask, FieldError> {
    let shape = region.grid_shape();
    if surface.values.dim() != shape {
        return Err(FieldError::ShapeMismatch {
            name: "surface",
            expected: shape,
            found: surface.values.dim(),
        });
    }
    let (nlat, nlon) = shape;
    let bounds = region.bounds();
    let dy = bounds.dlat * geodesy::km_per_degree_lat();

    let t = &surface.values;
    let mut laplacian = Array2::from_elem(shape, f64::NAN);
    let mut flagged = Array2::from_elem(shape, false);
    for i in 1..nlat - 1 {
        let dx = bounds.dlon * geodesy::km_per_degree_lon(region.lat_at(i));
        for j in 1..nlon - 1 {
            let centre = t[[i, j]];
            let d2x = (t[[i, j + 1]] - 2.0 * centre + t[[i, j - 1]]) / (dx * dx);
            let d2y = (t[[i + 1, j]] - 2.0 * centre + t[[i - 1, j]]) / (dy * dy);
            let lap = d2x + d2y;
            laplacian[[i, j]] = lap;
            flagged[[i, j]] = !lap.is_finite() || lap.abs() > threshold;
        }
    }

    Ok(CurvatureMask { laplacian, flagged })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::cast_precision_loss
)]
mod tests {
    use eikonal_types::Period;

    use super::*;
    use crate::region::RegionBounds;

    fn region() -> StudyRegion {
        StudyRegion::new(
            RegionBounds {
                minlon: 10.0,
                maxlon: 12.0,
                minlat: 0.0,
                maxlat: 2.0,
                dlon: 0.5,
                dlat: 0.5,
            },
            vec![Period::from_secs(10)],
        )
        .unwrap()
    }

    fn surface(values: Array2<f64>) -> Surface {
        let constrained = Array2::from_elem(values.dim(), true);
        Surface {
            values,
            constrained,
            iterations: 0,
        }
    }

    #[test]
    fn planar_surface_has_no_curvature() {
        let region = region();
        let values = Array2::from_shape_fn(region.grid_shape(), |(i, j)| {
            2.0 * i as f64 + 0.5 * j as f64
        });
        let mask = laplacian_check(&region, &surface(values), 1e-9).unwrap();
        assert!(mask.flagged.iter().all(|&f| !f));
        assert!(mask.laplacian[[0, 0]].is_nan());
        assert!(mask.laplacian[[2, 2]].abs() < 1e-12);
    }

    #[test]
    fn spike_is_flagged() {
        let region = region();
        let mut values = Array2::zeros(region.grid_shape());
        values[[2, 2]] = 100.0;
        let mask = laplacian_check(&region, &surface(values), 0.005).unwrap();
        assert!(mask.flagged[[2, 2]]);
        assert!(mask.flagged[[1, 2]]);
        assert!(!mask.flagged[[1, 1]]);
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let region = region();
        let result = laplacian_check(&region, &surface(Array2::zeros((3, 3))), 0.005);
        assert!(matches!(result, Err(FieldError::ShapeMismatch { .. })));
    }
}
