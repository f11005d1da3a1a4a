//! Harmonic surface fitting.
//!
//! Samples snap to their nearest grid node; nodes hit by several samples
//! take the mean. Every other node is solved for with successive
//! over-relaxation of the discrete Laplace equation, which yields the
//! smoothest (minimum-tension) surface through the pinned nodes and
//! reproduces planar fields exactly. Grid edges use only the neighbours
//! that exist.
//!
//! Processor samples carry apparent velocity rather than time, so
//! [`travel_time_samples`] turns them back into travel times before fitting.

use eikonal_types::{ScatteredSample, SourceLocation};
use ndarray::Array2;
use tracing::debug;

use crate::builder::Surface;
use crate::error::FieldError;
use crate::geodesy;
use crate::region::StudyRegion;

/// Over-relaxation factor.
const OMEGA: f64 = 1.6;

/// Travel times implied by apparent-velocity samples.
///
/// Each sample becomes its great-circle distance to the source divided by
/// its velocity. Zero-valued samples mark the source and map to a travel
/// time of 0. Negative and non-finite velocities are dropped.
#[allow(clippy::arithmetic_side_effects)]
pub fn travel_time_samples(samples: &[ScatteredSample], source: SourceLocation) -> Vec<ScatteredSample> {
    samples
        .iter()
        .filter_map(|s| {
            if !s.value.is_finite() || s.value < 0.0 {
                return None;
            }
            if s.value.abs() < f64::EPSILON {
                return Some(ScatteredSample::new(s.lon, s.lat, 0.0));
            }
            let distance = geodesy::distance_km(source.lon, source.lat, s.lon, s.lat);
            Some(ScatteredSample::new(s.lon, s.lat, distance / s.value))
        })
        .collect()
}

/// Fit a harmonic surface through the samples that fall on the grid.
///
/// Non-finite samples and samples off the grid are ignored.
///
/// # Errors
///
/// Returns [`FieldError::NoSamplesInGrid`] when no sample pins a node.
#[allow(
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_precision_loss
)]
pub fn harmonic_surface(
    region: &StudyRegion,
    samples: &[ScatteredSample],
    max_iterations: u32,
    tolerance: f64,
) -> Result<Surface, FieldError> {
    let shape = region.grid_shape();
    let (nlat, nlon) = shape;

    let mut sums = Array2::<f64>::zeros(shape);
    let mut counts = Array2::<u32>::zeros(shape);
    for sample in samples.iter().filter(|s| s.value.is_finite()) {
        if let Some(node) = region.nearest_node(sample.lon, sample.lat) {
            sums[node] += sample.value;
            counts[node] = counts[node].saturating_add(1);
        }
    }

    let constrained = counts.mapv(|c| c > 0);
    let pinned = counts.iter().filter(|&&c| c > 0).count();
    if pinned == 0 {
        return Err(FieldError::NoSamplesInGrid);
    }

    let mut values = Array2::<f64>::zeros(shape);
    let mut total = 0.0;
    let mut scale: f64 = 1.0;
    for ((node, sum), &count) in sums.indexed_iter().zip(counts.iter()) {
        if count > 0 {
            let mean = sum / f64::from(count);
            values[node] = mean;
            total += mean;
            scale = scale.max(mean.abs());
        }
    }
    let initial = total / pinned as f64;
    for (value, &pin) in values.iter_mut().zip(constrained.iter()) {
        if !pin {
            *value = initial;
        }
    }

    let threshold = tolerance * scale;
    let mut iterations = 0_u32;
    if pinned < nlat.saturating_mul(nlon) {
        while iterations < max_iterations {
            iterations = iterations.saturating_add(1);
            let mut max_change: f64 = 0.0;
            for i in 0..nlat {
                for j in 0..nlon {
                    if constrained[[i, j]] {
                        continue;
                    }
                    let mut sum = 0.0;
                    let mut n = 0.0;
                    if i > 0 {
                        sum += values[[i - 1, j]];
                        n += 1.0;
                    }
                    if i + 1 < nlat {
                        sum += values[[i + 1, j]];
                        n += 1.0;
                    }
                    if j > 0 {
                        sum += values[[i, j - 1]];
                        n += 1.0;
                    }
                    if j + 1 < nlon {
                        sum += values[[i, j + 1]];
                        n += 1.0;
                    }
                    let old = values[[i, j]];
                    let updated = old + OMEGA * (sum / n - old);
                    max_change = max_change.max((updated - old).abs());
                    values[[i, j]] = updated;
                }
            }
            if max_change < threshold {
                break;
            }
        }
    }

    debug!(pinned, iterations, "Surface fitted");
    Ok(Surface {
        values,
        constrained,
        iterations,
    })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use eikonal_types::Period;

    use super::*;
    use crate::region::RegionBounds;

    fn region() -> StudyRegion {
        StudyRegion::new(
            RegionBounds {
                minlon: 230.0,
                maxlon: 232.0,
                minlat: 35.0,
                maxlat: 37.0,
                dlon: 0.2,
                dlat: 0.2,
            },
            vec![Period::from_secs(10)],
        )
        .unwrap()
    }

    fn plane(lon: f64, lat: f64) -> f64 {
        3.0 * (lon - 230.0) - 2.0 * (lat - 35.0) + 10.0
    }

    #[test]
    fn no_samples_in_grid_is_an_error() {
        let samples = [ScatteredSample::new(100.0, 0.0, 1.0)];
        let err = harmonic_surface(&region(), &samples, 100, 1e-8);
        assert!(matches!(err, Err(FieldError::NoSamplesInGrid)));
    }

    #[test]
    fn fully_pinned_grid_is_returned_as_is() {
        let region = region();
        let (lon, lat) = region.mesh();
        let samples: Vec<_> = lon
            .iter()
            .zip(lat.iter())
            .map(|(&x, &y)| ScatteredSample::new(x, y, plane(x, y)))
            .collect();
        let surface = harmonic_surface(&region, &samples, 100, 1e-10).unwrap();
        assert_eq!(surface.iterations, 0);
        for ((node, &v), (&x, &y)) in surface.values.indexed_iter().zip(lon.iter().zip(lat.iter())) {
            assert!((v - plane(x, y)).abs() < 1e-12, "node {node:?}");
        }
    }

    #[test]
    fn planar_field_is_reproduced_between_pinned_nodes() {
        let region = region();
        let (nlat, nlon) = region.grid_shape();
        let mut samples = Vec::new();
        for i in 0..nlat {
            for j in 0..nlon {
                let border = i == 0 || j == 0 || i + 1 == nlat || j + 1 == nlon;
                if border || (i % 3 == 0 && j % 3 == 0) {
                    let (x, y) = (region.lon_at(j), region.lat_at(i));
                    samples.push(ScatteredSample::new(x, y, plane(x, y)));
                }
            }
        }
        let surface = harmonic_surface(&region, &samples, 10_000, 1e-12).unwrap();
        for i in 0..nlat {
            for j in 0..nlon {
                let expected = plane(region.lon_at(j), region.lat_at(i));
                assert!((surface.values[[i, j]] - expected).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn velocities_become_travel_times() {
        let source = SourceLocation { lon: 231.0, lat: 35.0 };
        let station = (231.0, 36.0);
        let distance = geodesy::distance_km(source.lon, source.lat, station.0, station.1);
        let samples = [
            ScatteredSample::new(source.lon, source.lat, 0.0),
            ScatteredSample::new(station.0, station.1, 3.5),
            ScatteredSample::new(232.0, 36.0, -3.5),
            ScatteredSample::new(232.0, 37.0, f64::NAN),
        ];
        let times = travel_time_samples(&samples, source);
        assert_eq!(times.len(), 2);
        assert_eq!(times[0], ScatteredSample::new(source.lon, source.lat, 0.0));
        assert!((times[1].value - distance / 3.5).abs() < 1e-9);
        assert!((times[1].value - 31.77).abs() < 0.01);
    }

    #[test]
    fn coincident_samples_are_averaged() {
        let region = region();
        let samples = [
            ScatteredSample::new(231.0, 36.0, 4.0),
            ScatteredSample::new(231.01, 36.02, 6.0),
            ScatteredSample::new(231.0, 36.0, f64::NAN),
        ];
        let surface = harmonic_surface(&region, &samples, 10, 1e-8).unwrap();
        let node = region.nearest_node(231.0, 36.0).unwrap();
        assert!((surface.values[node] - 5.0).abs() < 1e-12);
        assert!(surface.constrained[node]);
        assert_eq!(surface.constrained.iter().filter(|&&c| c).count(), 1);
    }
}
