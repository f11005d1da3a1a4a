//! Gradient quality control.
//!
//! Central differences over the stencil interior give the local slowness
//! vector of the surface. Its inverse magnitude is the apparent velocity
//! and its direction the propagation angle; both are compared against the
//! great-circle geometry of the event and each node receives a
//! [`RejectReason`]. Checks run in a fixed order and the first failure
//! wins: data support, curvature, source proximity, velocity range,
//! propagation direction.

use eikonal_types::{RejectReason, ScatteredSample, SourceLocation};
use ndarray::Array2;

use crate::builder::{CurvatureMask, FieldConfig, FieldProducts, GradientMode, Surface};
use crate::error::FieldError;
use crate::geodesy;
use crate::region::{STENCIL_MARGIN, StudyRegion};

/// Derive the persisted per-node arrays for one event.
///
/// # Errors
///
/// Returns [`FieldError::ShapeMismatch`] if the surface or curvature mask
/// is not on the grid.
#[allow(
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::too_many_lines
)]
pub fn gradient_qc(
    config: &FieldConfig<'_>,
    surface: &Surface,
    curvature: &CurvatureMask,
    samples: &[ScatteredSample],
    source: SourceLocation,
    mode: GradientMode,
) -> Result<FieldProducts, FieldError> {
    let region = config.region;
    let quality = config.quality;
    let full = region.grid_shape();
    expect_shape("surface", surface.values.dim(), full)?;
    expect_shape("constrained", surface.constrained.dim(), full)?;
    expect_shape("curvature", curvature.flagged.dim(), full)?;

    let interior = region.stencil_shape();
    let bounds = region.bounds();
    let dy = bounds.dlat * geodesy::km_per_degree_lat();
    let near_source_km =
        quality.near_source_wavelengths * config.period.as_f64() * quality.reference_velocity;
    let support = Support::new(region, surface, samples, mode, config);

    let mut app_velocity = Array2::<f64>::zeros(interior);
    let mut reason = Array2::<u8>::zeros(interior);
    let mut propagation_angle = Array2::<f64>::zeros(interior);
    let mut azimuth = Array2::<f64>::zeros(interior);
    let mut back_azimuth = Array2::<f64>::zeros(interior);

    let t = &surface.values;
    let (rows, cols) = interior;
    for a in 0..rows {
        let i = a + STENCIL_MARGIN;
        let lat = region.lat_at(i);
        let dx = bounds.dlon * geodesy::km_per_degree_lon(lat);
        for b in 0..cols {
            let j = b + STENCIL_MARGIN;
            let lon = region.lon_at(j);

            let gx = (t[[i, j + 1]] - t[[i, j - 1]]) / (2.0 * dx);
            let gy = (t[[i + 1, j]] - t[[i - 1, j]]) / (2.0 * dy);
            let slowness = gx.hypot(gy);
            let velocity = if slowness > 0.0 { 1.0 / slowness } else { f64::INFINITY };
            let angle = geodesy::wrap_degrees(gx.atan2(gy).to_degrees());

            let az = geodesy::azimuth_deg(source.lon, source.lat, lon, lat);
            let baz = geodesy::azimuth_deg(lon, lat, source.lon, source.lat);
            let distance = geodesy::distance_km(source.lon, source.lat, lon, lat);
            let expected_angle = geodesy::wrap_degrees(baz + 180.0);

            let code = if !support.covers(i, j, lon, lat) {
                RejectReason::NoData
            } else if curvature.flagged[[i, j]] {
                RejectReason::Curvature
            } else if distance < near_source_km {
                RejectReason::NearSource
            } else if !velocity.is_finite()
                || velocity < quality.min_velocity
                || velocity > quality.max_velocity
            {
                RejectReason::VelocityOutOfRange
            } else if geodesy::angular_difference(angle, expected_angle)
                > quality.max_direction_deviation_deg
            {
                RejectReason::DirectionMismatch
            } else {
                RejectReason::Accepted
            };

            reason[[a, b]] = code.code();
            app_velocity[[a, b]] = if code.is_accepted() { velocity } else { 0.0 };
            propagation_angle[[a, b]] = angle;
            azimuth[[a, b]] = az;
            back_azimuth[[a, b]] = baz;
        }
    }

    let (lon, lat) = region.mesh();
    Ok(FieldProducts {
        app_velocity,
        reason,
        propagation_angle,
        azimuth,
        back_azimuth,
        travel_time: surface.values.clone(),
        lon,
        lat,
    })
}

fn expect_shape(
    name: &'static str,
    found: (usize, usize),
    expected: (usize, usize),
) -> Result<(), FieldError> {
    if found == expected {
        Ok(())
    } else {
        Err(FieldError::ShapeMismatch {
            name,
            expected,
            found,
        })
    }
}

/// Data-support test for one gradient mode.
enum Support<'a> {
    Neighbourhood {
        constrained: &'a Array2<bool>,
        radius: usize,
    },
    Cutoff {
        points: Vec<(f64, f64)>,
        km: f64,
    },
}

impl<'a> Support<'a> {
    fn new(
        region: &StudyRegion,
        surface: &'a Surface,
        samples: &[ScatteredSample],
        mode: GradientMode,
        config: &FieldConfig<'_>,
    ) -> Self {
        match mode.cutoff_km(config.period) {
            None => Self::Neighbourhood {
                constrained: &surface.constrained,
                radius: config.quality.neighbor_radius_nodes,
            },
            Some(km) => Self::Cutoff {
                points: samples
                    .iter()
                    .filter(|s| s.value.is_finite() && region.nearest_node(s.lon, s.lat).is_some())
                    .map(|s| (s.lon, s.lat))
                    .collect(),
                km,
            },
        }
    }

    fn covers(&self, i: usize, j: usize, lon: f64, lat: f64) -> bool {
        match self {
            Self::Neighbourhood {
                constrained,
                radius,
            } => {
                let rows = i.saturating_sub(*radius)..=i.saturating_add(*radius);
                let cols = j.saturating_sub(*radius)..=j.saturating_add(*radius);
                rows.flat_map(|r| cols.clone().map(move |c| (r, c)))
                    .any(|node| constrained.get(node) == Some(&true))
            }
            Self::Cutoff { points, km } => points
                .iter()
                .any(|&(plon, plat)| geodesy::distance_km(plon, plat, lon, lat) <= *km),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use eikonal_types::{FieldType, Period};

    use super::*;
    use crate::builder::QualityParams;
    use crate::curvature::laplacian_check;
    use crate::interpolate::harmonic_surface;
    use crate::region::RegionBounds;

    const VELOCITY: f64 = 3.5;

    fn region() -> StudyRegion {
        StudyRegion::new(
            RegionBounds {
                minlon: 230.0,
                maxlon: 233.0,
                minlat: 35.0,
                maxlat: 38.0,
                dlon: 0.2,
                dlat: 0.2,
            },
            vec![Period::from_secs(10)],
        )
        .unwrap()
    }

    fn config<'a>(region: &'a StudyRegion, quality: &'a QualityParams) -> FieldConfig<'a> {
        FieldConfig {
            region,
            period: Period::from_secs(10),
            field_type: FieldType::Phase,
            quality,
        }
    }

    /// Travel times of a point source sampled at every grid node.
    fn point_source_samples(region: &StudyRegion, source: SourceLocation) -> Vec<ScatteredSample> {
        let (lon, lat) = region.mesh();
        lon.iter()
            .zip(lat.iter())
            .map(|(&x, &y)| {
                let t = geodesy::distance_km(source.lon, source.lat, x, y) / VELOCITY;
                ScatteredSample::new(x, y, t)
            })
            .collect()
    }

    fn run(
        region: &StudyRegion,
        quality: &QualityParams,
        samples: &[ScatteredSample],
        source: SourceLocation,
        mode: GradientMode,
    ) -> FieldProducts {
        let cfg = config(region, quality);
        let surface = harmonic_surface(region, samples, 20_000, 1e-10).unwrap();
        let mask = laplacian_check(region, &surface, quality.curvature_threshold).unwrap();
        gradient_qc(&cfg, &surface, &mask, samples, source, mode).unwrap()
    }

    #[test]
    fn distant_source_recovers_velocity() {
        let region = region();
        let quality = QualityParams::default();
        let source = SourceLocation { lon: 222.0, lat: 36.5 };
        let samples = point_source_samples(&region, source);
        let products = run(&region, &quality, &samples, source, GradientMode::NearestNeighbor);

        assert!(products.validate_shapes(&region).is_ok());
        assert_eq!(products.accepted_count(), products.reason.len());
        for &v in &products.app_velocity {
            assert!((v - VELOCITY).abs() / VELOCITY < 0.01, "apparent velocity {v}");
        }
        // Waves from the west travel east.
        let centre = products.propagation_angle[[5, 5]];
        assert!(geodesy::angular_difference(centre, 90.0) < 10.0, "angle {centre}");
        let baz = products.back_azimuth[[5, 5]];
        assert!(geodesy::angular_difference(baz, 270.0) < 10.0, "baz {baz}");
    }

    #[test]
    fn nodes_around_an_inner_source_are_rejected() {
        let region = region();
        let quality = QualityParams::default();
        let source = SourceLocation { lon: 231.6, lat: 36.6 };
        let samples = point_source_samples(&region, source);
        let products = run(&region, &quality, &samples, source, GradientMode::NearestNeighbor);

        // Source node is (8, 8) on the full grid, (6, 6) in the interior.
        assert_ne!(products.reason[[6, 6]], RejectReason::Accepted.code());
        assert!(products.app_velocity[[6, 6]].abs() < f64::EPSILON);
        assert!(products.accepted_count() > 0);
    }

    #[test]
    fn flat_surface_is_out_of_velocity_range() {
        let region = region();
        let quality = QualityParams::default();
        let (lon, lat) = region.mesh();
        let samples: Vec<_> = lon
            .iter()
            .zip(lat.iter())
            .map(|(&x, &y)| ScatteredSample::new(x, y, 42.0))
            .collect();
        let source = SourceLocation { lon: 200.0, lat: 36.0 };
        let products = run(&region, &quality, &samples, source, GradientMode::NearestNeighbor);
        assert!(
            products
                .reason
                .iter()
                .all(|&c| c == RejectReason::VelocityOutOfRange.code())
        );
        assert!(products.app_velocity.iter().all(|&v| v.abs() < f64::EPSILON));
    }

    #[test]
    fn sparse_samples_leave_nodes_without_data() {
        let region = region();
        let quality = QualityParams::default();
        let source = SourceLocation { lon: 222.0, lat: 36.5 };
        let samples: Vec<_> = point_source_samples(&region, source)
            .into_iter()
            .filter(|s| s.lon < 230.5 && s.lat < 35.5)
            .collect();
        let products = run(&region, &quality, &samples, source, GradientMode::NearestNeighbor);
        let (rows, cols) = region.stencil_shape();
        assert_eq!(
            products.reason[[rows - 1, cols - 1]],
            RejectReason::NoData.code()
        );
        assert_ne!(products.reason[[0, 0]], RejectReason::NoData.code());
    }

    #[test]
    fn neighbourhood_support_stops_at_the_grid_edge() {
        let mut constrained = Array2::from_elem((6, 6), false);
        constrained[[0, 0]] = true;
        let support = Support::Neighbourhood {
            constrained: &constrained,
            radius: 2,
        };
        assert!(support.covers(2, 2, 0.0, 0.0));
        assert!(support.covers(0, 1, 0.0, 0.0));
        assert!(!support.covers(3, 2, 0.0, 0.0));
        assert!(!support.covers(5, 5, 0.0, 0.0));
    }

    #[test]
    fn distance_cutoff_mode_uses_km() {
        let region = region();
        let quality = QualityParams::default();
        let source = SourceLocation { lon: 222.0, lat: 36.5 };
        let samples: Vec<_> = point_source_samples(&region, source)
            .into_iter()
            .filter(|s| s.lon < 230.5 && s.lat < 35.5)
            .collect();

        let tight = run(&region, &quality, &samples, source, GradientMode::DistanceCutoff { km: Some(10.0) });
        let (rows, cols) = region.stencil_shape();
        assert_eq!(tight.reason[[rows - 1, cols - 1]], RejectReason::NoData.code());

        let loose = run(&region, &quality, &samples, source, GradientMode::DistanceCutoff { km: Some(1000.0) });
        assert_ne!(loose.reason[[rows - 1, cols - 1]], RejectReason::NoData.code());
    }
}
