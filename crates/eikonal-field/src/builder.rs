//! Scalar field builder trait, its configuration, and the grid reference
//! implementation.
//!
//! For every event and period the processor hands the builder a list of
//! scattered samples and asks for three things in turn: a gridded
//! [`Surface`], a [`CurvatureMask`] over that surface, and finally the
//! quality-controlled [`FieldProducts`] that get persisted. The
//! [`ScalarFieldBuilder`] trait abstracts how those are computed -- an
//! external spline engine, the bundled [`GridFieldBuilder`], or a test
//! stub.

use eikonal_types::{FieldType, Period, ScatteredSample, SourceLocation};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::FieldError;
use crate::region::StudyRegion;
use crate::{curvature, gradient, interpolate};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How gradient QC decides that a node has no supporting data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GradientMode {
    /// A node needs a sample within a few grid nodes of it.
    NearestNeighbor,
    /// A node needs a sample within a great-circle distance.
    DistanceCutoff {
        /// Cutoff in km; `None` derives one from the period.
        km: Option<f64>,
    },
}

impl GradientMode {
    /// Kilometres of cutoff per second of period when none is given.
    pub const DEFAULT_KM_PER_SECOND: f64 = 12.0;

    /// Effective distance cutoff for a period, if this mode uses one.
    pub fn cutoff_km(self, period: Period) -> Option<f64> {
        match self {
            Self::NearestNeighbor => None,
            Self::DistanceCutoff { km } => {
                Some(km.unwrap_or_else(|| Self::DEFAULT_KM_PER_SECOND * period.as_f64()))
            }
        }
    }
}

/// Configured flavour of [`GradientMode`], as written in YAML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientModeKind {
    /// See [`GradientMode::NearestNeighbor`].
    #[default]
    NearestNeighbor,
    /// See [`GradientMode::DistanceCutoff`].
    DistanceCutoff,
}

/// Tunable thresholds of the curvature and gradient checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityParams {
    /// Gradient QC data-support mode.
    #[serde(default)]
    pub gradient_mode: GradientModeKind,

    /// Distance cutoff in km for [`GradientModeKind::DistanceCutoff`].
    #[serde(default)]
    pub cutoff_distance_km: Option<f64>,

    /// Neighbourhood half-width, in nodes, for the nearest-neighbour mode.
    #[serde(default = "default_neighbor_radius_nodes")]
    pub neighbor_radius_nodes: usize,

    /// Largest accepted |Laplacian| of the surface, in s/km^2.
    #[serde(default = "default_curvature_threshold")]
    pub curvature_threshold: f64,

    /// Smallest accepted apparent velocity in km/s.
    #[serde(default = "default_min_velocity")]
    pub min_velocity: f64,

    /// Largest accepted apparent velocity in km/s.
    #[serde(default = "default_max_velocity")]
    pub max_velocity: f64,

    /// Largest accepted deviation of the propagation direction from the
    /// great-circle direction, in degrees.
    #[serde(default = "default_max_direction_deviation_deg")]
    pub max_direction_deviation_deg: f64,

    /// Nodes closer to the source than this many wavelengths are rejected.
    #[serde(default = "default_near_source_wavelengths")]
    pub near_source_wavelengths: f64,

    /// Velocity used to turn a period into a wavelength, in km/s.
    #[serde(default = "default_reference_velocity")]
    pub reference_velocity: f64,

    /// Iteration ceiling of the surface relaxation.
    #[serde(default = "default_max_relaxation_iterations")]
    pub max_relaxation_iterations: u32,

    /// Convergence tolerance of the surface relaxation, relative to the
    /// largest sample magnitude.
    #[serde(default = "default_relaxation_tolerance")]
    pub relaxation_tolerance: f64,
}

impl QualityParams {
    /// The gradient mode these parameters select.
    pub const fn gradient_mode(&self) -> GradientMode {
        match self.gradient_mode {
            GradientModeKind::NearestNeighbor => GradientMode::NearestNeighbor,
            GradientModeKind::DistanceCutoff => GradientMode::DistanceCutoff {
                km: self.cutoff_distance_km,
            },
        }
    }
}

impl Default for QualityParams {
    fn default() -> Self {
        Self {
            gradient_mode: GradientModeKind::NearestNeighbor,
            cutoff_distance_km: None,
            neighbor_radius_nodes: default_neighbor_radius_nodes(),
            curvature_threshold: default_curvature_threshold(),
            min_velocity: default_min_velocity(),
            max_velocity: default_max_velocity(),
            max_direction_deviation_deg: default_max_direction_deviation_deg(),
            near_source_wavelengths: default_near_source_wavelengths(),
            reference_velocity: default_reference_velocity(),
            max_relaxation_iterations: default_max_relaxation_iterations(),
            relaxation_tolerance: default_relaxation_tolerance(),
        }
    }
}

const fn default_neighbor_radius_nodes() -> usize {
    2
}

const fn default_curvature_threshold() -> f64 {
    0.005
}

const fn default_min_velocity() -> f64 {
    1.5
}

const fn default_max_velocity() -> f64 {
    6.0
}

const fn default_max_direction_deviation_deg() -> f64 {
    60.0
}

const fn default_near_source_wavelengths() -> f64 {
    1.0
}

const fn default_reference_velocity() -> f64 {
    3.0
}

const fn default_max_relaxation_iterations() -> u32 {
    5000
}

const fn default_relaxation_tolerance() -> f64 {
    1e-8
}

/// Everything a builder needs to know about one event/period field.
#[derive(Debug, Clone, Copy)]
pub struct FieldConfig<'a> {
    /// The study grid.
    pub region: &'a StudyRegion,
    /// Period being processed.
    pub period: Period,
    /// Travel-time flavour of the run.
    pub field_type: FieldType,
    /// Quality-control thresholds.
    pub quality: &'a QualityParams,
}

// ---------------------------------------------------------------------------
// Intermediate and final products
// ---------------------------------------------------------------------------

/// A gridded surface fitted to scattered samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    /// Fitted values, `(Nlat, Nlon)`.
    pub values: Array2<f64>,
    /// Nodes pinned directly by at least one sample.
    pub constrained: Array2<bool>,
    /// Relaxation sweeps performed.
    pub iterations: u32,
}

/// Result of the curvature check.
#[derive(Debug, Clone, PartialEq)]
pub struct CurvatureMask {
    /// Laplacian of the surface in s/km^2, NaN on the outer ring.
    pub laplacian: Array2<f64>,
    /// Nodes whose curvature exceeds the threshold.
    pub flagged: Array2<bool>,
}

/// Per-node arrays persisted for one event.
///
/// The QC arrays cover the stencil interior `(Nlat - 4, Nlon - 4)`; the
/// surface and coordinate arrays cover the full grid `(Nlat, Nlon)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldProducts {
    /// Apparent velocity in km/s; 0 where rejected.
    pub app_velocity: Array2<f64>,
    /// Reason codes, 0 for accepted nodes.
    pub reason: Array2<u8>,
    /// Propagation direction of the wavefront, degrees from north.
    pub propagation_angle: Array2<f64>,
    /// Azimuth from the source to each node.
    pub azimuth: Array2<f64>,
    /// Back-azimuth from each node to the source.
    pub back_azimuth: Array2<f64>,
    /// Fitted travel-time surface in s.
    pub travel_time: Array2<f64>,
    /// Node longitudes.
    pub lon: Array2<f64>,
    /// Node latitudes.
    pub lat: Array2<f64>,
}

impl FieldProducts {
    /// Check every array against the shapes required by the region.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::ShapeMismatch`] naming the first offending
    /// array.
    pub fn validate_shapes(&self, region: &StudyRegion) -> Result<(), FieldError> {
        let interior = region.stencil_shape();
        let full = region.grid_shape();
        let checks: [(&'static str, (usize, usize), (usize, usize)); 8] = [
            ("appV", self.app_velocity.dim(), interior),
            ("reason_n", self.reason.dim(), interior),
            ("proAngle", self.propagation_angle.dim(), interior),
            ("az", self.azimuth.dim(), interior),
            ("baz", self.back_azimuth.dim(), interior),
            ("travelT", self.travel_time.dim(), full),
            ("lonArr", self.lon.dim(), full),
            ("latArr", self.lat.dim(), full),
        ];
        for (name, found, expected) in checks {
            if found != expected {
                return Err(FieldError::ShapeMismatch {
                    name,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    /// Number of accepted nodes.
    pub fn accepted_count(&self) -> usize {
        self.reason.iter().filter(|&&code| code == 0).count()
    }
}

// ---------------------------------------------------------------------------
// Builder trait
// ---------------------------------------------------------------------------

/// A source of per-event gridded fields.
///
/// The processor calls the three operations in order for every event that
/// has archive data for the current period. Samples carry the apparent
/// velocity `distance / travel_time` of each station, preceded by a
/// zero-valued sample at the source.
pub trait ScalarFieldBuilder {
    /// Fit a travel-time surface over the study grid to the scattered
    /// samples.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError`] if no surface can be fitted.
    fn interpolate(
        &self,
        config: &FieldConfig<'_>,
        samples: &[ScatteredSample],
        source: SourceLocation,
    ) -> Result<Surface, FieldError>;

    /// Flag nodes whose curvature is inconsistent with a plausible
    /// wavefront.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError`] if the surface does not match the grid.
    fn check_curvature(
        &self,
        config: &FieldConfig<'_>,
        surface: &Surface,
    ) -> Result<CurvatureMask, FieldError>;

    /// Derive apparent velocity and directions from the surface gradient,
    /// using the source as the propagation reference, and assign a reason
    /// code to every interior node.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError`] if the inputs do not match the grid.
    fn gradient_qc(
        &self,
        config: &FieldConfig<'_>,
        surface: &Surface,
        curvature: &CurvatureMask,
        samples: &[ScatteredSample],
        source: SourceLocation,
        mode: GradientMode,
    ) -> Result<FieldProducts, FieldError>;
}

/// Self-contained finite-difference builder.
///
/// Travel times rebuilt from the velocity samples, harmonic surface
/// fitting, a 5-point Laplacian curvature check and central-difference
/// gradients on a spherical Earth.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridFieldBuilder;

impl GridFieldBuilder {
    /// Create a new grid builder.
    pub const fn new() -> Self {
        Self
    }
}

impl ScalarFieldBuilder for GridFieldBuilder {
    fn interpolate(
        &self,
        config: &FieldConfig<'_>,
        samples: &[ScatteredSample],
        source: SourceLocation,
    ) -> Result<Surface, FieldError> {
        let times = interpolate::travel_time_samples(samples, source);
        interpolate::harmonic_surface(
            config.region,
            &times,
            config.quality.max_relaxation_iterations,
            config.quality.relaxation_tolerance,
        )
    }

    fn check_curvature(
        &self,
        config: &FieldConfig<'_>,
        surface: &Surface,
    ) -> Result<CurvatureMask, FieldError> {
        curvature::laplacian_check(config.region, surface, config.quality.curvature_threshold)
    }

    fn gradient_qc(
        &self,
        config: &FieldConfig<'_>,
        surface: &Surface,
        curvature: &CurvatureMask,
        samples: &[ScatteredSample],
        source: SourceLocation,
        mode: GradientMode,
    ) -> Result<FieldProducts, FieldError> {
        gradient::gradient_qc(config, surface, curvature, samples, source, mode)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;
    use crate::geodesy;
    use crate::region::RegionBounds;

    fn region() -> StudyRegion {
        StudyRegion::new(
            RegionBounds {
                minlon: 230.0,
                maxlon: 232.0,
                minlat: 35.0,
                maxlat: 36.0,
                dlon: 0.2,
                dlat: 0.2,
            },
            vec![Period::from_secs(10)],
        )
        .unwrap()
    }

    fn products(interior: (usize, usize), full: (usize, usize)) -> FieldProducts {
        FieldProducts {
            app_velocity: Array2::zeros(interior),
            reason: Array2::zeros(interior),
            propagation_angle: Array2::zeros(interior),
            azimuth: Array2::zeros(interior),
            back_azimuth: Array2::zeros(interior),
            travel_time: Array2::zeros(full),
            lon: Array2::zeros(full),
            lat: Array2::zeros(full),
        }
    }

    #[test]
    fn shapes_follow_region() {
        let region = region();
        let ok = products(region.stencil_shape(), region.grid_shape());
        assert!(ok.validate_shapes(&region).is_ok());
        assert_eq!(ok.accepted_count(), 2 * 7);
    }

    #[test]
    fn wrong_interior_shape_is_named() {
        let region = region();
        let bad = products(region.grid_shape(), region.grid_shape());
        let err = bad.validate_shapes(&region);
        assert!(matches!(
            err,
            Err(FieldError::ShapeMismatch { name: "appV", .. })
        ));
    }

    #[test]
    fn grid_builder_recovers_velocity_from_seeded_samples() {
        let region = StudyRegion::new(
            RegionBounds {
                minlon: 230.0,
                maxlon: 233.0,
                minlat: 35.0,
                maxlat: 38.0,
                dlon: 0.2,
                dlat: 0.2,
            },
            vec![Period::from_secs(20)],
        )
        .unwrap();
        let quality = QualityParams::default();
        let config = FieldConfig {
            region: &region,
            period: Period::from_secs(20),
            field_type: FieldType::Phase,
            quality: &quality,
        };
        let source = SourceLocation { lon: 222.0, lat: 36.5 };

        // Stations on every node, a 3.5 km/s wave, source seeded first.
        let (lon, lat) = region.mesh();
        let mut samples = vec![ScatteredSample::new(source.lon, source.lat, 0.0)];
        samples.extend(lon.iter().zip(lat.iter()).map(|(&x, &y)| {
            let distance = geodesy::distance_km(source.lon, source.lat, x, y);
            let time = distance / 3.5;
            ScatteredSample::new(x, y, distance / time)
        }));

        let builder = GridFieldBuilder::new();
        let surface = builder.interpolate(&config, &samples, source).unwrap();
        let corner = geodesy::distance_km(source.lon, source.lat, 230.0, 35.0) / 3.5;
        assert!((surface.values[[0, 0]] - corner).abs() < 1e-6);

        let curvature = builder.check_curvature(&config, &surface).unwrap();
        let products = builder
            .gradient_qc(&config, &surface, &curvature, &samples, source, quality.gradient_mode())
            .unwrap();
        assert_eq!(products.accepted_count(), products.reason.len());
        for &v in &products.app_velocity {
            assert!((v - 3.5).abs() / 3.5 < 0.01, "apparent velocity {v}");
        }
    }

    #[test]
    fn gradient_mode_from_params() {
        let mut params = QualityParams::default();
        assert_eq!(params.gradient_mode(), GradientMode::NearestNeighbor);
        params.gradient_mode = GradientModeKind::DistanceCutoff;
        params.cutoff_distance_km = Some(150.0);
        assert_eq!(
            params.gradient_mode().cutoff_km(Period::from_secs(10)),
            Some(150.0)
        );
    }

    #[test]
    fn default_cutoff_scales_with_period() {
        let mode = GradientMode::DistanceCutoff { km: None };
        let cutoff = mode.cutoff_km(Period::from_secs(20)).unwrap();
        assert!((cutoff - 240.0).abs() < 1e-9);
        assert_eq!(GradientMode::NearestNeighbor.cutoff_km(Period::from_secs(20)), None);
    }

    #[test]
    fn quality_params_deserialize_with_defaults() {
        let params: QualityParams =
            serde_json::from_str(r#"{"gradient_mode": "distance_cutoff", "min_velocity": 2.0}"#)
                .unwrap();
        assert_eq!(params.gradient_mode, GradientModeKind::DistanceCutoff);
        assert!((params.min_velocity - 2.0).abs() < f64::EPSILON);
        assert_eq!(params.neighbor_radius_nodes, 2);
    }
}
