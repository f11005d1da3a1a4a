//! The study region: grid bounds, spacing, derived dimensions and periods.
//!
//! A [`StudyRegion`] is created once, validated up front, and shared
//! read-only by every downstream component. Grid arrays are indexed
//! `[latitude, longitude]`, with latitude increasing along axis 0.

use eikonal_types::Period;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Nodes discarded on each side of the grid by the finite-difference
/// stencils of the field builder.
pub const STENCIL_MARGIN: usize = 2;

/// Nodes removed along each axis by the stencil margin on both sides.
const STENCIL_TRIM: usize = 2 * STENCIL_MARGIN;

/// Tolerance when checking that derived grid dimensions are integral.
const DIMENSION_TOLERANCE: f64 = 1e-6;

/// Smallest grid dimension that still leaves one node after trimming.
const MIN_DIMENSION: usize = STENCIL_TRIM + 1;

/// Largest accepted `Nlon * Nlat`.
pub const MAX_NODES: usize = 4_000_000;

/// Errors raised when a study region is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegionError {
    /// The bounds, spacing or period list cannot describe a usable grid.
    #[error("invalid study region configuration: {reason}")]
    InvalidConfiguration {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl RegionError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}

/// Raw grid bounds and spacing in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionBounds {
    /// Western edge.
    pub minlon: f64,
    /// Eastern edge.
    pub maxlon: f64,
    /// Southern edge.
    pub minlat: f64,
    /// Northern edge.
    pub maxlat: f64,
    /// Longitude spacing.
    #[serde(default = "default_spacing")]
    pub dlon: f64,
    /// Latitude spacing.
    #[serde(default = "default_spacing")]
    pub dlat: f64,
}

const fn default_spacing() -> f64 {
    0.2
}

/// A validated study region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyRegion {
    bounds: RegionBounds,
    nlon: usize,
    nlat: usize,
    periods: Vec<Period>,
}

impl StudyRegion {
    /// Validate bounds and periods and derive the grid dimensions.
    ///
    /// An empty `periods` list is replaced by [`Period::default_list`].
    /// `Nlon = (maxlon - minlon) / dlon + 1` and likewise for `Nlat`; both
    /// must be integral (to within 1e-6) and at least 5, and the grid may
    /// hold at most [`MAX_NODES`] nodes.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::InvalidConfiguration`] for non-finite values,
    /// latitudes outside [-90, 90], inverted bounds, non-positive spacing,
    /// non-integral, too small or too large dimensions, or duplicated
    /// periods.
    pub fn new(bounds: RegionBounds, periods: Vec<Period>) -> Result<Self, RegionError> {
        let RegionBounds {
            minlon,
            maxlon,
            minlat,
            maxlat,
            dlon,
            dlat,
        } = bounds;

        let all = [minlon, maxlon, minlat, maxlat, dlon, dlat];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(RegionError::invalid("bounds and spacing must be finite"));
        }
        if dlon <= 0.0 || dlat <= 0.0 {
            return Err(RegionError::invalid(format!(
                "spacing must be positive (dlon={dlon}, dlat={dlat})"
            )));
        }
        if minlon >= maxlon {
            return Err(RegionError::invalid(format!(
                "minlon {minlon} must be below maxlon {maxlon}"
            )));
        }
        if minlat >= maxlat {
            return Err(RegionError::invalid(format!(
                "minlat {minlat} must be below maxlat {maxlat}"
            )));
        }
        if minlat < -90.0 || maxlat > 90.0 {
            return Err(RegionError::invalid(format!(
                "latitudes must lie within [-90, 90] (minlat={minlat}, maxlat={maxlat})"
            )));
        }

        let nlon = derive_dimension("Nlon", minlon, maxlon, dlon)?;
        let nlat = derive_dimension("Nlat", minlat, maxlat, dlat)?;
        if nlon.checked_mul(nlat).is_none_or(|nodes| nodes > MAX_NODES) {
            return Err(RegionError::invalid(format!(
                "{nlon} x {nlat} grid exceeds {MAX_NODES} nodes"
            )));
        }

        let periods = if periods.is_empty() {
            Self::default_periods()
        } else {
            periods
        };
        for (i, p) in periods.iter().enumerate() {
            if periods.iter().skip(i.saturating_add(1)).any(|q| q == p) {
                return Err(RegionError::invalid(format!("period {p} listed twice")));
            }
        }

        Ok(Self {
            bounds,
            nlon,
            nlat,
            periods,
        })
    }

    /// Periods processed when none are configured: 6 to 40 s every 2 s,
    /// then 45 to 60 s every 5 s.
    pub fn default_periods() -> Vec<Period> {
        Period::default_list()
    }

    /// The raw bounds and spacing.
    pub const fn bounds(&self) -> &RegionBounds {
        &self.bounds
    }

    /// Number of grid nodes along longitude.
    pub const fn nlon(&self) -> usize {
        self.nlon
    }

    /// Number of grid nodes along latitude.
    pub const fn nlat(&self) -> usize {
        self.nlat
    }

    /// Periods to process, in configured order.
    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    /// Full grid shape `(Nlat, Nlon)`.
    pub const fn grid_shape(&self) -> (usize, usize) {
        (self.nlat, self.nlon)
    }

    /// Shape after trimming the stencil margin: `(Nlat - 4, Nlon - 4)`.
    pub const fn stencil_shape(&self) -> (usize, usize) {
        (
            self.nlat.saturating_sub(STENCIL_TRIM),
            self.nlon.saturating_sub(STENCIL_TRIM),
        )
    }

    /// Longitude of grid column `j`.
    #[allow(clippy::cast_precision_loss)]
    pub fn lon_at(&self, j: usize) -> f64 {
        self.bounds.minlon + j as f64 * self.bounds.dlon
    }

    /// Latitude of grid row `i`.
    #[allow(clippy::cast_precision_loss)]
    pub fn lat_at(&self, i: usize) -> f64 {
        self.bounds.minlat + i as f64 * self.bounds.dlat
    }

    /// Node longitudes, west to east.
    pub fn lon_axis(&self) -> Vec<f64> {
        (0..self.nlon).map(|j| self.lon_at(j)).collect()
    }

    /// Node latitudes, south to north.
    pub fn lat_axis(&self) -> Vec<f64> {
        (0..self.nlat).map(|i| self.lat_at(i)).collect()
    }

    /// Longitude and latitude of every node as `(Nlat, Nlon)` arrays.
    pub fn mesh(&self) -> (Array2<f64>, Array2<f64>) {
        let lon = Array2::from_shape_fn(self.grid_shape(), |(_, j)| self.lon_at(j));
        let lat = Array2::from_shape_fn(self.grid_shape(), |(i, _)| self.lat_at(i));
        (lon, lat)
    }

    /// Nearest node `(row, column)` to a position, if it lies on the grid.
    ///
    /// Positions up to half a cell outside the outer nodes still snap to
    /// the border.
    pub fn nearest_node(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        let row = snap_index(lat, self.bounds.minlat, self.bounds.dlat, self.nlat)?;
        let col = snap_index(lon, self.bounds.minlon, self.bounds.dlon, self.nlon)?;
        Some((row, col))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn derive_dimension(name: &str, min: f64, max: f64, step: f64) -> Result<usize, RegionError> {
    let exact = (max - min) / step + 1.0;
    let rounded = exact.round();
    if (exact - rounded).abs() > DIMENSION_TOLERANCE {
        return Err(RegionError::invalid(format!(
            "{name} = {exact} is not a whole number of nodes"
        )));
    }
    // rounded is finite, positive and integral here.
    let count = rounded as usize;
    if count < MIN_DIMENSION {
        return Err(RegionError::invalid(format!(
            "{name} = {count} leaves no nodes after trimming the {STENCIL_MARGIN}-node margin"
        )));
    }
    Ok(count)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn snap_index(value: f64, origin: f64, step: f64, count: usize) -> Option<usize> {
    if !value.is_finite() {
        return None;
    }
    let index = ((value - origin) / step).round();
    if index < 0.0 || index > (count.saturating_sub(1)) as f64 {
        return None;
    }
    Some(index as usize)
}
