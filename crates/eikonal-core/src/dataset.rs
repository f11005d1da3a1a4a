//! Study region attributes on the store root.
//!
//! The region is written once with [`set_input_parameters`] and read back
//! by every later stage with [`read_region`], which re-validates it and
//! checks the stored grid dimensions against the bounds.

use eikonal_field::{RegionBounds, RegionError, StudyRegion};
use eikonal_store::{StoreError, TreeStore};
use eikonal_types::{Period, PeriodError};

use crate::run::list_runs;

/// Root attribute names.
pub mod attrs {
    /// Period list in seconds.
    pub const PERIOD_ARRAY: &str = "period_array";
    /// Western edge.
    pub const MINLON: &str = "minlon";
    /// Eastern edge.
    pub const MAXLON: &str = "maxlon";
    /// Southern edge.
    pub const MINLAT: &str = "minlat";
    /// Northern edge.
    pub const MAXLAT: &str = "maxlat";
    /// Longitude spacing.
    pub const DLON: &str = "dlon";
    /// Latitude spacing.
    pub const DLAT: &str = "dlat";
    /// Node count along longitude.
    pub const NLON: &str = "Nlon";
    /// Node count along latitude.
    pub const NLAT: &str = "Nlat";
}

/// Errors reading or writing the study region.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// The store has no study region yet.
    #[error("store has no input parameters; run init first")]
    NotInitialised,

    /// A different region is already in use by existing runs.
    #[error("store already holds {runs} run(s) over a different region")]
    RegionConflict {
        /// Number of existing runs.
        runs: usize,
    },

    /// The stored or requested region is invalid.
    #[error(transparent)]
    Region(#[from] RegionError),

    /// A stored period is not a positive finite number.
    #[error(transparent)]
    Period(#[from] PeriodError),

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Write the study region to the store root.
///
/// Rewriting is allowed while the store holds no runs, or when the region
/// is unchanged.
///
/// # Errors
///
/// Returns [`DatasetError::RegionConflict`] if runs exist over a different
/// region.
#[allow(clippy::cast_precision_loss)]
pub fn set_input_parameters(store: &mut TreeStore, region: &StudyRegion) -> Result<(), DatasetError> {
    let runs = list_runs(store).len();
    if runs > 0 {
        match read_region(store) {
            Ok(existing) if existing == *region => {
                tracing::debug!("Input parameters unchanged");
                return Ok(());
            }
            Ok(_) | Err(DatasetError::NotInitialised) => {
                return Err(DatasetError::RegionConflict { runs });
            }
            Err(e) => return Err(e),
        }
    }

    let b = region.bounds();
    let periods: Vec<f64> = region.periods().iter().map(|p| p.as_f64()).collect();
    let root = store.root_mut();
    root.set_attr(attrs::PERIOD_ARRAY, periods)?;
    root.set_attr(attrs::MINLON, b.minlon)?;
    root.set_attr(attrs::MAXLON, b.maxlon)?;
    root.set_attr(attrs::MINLAT, b.minlat)?;
    root.set_attr(attrs::MAXLAT, b.maxlat)?;
    root.set_attr(attrs::DLON, b.dlon)?;
    root.set_attr(attrs::DLAT, b.dlat)?;
    root.set_attr(attrs::NLON, region.nlon() as f64)?;
    root.set_attr(attrs::NLAT, region.nlat() as f64)?;

    tracing::info!(
        nlon = region.nlon(),
        nlat = region.nlat(),
        periods = region.periods().len(),
        "Set input parameters"
    );
    Ok(())
}

/// Read and re-validate the study region from the store root.
///
/// # Errors
///
/// Returns [`DatasetError::NotInitialised`] if the attributes are absent,
/// or [`DatasetError::Region`] if they are inconsistent, including stored
/// `Nlon`/`Nlat` that disagree with the bounds.
#[allow(clippy::cast_precision_loss)]
pub fn read_region(store: &TreeStore) -> Result<StudyRegion, DatasetError> {
    let root = store.root();
    if root.attr(attrs::NLON).is_none() {
        return Err(DatasetError::NotInitialised);
    }
    let bounds = RegionBounds {
        minlon: root.attr_f64(attrs::MINLON)?,
        maxlon: root.attr_f64(attrs::MAXLON)?,
        minlat: root.attr_f64(attrs::MINLAT)?,
        maxlat: root.attr_f64(attrs::MAXLAT)?,
        dlon: root.attr_f64(attrs::DLON)?,
        dlat: root.attr_f64(attrs::DLAT)?,
    };
    let periods = root
        .attr_floats(attrs::PERIOD_ARRAY)?
        .iter()
        .map(|&p| Period::from_f64(p))
        .collect::<Result<Vec<_>, _>>()?;
    let region = StudyRegion::new(bounds, periods)?;

    for (name, stored, derived) in [
        (attrs::NLON, root.attr_f64(attrs::NLON)?, region.nlon()),
        (attrs::NLAT, root.attr_f64(attrs::NLAT)?, region.nlat()),
    ] {
        if (stored - derived as f64).abs() > 1e-6 {
            return Err(RegionError::InvalidConfiguration {
                reason: format!("stored {name}={stored} but bounds give {derived}"),
            }
            .into());
        }
    }
    Ok(region)
}
