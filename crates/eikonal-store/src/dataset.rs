//! Dense 2-D float datasets.
//!
//! Values are stored row-major. JSON has no NaN, so non-finite values are
//! written as `null` and read back as NaN; grids such as an untouched
//! curvature border survive the round trip.

use ndarray::Array2;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StoreError;

/// A rows x cols array of `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset", into = "RawDataset")]
pub struct Dataset {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl Dataset {
    /// Build a dataset from row-major values.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatasetShape`] if `values.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self, StoreError> {
        if rows.checked_mul(cols) != Some(values.len()) {
            return Err(StoreError::DatasetShape {
                rows,
                cols,
                len: values.len(),
            });
        }
        Ok(Self { rows, cols, values })
    }

    /// Copy an array into a dataset.
    pub fn from_array(array: &Array2<f64>) -> Self {
        let (rows, cols) = array.dim();
        Self {
            rows,
            cols,
            values: array.iter().copied().collect(),
        }
    }

    /// Copy an integer-valued array (reason codes, counts) into a dataset.
    pub fn from_codes<T: Copy + Into<f64>>(array: &Array2<T>) -> Self {
        let (rows, cols) = array.dim();
        Self {
            rows,
            cols,
            values: array.iter().map(|&v| v.into()).collect(),
        }
    }

    /// Rebuild the array.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Shape`] if the shape cannot be honoured.
    pub fn to_array(&self) -> Result<Array2<f64>, StoreError> {
        Ok(Array2::from_shape_vec(
            (self.rows, self.cols),
            self.values.clone(),
        )?)
    }

    /// `(rows, cols)`.
    pub const fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Row-major values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

impl From<&Array2<f64>> for Dataset {
    fn from(array: &Array2<f64>) -> Self {
        Self::from_array(array)
    }
}

#[derive(Serialize, Deserialize)]
struct RawDataset {
    rows: usize,
    cols: usize,
    #[serde(serialize_with = "nan_as_null", deserialize_with = "null_as_nan")]
    values: Vec<f64>,
}

impl TryFrom<RawDataset> for Dataset {
    type Error = StoreError;

    fn try_from(raw: RawDataset) -> Result<Self, Self::Error> {
        Self::new(raw.rows, raw.cols, raw.values)
    }
}

impl From<Dataset> for RawDataset {
    fn from(d: Dataset) -> Self {
        Self {
            rows: d.rows,
            cols: d.cols,
            values: d.values,
        }
    }
}

fn nan_as_null<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(values.iter().map(|v| v.is_finite().then_some(*v)))
}

fn null_as_nan<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
    let raw = Vec::<Option<f64>>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}
