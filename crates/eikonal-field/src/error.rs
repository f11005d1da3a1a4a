//! Error types for the `eikonal-field` crate.
//!
//! All fallible field-construction operations return [`FieldError`].

/// Errors that can occur while building a scalar field for one event.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    /// None of the scattered samples falls on the study grid.
    #[error("no usable sample lies inside the study grid")]
    NoSamplesInGrid,

    /// A result array does not have the shape the grid requires.
    #[error("array {name} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        /// Name of the offending array.
        name: &'static str,
        /// Shape required by the study region.
        expected: (usize, usize),
        /// Shape actually produced.
        found: (usize, usize),
    },

    /// An intermediate array could not be assembled.
    #[error("array construction failed: {0}")]
    Shape(#[from] ndarray::ShapeError),
}
