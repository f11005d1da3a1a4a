//! Error types for the store.

use std::path::PathBuf;

/// Errors that can occur while reading or writing the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A group or dataset with this name already exists.
    #[error("name collision: {path} already exists")]
    NameCollision {
        /// Path of the existing group or dataset.
        path: String,
    },

    /// The parent of a group to create does not exist.
    #[error("parent group of {path} does not exist")]
    ParentNotFound {
        /// Path of the group that could not be created.
        path: String,
    },

    /// No group exists at the requested path.
    #[error("group not found: {path}")]
    NotFound {
        /// Requested path.
        path: String,
    },

    /// A group, dataset or attribute name is empty or contains `/`.
    #[error("invalid name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// An attribute is absent.
    #[error("missing attribute: {name}")]
    MissingAttr {
        /// Attribute name.
        name: String,
    },

    /// An attribute holds a value of a different kind.
    #[error("attribute {name} is not {expected}")]
    AttrType {
        /// Attribute name.
        name: String,
        /// Kind the caller asked for.
        expected: &'static str,
    },

    /// A dataset's value count does not match its declared shape.
    #[error("dataset of shape {rows}x{cols} cannot hold {len} values")]
    DatasetShape {
        /// Declared rows.
        rows: usize,
        /// Declared columns.
        cols: usize,
        /// Number of values supplied.
        len: usize,
    },

    /// Reading or writing the backing file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Backing file path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The backing file could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A dataset could not be reshaped into an array.
    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}
