//! Hierarchical attribute and array store for Eikonal tomography.
//!
//! A [`TreeStore`] is a tree of named [`GroupNode`]s. Every group carries
//! scalar or vector attributes and named 2-D float datasets, and owns its
//! child groups. The whole tree is held in memory and, when opened from a
//! path, written back to a single JSON document on [`TreeStore::flush`].
//!
//! ```text
//! /                       period_array, minlon, ... Nlon, Nlat
//! +-- Eikonal_run_0       fieldtype, created_at
//!     +-- 10_sec          event_count, [Nmeasure]
//!         +-- NET.STA     evlo, evla, [appV, reason_n, proAngle, ...]
//! ```
//!
//! # Modules
//!
//! - [`path`] -- Validated slash-separated group paths
//! - [`node`] -- Groups and their attributes
//! - [`dataset`] -- Dense 2-D float datasets
//! - [`tree`] -- The store itself and its file backing
//! - [`error`] -- Shared error types

pub mod dataset;
pub mod error;
pub mod node;
pub mod path;
pub mod tree;

// Re-export primary types for convenience.
pub use dataset::Dataset;
pub use error::StoreError;
pub use node::{AttrValue, GroupNode};
pub use path::GroupPath;
pub use tree::TreeStore;
