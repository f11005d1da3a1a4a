//! Shared type definitions for the Eikonal tomography workspace.
//!
//! This crate is the single source of truth for the vocabulary used across
//! the workspace: identifiers for runs and events, the travel-time field
//! type, per-node rejection reasons, exact decimal periods, and the
//! scattered samples handed to the field builder.
//!
//! # Modules
//!
//! - [`ids`] -- Run and event identifiers
//! - [`enums`] -- [`FieldType`] and [`RejectReason`]
//! - [`period`] -- [`Period`] with group-name and archive-suffix rendering
//! - [`structs`] -- Source locations, coordinates and scattered samples

pub mod enums;
pub mod ids;
pub mod period;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{FieldType, RejectReason};
pub use ids::{EventId, EventIdError, RunId};
pub use period::{Period, PeriodError};
pub use structs::{ScatteredSample, SourceCoordinates, SourceLocation, normalize_longitude};
