//! Study region grid and per-event scalar field construction.
//!
//! This crate models the numerical side of one event/period: the regular
//! lon/lat grid the study region defines, the [`ScalarFieldBuilder`] seam
//! through which scattered samples become a gridded surface with
//! quality-controlled apparent velocities, and [`GridFieldBuilder`], a
//! self-contained reference implementation of that seam.
//!
//! # Modules
//!
//! - [`region`] -- [`StudyRegion`]: validated bounds, spacing, derived grid
//!   dimensions and the period list.
//! - [`builder`] -- The [`ScalarFieldBuilder`] trait, its configuration and
//!   result types, and [`GridFieldBuilder`].
//! - [`interpolate`] -- Harmonic surface fitting by successive
//!   over-relaxation.
//! - [`curvature`] -- Laplacian-based curvature check.
//! - [`gradient`] -- Gradient quality control producing apparent velocity,
//!   propagation angle, azimuth, back-azimuth and reason codes.
//! - [`geodesy`] -- Great-circle distance and azimuth on a spherical Earth.
//! - [`error`] -- Error types for field construction.

pub mod builder;
pub mod curvature;
pub mod error;
pub mod geodesy;
pub mod gradient;
pub mod interpolate;
pub mod region;

// Re-export primary types at crate root.
pub use builder::{
    CurvatureMask, FieldConfig, FieldProducts, GradientMode, GradientModeKind, GridFieldBuilder,
    QualityParams, ScalarFieldBuilder, Surface,
};
pub use error::FieldError;
pub use region::{RegionBounds, RegionError, STENCIL_MARGIN, StudyRegion};
