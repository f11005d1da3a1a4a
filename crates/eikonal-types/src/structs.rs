//! Plain data carried between the archive, the processor and the builder.

use serde::{Deserialize, Serialize};

/// Normalize a longitude into `[0, 360)`.
///
/// Negative longitudes are shifted by one full turn; everything else is
/// returned unchanged.
pub fn normalize_longitude(lon: f64) -> f64 {
    if lon < 0.0 { lon + 360.0 } else { lon }
}

/// Source coordinates as reported by the waveform archive.
///
/// Field order follows the archive (`latitude`, `elevation`, `longitude`).
/// Elevation is carried for completeness and ignored by field building.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceCoordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Elevation in metres.
    #[serde(default)]
    pub elevation: f64,
    /// Longitude in degrees, any convention.
    pub longitude: f64,
}

/// Source position on the study grid's longitude convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Longitude in `[0, 360)`.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl From<SourceCoordinates> for SourceLocation {
    fn from(coords: SourceCoordinates) -> Self {
        Self {
            lon: normalize_longitude(coords.longitude),
            lat: coords.latitude,
        }
    }
}

/// One scattered `(lon, lat, value)` input to surface interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScatteredSample {
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
    /// Sample value.
    pub value: f64,
}

impl ScatteredSample {
    /// Create a sample.
    pub const fn new(lon: f64, lat: f64, value: f64) -> Self {
        Self { lon, lat, value }
    }
}
