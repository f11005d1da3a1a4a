//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Field type
// ---------------------------------------------------------------------------

/// Which travel time a run is built from.
///
/// Each variant maps to a fixed column of the archive's per-station
/// measurement table and to the short tag stored on the run group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Phase travel time (`Tph`).
    Phase,
    /// Group travel time (`Tgr`).
    Group,
}

impl FieldType {
    /// Column of the measurement table holding this travel time.
    pub const fn column(self) -> usize {
        match self {
            Self::Phase => 2,
            Self::Group => 3,
        }
    }

    /// Short tag written to the run's `fieldtype` attribute.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Phase => "Tph",
            Self::Group => "Tgr",
        }
    }

    /// Parse a `fieldtype` tag back into a variant.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Tph" => Some(Self::Phase),
            "Tgr" => Some(Self::Group),
            _ => None,
        }
    }
}

impl core::fmt::Display for FieldType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.tag())
    }
}

// ---------------------------------------------------------------------------
// Reject reason
// ---------------------------------------------------------------------------

/// Per-node outcome of the curvature and gradient quality checks.
///
/// Stored on disk as its integer code. Code `0` is the only accepted
/// value; every other code marks the node as unusable for stacking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RejectReason {
    /// The node carries a usable apparent velocity.
    Accepted,
    /// No measurement close enough to constrain the node.
    NoData,
    /// The fitted surface curves too sharply at the node.
    Curvature,
    /// The node lies too close to the source.
    NearSource,
    /// The apparent velocity is non-finite or outside the allowed range.
    VelocityOutOfRange,
    /// The local propagation direction disagrees with the great-circle path.
    DirectionMismatch,
}

impl RejectReason {
    /// Integer code persisted in `reason_n`.
    pub const fn code(self) -> u8 {
        match self {
            Self::Accepted => 0,
            Self::NoData => 1,
            Self::Curvature => 2,
            Self::NearSource => 3,
            Self::VelocityOutOfRange => 4,
            Self::DirectionMismatch => 5,
        }
    }

    /// Whether the node counts as a measurement.
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Whether a stored `reason_n` value marks an accepted node.
    ///
    /// Any value other than exactly zero is a rejection, including codes
    /// written by other builders that this enum does not know about.
    pub fn is_accepted_code(value: f64) -> bool {
        value.abs() < f64::EPSILON
    }
}

impl From<RejectReason> for u8 {
    fn from(reason: RejectReason) -> Self {
        reason.code()
    }
}

impl TryFrom<u8> for RejectReason {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Accepted),
            1 => Ok(Self::NoData),
            2 => Ok(Self::Curvature),
            3 => Ok(Self::NearSource),
            4 => Ok(Self::VelocityOutOfRange),
            5 => Ok(Self::DirectionMismatch),
            other => Err(other),
        }
    }
}
