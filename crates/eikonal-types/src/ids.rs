//! Identifiers for tomography runs and seismic events.
//!
//! A [`RunId`] is the integer suffix of an `Eikonal_run_<id>` group. An
//! [`EventId`] names a virtual source in the waveform archive using the
//! `NET.STA` convention; the network and station codes are also the first
//! two components of the auxiliary-data lookup key.

use serde::{Deserialize, Serialize};

/// Prefix shared by every run group name.
pub const RUN_GROUP_PREFIX: &str = "Eikonal_run_";

/// Integer identifier of one tomography attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub u32);

impl RunId {
    /// Return the inner integer value.
    pub const fn into_inner(self) -> u32 {
        self.0
    }

    /// The next identifier, or `None` at `u32::MAX`.
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// Group name of the run namespace, e.g. `Eikonal_run_3`.
    pub fn group_name(self) -> String {
        format!("{RUN_GROUP_PREFIX}{}", self.0)
    }

    /// Parse a run group name back into its identifier.
    ///
    /// Returns `None` for names that do not follow the `Eikonal_run_<id>`
    /// pattern.
    pub fn from_group_name(name: &str) -> Option<Self> {
        name.strip_prefix(RUN_GROUP_PREFIX)
            .and_then(|digits| digits.parse::<u32>().ok())
            .map(Self)
    }
}

impl core::fmt::Display for RunId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RunId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Errors produced when parsing an [`EventId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventIdError {
    /// The identifier does not contain exactly one `.` separator.
    #[error("event id {0:?} is not of the form NET.STA")]
    MissingSeparator(String),

    /// The network or station component is empty.
    #[error("event id {0:?} has an empty network or station code")]
    EmptyComponent(String),
}

/// Identifier of a virtual source event, in `NET.STA` form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId {
    network: String,
    station: String,
}

impl EventId {
    /// Build an event id from its network and station codes.
    ///
    /// # Errors
    ///
    /// Returns [`EventIdError::EmptyComponent`] if either code is empty,
    /// or [`EventIdError::MissingSeparator`] if either contains a `.`.
    pub fn new(network: &str, station: &str) -> Result<Self, EventIdError> {
        if network.is_empty() || station.is_empty() {
            return Err(EventIdError::EmptyComponent(format!("{network}.{station}")));
        }
        if network.contains('.') || station.contains('.') {
            return Err(EventIdError::MissingSeparator(format!("{network}.{station}")));
        }
        Ok(Self {
            network: network.to_owned(),
            station: station.to_owned(),
        })
    }

    /// Network code (the part before the dot).
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Station code (the part after the dot).
    pub fn station(&self) -> &str {
        &self.station
    }
}

impl core::str::FromStr for EventId {
    type Err = EventIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(network), Some(station), None) => {
                if network.is_empty() || station.is_empty() {
                    Err(EventIdError::EmptyComponent(s.to_owned()))
                } else {
                    Self::new(network, station)
                }
            }
            _ => Err(EventIdError::MissingSeparator(s.to_owned())),
        }
    }
}

impl TryFrom<String> for EventId {
    type Error = EventIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.to_string()
    }
}

impl core::fmt::Display for EventId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.network, self.station)
    }
}
