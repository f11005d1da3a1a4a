//! Travel-time archive reader seam.
//!
//! The archive supplies, per virtual source event, its coordinates and a
//! per-period table of station measurements. Table columns are fixed:
//!
//! | column | content                          |
//! |--------|----------------------------------|
//! | 0      | station longitude                |
//! | 1      | station latitude                 |
//! | 2      | phase travel time (s)            |
//! | 3      | group travel time (s)            |
//! | 5      | distance to the source (km)      |

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use eikonal_types::{EventId, EventIdError, Period, SourceCoordinates};
use ndarray::Array2;
use serde::Deserialize;

/// Minimum number of columns of a measurement table.
pub const MIN_TABLE_COLUMNS: usize = 6;

/// Column holding the distance from station to source.
pub const DISTANCE_COLUMN: usize = 5;

/// Errors raised by archive readers.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// No auxiliary table exists for this key.
    #[error("no auxiliary data at {key}")]
    NotFound {
        /// Rendered archive key.
        key: String,
    },

    /// The event is not listed in the archive.
    #[error("unknown event {event}")]
    UnknownEvent {
        /// Event id.
        event: String,
    },

    /// A table does not have the expected layout.
    #[error("malformed table at {key}: {reason}")]
    MalformedTable {
        /// Rendered archive key.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An event id in the archive file is not `NET.STA`.
    #[error("invalid event id: {0}")]
    InvalidEventId(#[from] EventIdError),

    /// Reading the archive file failed.
    #[error("failed to read archive {path}: {source}")]
    Io {
        /// Archive file path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The archive file is not valid JSON.
    #[error("failed to parse archive: {0}")]
    Json(#[from] serde_json::Error),
}

/// Address of one auxiliary table:
/// `data_type/network/station/channel/period_suffix`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AuxiliaryKey {
    /// Auxiliary data type, e.g. `FieldDISPpmf2interp`.
    pub data_type: String,
    /// Network code of the event.
    pub network: String,
    /// Station code of the event.
    pub station: String,
    /// Channel pair, e.g. `ZZ`.
    pub channel: String,
    /// Period suffix, e.g. `24sec5`.
    pub period_suffix: String,
}

impl AuxiliaryKey {
    /// Key of the table for one event and period.
    pub fn new(data_type: &str, event: &EventId, channel: &str, period: Period) -> Self {
        Self {
            data_type: data_type.to_owned(),
            network: event.network().to_owned(),
            station: event.station().to_owned(),
            channel: channel.to_owned(),
            period_suffix: period.archive_suffix(),
        }
    }
}

impl fmt::Display for AuxiliaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.data_type, self.network, self.station, self.channel, self.period_suffix
        )
    }
}

/// Source of event coordinates and station travel-time tables.
pub trait TravelTimeArchive {
    /// All events in the archive, in a stable order.
    fn event_ids(&self) -> Vec<EventId>;

    /// Coordinates of an event's source.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::UnknownEvent`] if the event is not listed.
    fn source_coordinates(&self, event: &EventId) -> Result<SourceCoordinates, ArchiveError>;

    /// Station measurement table for a key.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::NotFound`] if no table exists at `key`.
    fn travel_time_table(&self, key: &AuxiliaryKey) -> Result<Array2<f64>, ArchiveError>;
}

/// Archive held entirely in memory, loadable from a JSON file of the form
///
/// ```json
/// {
///   "events": { "TA.A04A": { "latitude": 36.1, "elevation": 0.4, "longitude": -120.3 } },
///   "auxiliary": { "FieldDISPpmf2interp/TA/A04A/ZZ/10sec": [[lon, lat, tph, tgr, amp, dist]] }
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    events: BTreeMap<EventId, SourceCoordinates>,
    tables: BTreeMap<String, Array2<f64>>,
}

#[derive(Deserialize)]
struct ArchiveFile {
    #[serde(default)]
    events: BTreeMap<String, SourceCoordinates>,
    #[serde(default)]
    auxiliary: BTreeMap<String, Vec<Vec<f64>>>,
}

impl MemoryArchive {
    /// An empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an archive file.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Io`], [`ArchiveError::Json`],
    /// [`ArchiveError::InvalidEventId`] or [`ArchiveError::MalformedTable`].
    pub fn from_file(path: &Path) -> Result<Self, ArchiveError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let archive = Self::from_json(&contents)?;
        tracing::info!(
            path = %path.display(),
            events = archive.events.len(),
            tables = archive.tables.len(),
            "Loaded travel-time archive"
        );
        Ok(archive)
    }

    /// Parse an archive document.
    ///
    /// # Errors
    ///
    /// As [`MemoryArchive::from_file`], minus I/O.
    pub fn from_json(json: &str) -> Result<Self, ArchiveError> {
        let file: ArchiveFile = serde_json::from_str(json)?;
        let mut archive = Self::new();
        for (id, coords) in file.events {
            archive.insert_event(id.parse()?, coords);
        }
        for (key, rows) in file.auxiliary {
            let table = table_from_rows(&key, rows)?;
            archive.tables.insert(key, table);
        }
        Ok(archive)
    }

    /// Add or replace an event.
    pub fn insert_event(&mut self, event: EventId, coordinates: SourceCoordinates) {
        self.events.insert(event, coordinates);
    }

    /// Add or replace a table.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::MalformedTable`] if the table has fewer than
    /// [`MIN_TABLE_COLUMNS`] columns.
    pub fn insert_table(&mut self, key: &AuxiliaryKey, table: Array2<f64>) -> Result<(), ArchiveError> {
        let rendered = key.to_string();
        check_columns(&rendered, table.ncols())?;
        self.tables.insert(rendered, table);
        Ok(())
    }
}

fn check_columns(key: &str, cols: usize) -> Result<(), ArchiveError> {
    if cols < MIN_TABLE_COLUMNS {
        return Err(ArchiveError::MalformedTable {
            key: key.to_owned(),
            reason: format!("{cols} columns, need at least {MIN_TABLE_COLUMNS}"),
        });
    }
    Ok(())
}

fn table_from_rows(key: &str, rows: Vec<Vec<f64>>) -> Result<Array2<f64>, ArchiveError> {
    let nrows = rows.len();
    let ncols = rows.first().map_or(MIN_TABLE_COLUMNS, Vec::len);
    check_columns(key, ncols)?;
    if rows.iter().any(|r| r.len() != ncols) {
        return Err(ArchiveError::MalformedTable {
            key: key.to_owned(),
            reason: "rows have different lengths".to_owned(),
        });
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((nrows, ncols), flat).map_err(|e| ArchiveError::MalformedTable {
        key: key.to_owned(),
        reason: e.to_string(),
    })
}

impl TravelTimeArchive for MemoryArchive {
    fn event_ids(&self) -> Vec<EventId> {
        self.events.keys().cloned().collect()
    }

    fn source_coordinates(&self, event: &EventId) -> Result<SourceCoordinates, ArchiveError> {
        self.events
            .get(event)
            .copied()
            .ok_or_else(|| ArchiveError::UnknownEvent {
                event: event.to_string(),
            })
    }

    fn travel_time_table(&self, key: &AuxiliaryKey) -> Result<Array2<f64>, ArchiveError> {
        let rendered = key.to_string();
        self.tables
            .get(&rendered)
            .cloned()
            .ok_or(ArchiveError::NotFound { key: rendered })
    }
}
