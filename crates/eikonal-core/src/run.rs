//! Run namespaces: id allocation, handles and stale-record removal.
//!
//! A run is the group `Eikonal_run_<id>` on the store root, tagged with the
//! travel-time field type it was built from and its creation time.

use chrono::Utc;
use eikonal_store::{GroupNode, GroupPath, StoreError, TreeStore};
use eikonal_types::{EventId, FieldType, Period, RunId};

/// Run attribute holding the field type tag (`Tph`/`Tgr`).
pub const FIELDTYPE_ATTR: &str = "fieldtype";

/// Run attribute holding the RFC 3339 creation time.
pub const CREATED_AT_ATTR: &str = "created_at";

/// Errors from run management.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Every candidate id in the scan window is taken.
    #[error("no free run id in {attempts} attempt(s) starting at {start}")]
    ResourceExhausted {
        /// First id tried.
        start: RunId,
        /// Number of ids tried.
        attempts: u32,
    },

    /// No run with this id exists.
    #[error("run {id} not found")]
    NotFound {
        /// Requested id.
        id: RunId,
    },

    /// The run's `fieldtype` attribute is not a known tag.
    #[error("run {id} has unknown field type {tag:?}")]
    UnknownFieldType {
        /// Run id.
        id: RunId,
        /// Stored tag.
        tag: String,
    },

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// An existing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    id: RunId,
    field_type: FieldType,
    path: GroupPath,
}

impl RunHandle {
    fn new(id: RunId, field_type: FieldType) -> Result<Self, StoreError> {
        Ok(Self {
            id,
            field_type,
            path: run_path(id)?,
        })
    }

    /// Run id.
    pub const fn id(&self) -> RunId {
        self.id
    }

    /// Field type the run was built from.
    pub const fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Path of the run group.
    pub const fn path(&self) -> &GroupPath {
        &self.path
    }

    /// Path of the period group `<period>_sec`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] only for unrepresentable names.
    pub fn period_path(&self, period: Period) -> Result<GroupPath, StoreError> {
        self.path.join(period.group_name())
    }

    /// Path of an event record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidName`] only for unrepresentable names.
    pub fn event_path(&self, period: Period, event: &EventId) -> Result<GroupPath, StoreError> {
        self.period_path(period)?.join(event.to_string())
    }

    /// Create the (empty) group for a period.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NameCollision`] if it already exists.
    pub fn create_period_group(
        &self,
        store: &mut TreeStore,
        period: Period,
    ) -> Result<GroupPath, RunError> {
        let path = self.period_path(period)?;
        store.create_group(&path)?;
        tracing::debug!(run_id = %self.id, period = %period, "Created period group");
        Ok(path)
    }
}

fn run_path(id: RunId) -> Result<GroupPath, StoreError> {
    GroupPath::root().join(id.group_name())
}

/// Create a run at the first free id in `start .. start + max_attempts`.
///
/// # Errors
///
/// Returns [`RunError::ResourceExhausted`] if every candidate is taken.
pub fn create_run(
    store: &mut TreeStore,
    field_type: FieldType,
    start: RunId,
    max_attempts: u32,
) -> Result<RunHandle, RunError> {
    let exhausted = RunError::ResourceExhausted {
        start,
        attempts: max_attempts,
    };
    let mut candidate = Some(start);
    for _ in 0..max_attempts {
        let Some(id) = candidate else { break };
        let path = run_path(id)?;
        if store.contains(&path) {
            tracing::debug!(run_id = %id, "Run id taken");
            candidate = id.next();
            continue;
        }
        let group = store.create_group(&path)?;
        group.set_attr(FIELDTYPE_ATTR, field_type.tag())?;
        group.set_attr(CREATED_AT_ATTR, Utc::now().to_rfc3339())?;
        tracing::info!(run_id = %id, field_type = %field_type, "Created run");
        return Ok(RunHandle::new(id, field_type)?);
    }
    Err(exhausted)
}

/// Handle to an existing run.
///
/// # Errors
///
/// Returns [`RunError::NotFound`] or [`RunError::UnknownFieldType`].
pub fn open_run(store: &TreeStore, id: RunId) -> Result<RunHandle, RunError> {
    let path = run_path(id)?;
    let group = store.group(&path).map_err(|_| RunError::NotFound { id })?;
    let tag = group.attr_text(FIELDTYPE_ATTR)?;
    let field_type = FieldType::from_tag(tag).ok_or_else(|| RunError::UnknownFieldType {
        id,
        tag: tag.to_owned(),
    })?;
    Ok(RunHandle::new(id, field_type)?)
}

/// Ids of all runs in the store, ascending.
pub fn list_runs(store: &TreeStore) -> Vec<RunId> {
    let mut ids: Vec<RunId> = store
        .root()
        .child_names()
        .filter_map(RunId::from_group_name)
        .collect();
    ids.sort_unstable();
    ids
}

/// Delete an event record so the event can be processed again.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] (wrapped) if there is no such record.
pub fn remove_event_record(
    store: &mut TreeStore,
    run: &RunHandle,
    period: Period,
    event: &EventId,
) -> Result<GroupNode, RunError> {
    let path = run.event_path(period, event)?;
    let removed = store.remove_group(&path)?;
    tracing::info!(run_id = %run.id(), period = %period, event_id = %event, "Removed event record");
    Ok(removed)
}
