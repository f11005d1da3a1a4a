//! Cross-event stacking: per-period coverage maps.
//!
//! For every period of a run, each event record contributes one count at
//! every interior node whose reason code is 0. The result is the number of
//! events with an accepted apparent velocity per node.

use std::collections::BTreeMap;

use eikonal_field::StudyRegion;
use eikonal_store::{Dataset, StoreError, TreeStore};
use eikonal_types::{Period, RejectReason, RunId};
use ndarray::Array2;
use tracing::{info, warn};

use crate::event::names::REASON_N;
use crate::run::{RunError, RunHandle, open_run};

/// Coverage dataset written on each period group.
pub const NMEASURE: &str = "Nmeasure";

/// Attribute counting the records that went into `Nmeasure`.
pub const EVENT_COUNT_ATTR: &str = "event_count";

/// Errors from stacking.
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    /// The run could not be opened.
    #[error(transparent)]
    Run(#[from] RunError),

    /// A reason grid does not match the interior grid.
    #[error("reason_n of {event} at {period} is {found:?}, expected {expected:?}")]
    ShapeMismatch {
        /// Event record name.
        event: String,
        /// Period.
        period: Period,
        /// Interior grid shape.
        expected: (usize, usize),
        /// Stored shape.
        found: (usize, usize),
    },

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Measurement counts of one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageMap {
    /// Accepted-measurement count per interior node.
    pub counts: Array2<u32>,
    /// Event records that contributed.
    pub events: u32,
}

impl CoverageMap {
    fn empty(shape: (usize, usize)) -> Self {
        Self {
            counts: Array2::zeros(shape),
            events: 0,
        }
    }

    /// Largest count of any node.
    pub fn max_count(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Nodes with at least one accepted measurement.
    pub fn covered_nodes(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }
}

/// Coverage map of every period of a run, in period order.
///
/// A missing period group (interrupted run) yields an all-zero map, and a
/// record without `reason_n` (interrupted write) is left out; both are
/// logged.
///
/// # Errors
///
/// Returns [`StackError::Run`] if the run does not exist, or
/// [`StackError::ShapeMismatch`] for a reason grid of the wrong shape.
pub fn stack(
    store: &TreeStore,
    region: &StudyRegion,
    run_id: RunId,
) -> Result<BTreeMap<Period, CoverageMap>, StackError> {
    let run = open_run(store, run_id)?;
    let shape = region.stencil_shape();
    let mut maps = BTreeMap::new();

    for &period in region.periods() {
        let path = run.period_path(period)?;
        let Ok(group) = store.group(&path) else {
            warn!(run_id = %run_id, period = %period, "Period group missing, coverage is empty");
            maps.insert(period, CoverageMap::empty(shape));
            continue;
        };

        let mut map = CoverageMap::empty(shape);
        for (event, record) in group.children() {
            let Some(reason) = record.dataset(REASON_N) else {
                warn!(run_id = %run_id, period = %period, event_id = event, "Record has no reason_n, skipped");
                continue;
            };
            if reason.shape() != shape {
                return Err(StackError::ShapeMismatch {
                    event: event.to_owned(),
                    period,
                    expected: shape,
                    found: reason.shape(),
                });
            }
            for (count, &code) in map.counts.iter_mut().zip(reason.values()) {
                if RejectReason::is_accepted_code(code) {
                    *count = count.saturating_add(1);
                }
            }
            map.events = map.events.saturating_add(1);
        }
        info!(
            run_id = %run_id,
            period = %period,
            events = map.events,
            max_count = map.max_count(),
            covered = map.covered_nodes(),
            "Stacked period"
        );
        maps.insert(period, map);
    }
    Ok(maps)
}

/// Write each map as dataset `Nmeasure` and attribute `event_count` on its
/// period group, replacing earlier values. Periods whose group is missing
/// are skipped with a warning.
///
/// # Errors
///
/// Returns [`StackError::Store`] if a write fails.
pub fn persist_coverage(
    store: &mut TreeStore,
    run: &RunHandle,
    maps: &BTreeMap<Period, CoverageMap>,
) -> Result<(), StackError> {
    for (&period, map) in maps {
        let path = run.period_path(period)?;
        let Ok(group) = store.group_mut(&path) else {
            warn!(run_id = %run.id(), period = %period, "Period group missing, coverage not persisted");
            continue;
        };
        group.replace_dataset(NMEASURE, Dataset::from_codes(&map.counts))?;
        group.set_attr(EVENT_COUNT_ATTR, map.events)?;
    }
    tracing::debug!(run_id = %run.id(), periods = maps.len(), "Persisted coverage");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use eikonal_field::RegionBounds;
    use eikonal_store::GroupNode;
    use eikonal_types::FieldType;

    use super::*;
    use crate::run::create_run;

    fn region(periods: Vec<Period>) -> StudyRegion {
        StudyRegion::new(
            RegionBounds {
                minlon: 0.0,
                maxlon: 1.0,
                minlat: 0.0,
                maxlat: 1.0,
                dlon: 0.2,
                dlat: 0.2,
            },
            periods,
        )
        .unwrap()
    }

    fn record(values: Vec<f64>, shape: (usize, usize)) -> GroupNode {
        let mut node = GroupNode::new();
        node.create_dataset(REASON_N, Dataset::new(shape.0, shape.1, values).unwrap())
            .unwrap();
        node
    }

    #[test]
    fn counts_accepted_nodes_per_period() {
        // 6x6 grid, 2x2 interior.
        let p10 = Period::from_secs(10);
        let p20 = Period::from_secs(20);
        let region = region(vec![p10, p20]);
        let mut store = TreeStore::in_memory();
        let run = create_run(&mut store, FieldType::Phase, RunId(0), 1).unwrap();
        let g10 = run.create_period_group(&mut store, p10).unwrap();
        let g20 = run.create_period_group(&mut store, p20).unwrap();

        store
            .insert_group(&g10.join("A.B").unwrap(), record(vec![0.0, 1.0, 0.0, 2.0], (2, 2)))
            .unwrap();
        store
            .insert_group(&g10.join("A.C").unwrap(), record(vec![0.0, 0.0, 5.0, 3.0], (2, 2)))
            .unwrap();
        store
            .insert_group(&g20.join("A.B").unwrap(), record(vec![4.0; 4], (2, 2)))
            .unwrap();

        let maps = stack(&store, &region, RunId(0)).unwrap();
        assert_eq!(maps.len(), 2);
        let m10 = maps.get(&p10).unwrap();
        assert_eq!(m10.counts.iter().copied().collect::<Vec<_>>(), vec![2, 1, 1, 0]);
        assert_eq!(m10.events, 2);
        assert_eq!(m10.max_count(), 2);
        assert_eq!(m10.covered_nodes(), 3);
        let m20 = maps.get(&p20).unwrap();
        assert_eq!(m20.max_count(), 0);
        assert_eq!(m20.events, 1);
    }

    #[test]
    fn empty_and_missing_periods_are_zero() {
        let p10 = Period::from_secs(10);
        let p20 = Period::from_secs(20);
        let region = region(vec![p10, p20]);
        let mut store = TreeStore::in_memory();
        let run = create_run(&mut store, FieldType::Phase, RunId(0), 1).unwrap();
        run.create_period_group(&mut store, p10).unwrap();

        let maps = stack(&store, &region, RunId(0)).unwrap();
        for map in maps.values() {
            assert_eq!(map.counts.dim(), (2, 2));
            assert_eq!(map.max_count(), 0);
            assert_eq!(map.events, 0);
        }
    }

    #[test]
    fn partial_records_are_skipped() {
        let p10 = Period::from_secs(10);
        let region = region(vec![p10]);
        let mut store = TreeStore::in_memory();
        let run = create_run(&mut store, FieldType::Phase, RunId(0), 1).unwrap();
        let g10 = run.create_period_group(&mut store, p10).unwrap();
        store.insert_group(&g10.join("A.B").unwrap(), GroupNode::new()).unwrap();
        store
            .insert_group(&g10.join("A.C").unwrap(), record(vec![0.0; 4], (2, 2)))
            .unwrap();

        let map = stack(&store, &region, RunId(0)).unwrap().remove(&p10).unwrap();
        assert_eq!(map.events, 1);
        assert_eq!(map.max_count(), 1);
    }

    #[test]
    fn wrong_shape_is_an_error() {
        let p10 = Period::from_secs(10);
        let region = region(vec![p10]);
        let mut store = TreeStore::in_memory();
        let run = create_run(&mut store, FieldType::Phase, RunId(0), 1).unwrap();
        let g10 = run.create_period_group(&mut store, p10).unwrap();
        store
            .insert_group(&g10.join("A.B").unwrap(), record(vec![0.0; 6], (2, 3)))
            .unwrap();
        assert!(matches!(
            stack(&store, &region, RunId(0)),
            Err(StackError::ShapeMismatch { found: (2, 3), .. })
        ));
    }

    #[test]
    fn unknown_run() {
        let store = TreeStore::in_memory();
        assert!(matches!(
            stack(&store, &region(vec![]), RunId(3)),
            Err(StackError::Run(RunError::NotFound { .. }))
        ));
    }

    #[test]
    fn persist_replaces_previous_coverage() {
        let p10 = Period::from_secs(10);
        let region = region(vec![p10]);
        let mut store = TreeStore::in_memory();
        let run = create_run(&mut store, FieldType::Phase, RunId(0), 1).unwrap();
        let g10 = run.create_period_group(&mut store, p10).unwrap();
        store
            .insert_group(&g10.join("A.B").unwrap(), record(vec![0.0; 4], (2, 2)))
            .unwrap();

        let maps = stack(&store, &region, RunId(0)).unwrap();
        persist_coverage(&mut store, &run, &maps).unwrap();
        persist_coverage(&mut store, &run, &maps).unwrap();

        let group = store.group(&g10).unwrap();
        assert_eq!(group.attr_int(EVENT_COUNT_ATTR).unwrap(), 1);
        assert_eq!(group.dataset(NMEASURE).unwrap().values(), &[1.0; 4]);
        // Coverage lives beside the records and does not count as one.
        let again = stack(&store, &region, RunId(0)).unwrap();
        assert_eq!(again, maps);
    }
}
