//! The per-event pipeline over a whole run.
//!
//! [`run_eikonal`] reads the study region from the store, allocates a new
//! run and then, period by period, creates the period group and processes
//! every archive event into it. The store is flushed after each period, so
//! an interrupted run leaves complete periods on disk and at most one
//! partially populated period in memory.

use std::collections::BTreeMap;

use eikonal_field::{QualityParams, ScalarFieldBuilder};
use eikonal_store::{StoreError, TreeStore};
use eikonal_types::{EventId, FieldType, Period, RunId};
use tracing::info;

use crate::archive::TravelTimeArchive;
use crate::dataset::{DatasetError, read_region};
use crate::event::{EventContext, ProcessError, ProcessOutcome, process_event};
use crate::run::{RunError, create_run};

/// Errors that terminate a run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The study region could not be read.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// The run could not be created or extended.
    #[error(transparent)]
    Run(#[from] RunError),

    /// Processing one event failed.
    #[error("event {event} at {period}: {source}")]
    Process {
        /// Event being processed.
        event: EventId,
        /// Period being processed.
        period: Period,
        /// Underlying error.
        source: ProcessError,
    },

    /// Flushing the store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Selectors and thresholds for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Phase or group travel times.
    pub field_type: FieldType,
    /// Channel pair of the archive key.
    pub channel: String,
    /// Auxiliary data type of the archive key.
    pub data_type: String,
    /// First run id tried.
    pub start_run_id: RunId,
    /// How many consecutive ids are tried.
    pub max_run_attempts: u32,
    /// Builder thresholds and gradient mode.
    pub quality: QualityParams,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            field_type: FieldType::Phase,
            channel: "ZZ".to_owned(),
            data_type: "FieldDISPpmf2interp".to_owned(),
            start_run_id: RunId(0),
            max_run_attempts: 1000,
            quality: QualityParams::default(),
        }
    }
}

/// Event counts of one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodSummary {
    /// Records written.
    pub stored: usize,
    /// Events skipped.
    pub skipped: usize,
}

/// Outcome of [`run_eikonal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Id of the run that was created.
    pub run_id: RunId,
    /// Counts per period, in period order.
    pub periods: BTreeMap<Period, PeriodSummary>,
}

impl RunSummary {
    /// Records written over all periods.
    pub fn total_stored(&self) -> usize {
        self.periods
            .values()
            .fold(0, |acc, p| acc.saturating_add(p.stored))
    }
}

/// Create a run and fill it with one record per usable event and period.
///
/// # Errors
///
/// Returns [`PipelineError`] if the region is missing, no run id is free,
/// an event fails for a reason other than a skip, or the store cannot be
/// flushed. Work done before the failure stays in the store.
pub fn run_eikonal<A, B>(
    store: &mut TreeStore,
    archive: &A,
    builder: &B,
    settings: &RunSettings,
) -> Result<RunSummary, PipelineError>
where
    A: TravelTimeArchive + ?Sized,
    B: ScalarFieldBuilder + ?Sized,
{
    let region = read_region(store)?;
    let run = create_run(
        store,
        settings.field_type,
        settings.start_run_id,
        settings.max_run_attempts,
    )?;
    let events = archive.event_ids();
    info!(
        run_id = %run.id(),
        field_type = %settings.field_type,
        periods = region.periods().len(),
        events = events.len(),
        "Starting eikonal run"
    );

    let ctx = EventContext {
        region: &region,
        run: &run,
        settings,
    };
    let mut periods = BTreeMap::new();
    for &period in region.periods() {
        run.create_period_group(store, period)?;
        let mut summary = PeriodSummary::default();
        for event in &events {
            let outcome = process_event(store, archive, builder, &ctx, period, event).map_err(
                |source| PipelineError::Process {
                    event: event.clone(),
                    period,
                    source,
                },
            )?;
            match outcome {
                ProcessOutcome::Stored(_) => summary.stored = summary.stored.saturating_add(1),
                ProcessOutcome::Skipped(_) => summary.skipped = summary.skipped.saturating_add(1),
            }
        }
        store.flush()?;
        info!(
            run_id = %run.id(),
            period = %period,
            stored = summary.stored,
            skipped = summary.skipped,
            "Period complete"
        );
        periods.insert(period, summary);
    }

    Ok(RunSummary {
        run_id: run.id(),
        periods,
    })
}
