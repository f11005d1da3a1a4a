//! Subcommand implementations.

use eikonal_core::{
    EikonalConfig, MemoryArchive, list_runs, open_run, persist_coverage, read_region,
    run_eikonal, set_input_parameters, stack,
};
use eikonal_field::GridFieldBuilder;
use eikonal_store::TreeStore;
use eikonal_types::RunId;
use tracing::{info, warn};

use crate::error::EngineError;

/// Write the configured study region to the store.
pub fn init(config: &EikonalConfig) -> Result<(), EngineError> {
    let region = config.study_region()?;
    let mut store = TreeStore::open(&config.paths.store)?;
    set_input_parameters(&mut store, &region)?;
    store.flush()?;
    info!(
        store = %config.paths.store.display(),
        nlon = region.nlon(),
        nlat = region.nlat(),
        periods = region.periods().len(),
        "Store initialised"
    );
    Ok(())
}

/// Build every event record of a new run with the reference builder.
pub fn run(config: &EikonalConfig) -> Result<(), EngineError> {
    let archive = MemoryArchive::from_file(&config.paths.archive)?;
    let mut store = TreeStore::open(&config.paths.store)?;
    let settings = config.run_settings();
    let summary = run_eikonal(&mut store, &archive, &GridFieldBuilder::new(), &settings)?;

    for (period, counts) in &summary.periods {
        info!(
            run_id = %summary.run_id,
            period = %period,
            stored = counts.stored,
            skipped = counts.skipped,
            "Period summary"
        );
    }
    info!(
        run_id = %summary.run_id,
        stored = summary.total_stored(),
        "Run complete"
    );
    Ok(())
}

/// Stack a run's records into per-period coverage maps.
pub fn stack_run(config: &EikonalConfig, run_id: u32, persist: bool) -> Result<(), EngineError> {
    let run_id = RunId(run_id);
    let mut store = TreeStore::open(&config.paths.store)?;
    let region = read_region(&store)?;
    let maps = stack(&store, &region, run_id)?;

    for (period, map) in &maps {
        if map.events == 0 {
            warn!(run_id = %run_id, period = %period, "No events contributed");
        }
        info!(
            run_id = %run_id,
            period = %period,
            events = map.events,
            max_count = map.max_count(),
            covered_nodes = map.covered_nodes(),
            "Coverage"
        );
    }

    if persist {
        let run = open_run(&store, run_id)?;
        persist_coverage(&mut store, &run, &maps)?;
        store.flush()?;
        info!(run_id = %run_id, periods = maps.len(), "Coverage persisted");
    }
    Ok(())
}

/// List the runs in the store.
pub fn runs(config: &EikonalConfig) -> Result<(), EngineError> {
    let store = TreeStore::open(&config.paths.store)?;
    let ids = list_runs(&store);
    if ids.is_empty() {
        info!(store = %config.paths.store.display(), "No runs");
    }
    for id in ids {
        let run = open_run(&store, id)?;
        info!(run_id = %id, field_type = %run.field_type(), "Run");
    }
    Ok(())
}
