//! Run orchestration, per-event field processing and stacking for Eikonal
//! tomography.
//!
//! A tomography dataset is a [`TreeStore`](eikonal_store::TreeStore) whose
//! root carries the study region. Each run lives under `Eikonal_run_<id>`
//! and holds one group per period, which in turn holds one record per
//! event with usable travel times.
//!
//! ```text
//! set_input_parameters -> run_eikonal -----------------> stack
//!                           |-- create_run                 |-- per period
//!                           +-- per period x event         +-- persist_coverage
//!                               +-- process_event
//!                                   |-- archive lookup
//!                                   +-- ScalarFieldBuilder
//! ```
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `eikonal-config.yaml` into
//!   strongly-typed structs.
//! - [`archive`] -- [`TravelTimeArchive`] trait and [`MemoryArchive`].
//! - [`dataset`] -- Study region attributes on the store root.
//! - [`run`] -- Run id allocation and run handles.
//! - [`event`] -- Per-event field construction and record storage.
//! - [`pipeline`] -- The period x event loop over a whole run.
//! - [`stacking`] -- Per-period coverage maps across events.
//!
//! [`TravelTimeArchive`]: archive::TravelTimeArchive
//! [`MemoryArchive`]: archive::MemoryArchive

pub mod archive;
pub mod config;
pub mod dataset;
pub mod event;
pub mod pipeline;
pub mod run;
pub mod stacking;

// Re-export primary types at crate root.
pub use archive::{ArchiveError, AuxiliaryKey, MemoryArchive, TravelTimeArchive};
pub use config::{ConfigError, ConfigSource, EikonalConfig};
pub use dataset::{DatasetError, read_region, set_input_parameters};
pub use event::{EventContext, EventSummary, ProcessError, ProcessOutcome, SkipReason, process_event};
pub use pipeline::{PeriodSummary, PipelineError, RunSettings, RunSummary, run_eikonal};
pub use run::{RunError, RunHandle, create_run, list_runs, open_run, remove_event_record};
pub use stacking::{CoverageMap, StackError, persist_coverage, stack};
