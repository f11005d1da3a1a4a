//! Per-event field processing.
//!
//! For one event and period: look up the station table, turn it into
//! scattered samples seeded with the source, hand them to a
//! [`ScalarFieldBuilder`] and store the resulting per-node arrays as an
//! event record under the period group.
//!
//! The scalar fed to the builder is `distance / travel_time` per station,
//! preceded by a zero-valued sample at the source itself. Stations whose
//! travel time is non-finite or not above [`MIN_TRAVEL_TIME`] are dropped
//! before the division.

use eikonal_field::{FieldConfig, FieldError, FieldProducts, ScalarFieldBuilder, StudyRegion};
use eikonal_store::{Dataset, GroupNode, StoreError, TreeStore};
use eikonal_types::{EventId, FieldType, Period, ScatteredSample, SourceLocation};
use ndarray::Array2;

use crate::archive::{ArchiveError, AuxiliaryKey, DISTANCE_COLUMN, TravelTimeArchive};
use crate::pipeline::RunSettings;
use crate::run::RunHandle;

/// Travel times (s) at or below this are treated as unusable.
pub const MIN_TRAVEL_TIME: f64 = 1e-6;

/// Event record dataset and attribute names.
pub mod names {
    /// Apparent velocity, interior grid.
    pub const APP_V: &str = "appV";
    /// Reason codes, interior grid.
    pub const REASON_N: &str = "reason_n";
    /// Propagation angle, interior grid.
    pub const PRO_ANGLE: &str = "proAngle";
    /// Source-to-node azimuth, interior grid.
    pub const AZ: &str = "az";
    /// Node-to-source back-azimuth, interior grid.
    pub const BAZ: &str = "baz";
    /// Fitted surface, full grid.
    pub const TRAVEL_T: &str = "travelT";
    /// Node longitudes, full grid.
    pub const LON_ARR: &str = "lonArr";
    /// Node latitudes, full grid.
    pub const LAT_ARR: &str = "latArr";
    /// Source longitude attribute, in `[0, 360)`.
    pub const EVLO: &str = "evlo";
    /// Source latitude attribute.
    pub const EVLA: &str = "evla";
}

/// Errors that abort processing of an event (and so the run).
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The archive failed for a reason other than a missing table.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// The field builder failed.
    #[error(transparent)]
    Field(#[from] FieldError),

    /// Storing the record failed (including a duplicate record).
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why an event produced no record for a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The archive has no table for this event and period.
    NoTravelTimeField,
    /// Every station sample was dropped by the travel-time guard.
    NoUsableSamples,
}

/// What was stored for an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSummary {
    /// Event id.
    pub event: EventId,
    /// Station samples passed to the builder (source sample excluded).
    pub samples: usize,
    /// Station rows dropped by the travel-time guard.
    pub excluded: usize,
    /// Interior nodes with reason code 0.
    pub accepted: usize,
}

/// Result of [`process_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A record was written.
    Stored(EventSummary),
    /// The event was skipped; nothing was written.
    Skipped(SkipReason),
}

/// Everything shared by all events of one run.
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    /// Study region read from the store.
    pub region: &'a StudyRegion,
    /// Run being populated.
    pub run: &'a RunHandle,
    /// Archive selectors and quality thresholds.
    pub settings: &'a RunSettings,
}

/// Build and store the record of one event at one period.
///
/// The period group must already exist. Missing archive tables and events
/// without usable samples are skipped with a warning.
///
/// # Errors
///
/// Returns [`ProcessError`] for any other archive, builder or store
/// failure, including [`StoreError::NameCollision`] when the record exists.
pub fn process_event<A, B>(
    store: &mut TreeStore,
    archive: &A,
    builder: &B,
    ctx: &EventContext<'_>,
    period: Period,
    event: &EventId,
) -> Result<ProcessOutcome, ProcessError>
where
    A: TravelTimeArchive + ?Sized,
    B: ScalarFieldBuilder + ?Sized,
{
    let settings = ctx.settings;
    let key = AuxiliaryKey::new(&settings.data_type, event, &settings.channel, period);
    let table = match archive.travel_time_table(&key) {
        Ok(table) => table,
        Err(ArchiveError::NotFound { .. }) => {
            tracing::warn!(event_id = %event, period = %period, key = %key, "No travel time field");
            return Ok(ProcessOutcome::Skipped(SkipReason::NoTravelTimeField));
        }
        Err(e) => return Err(e.into()),
    };

    let source = SourceLocation::from(archive.source_coordinates(event)?);
    let field_type = ctx.run.field_type();
    let (samples, excluded) = scattered_samples(&table, field_type, source);
    let stations = samples.len().saturating_sub(1);
    if excluded > 0 {
        tracing::debug!(event_id = %event, period = %period, excluded, "Dropped stations with unusable travel times");
    }
    if stations == 0 {
        tracing::warn!(event_id = %event, period = %period, excluded, "No usable station samples");
        return Ok(ProcessOutcome::Skipped(SkipReason::NoUsableSamples));
    }

    let config = FieldConfig {
        region: ctx.region,
        period,
        field_type,
        quality: &settings.quality,
    };
    let surface = builder.interpolate(&config, &samples, source)?;
    let curvature = builder.check_curvature(&config, &surface)?;
    let products = builder.gradient_qc(
        &config,
        &surface,
        &curvature,
        &samples,
        source,
        settings.quality.gradient_mode(),
    )?;
    products.validate_shapes(ctx.region)?;

    let record = event_record(source, &products)?;
    store.insert_group(&ctx.run.event_path(period, event)?, record)?;

    let accepted = products.accepted_count();
    tracing::debug!(event_id = %event, period = %period, stations, accepted, "Stored event record");
    Ok(ProcessOutcome::Stored(EventSummary {
        event: event.clone(),
        samples: stations,
        excluded,
        accepted,
    }))
}

/// Scattered samples for one table: the source at value 0 first, then one
/// `distance / time` sample per usable station row. Also returns the
/// number of rows dropped.
///
/// Station longitudes are passed through as stored in the archive.
pub fn scattered_samples(
    table: &Array2<f64>,
    field_type: FieldType,
    source: SourceLocation,
) -> (Vec<ScatteredSample>, usize) {
    let column = field_type.column();
    let mut samples = Vec::with_capacity(table.nrows().saturating_add(1));
    samples.push(ScatteredSample::new(source.lon, source.lat, 0.0));
    let mut excluded = 0_usize;
    for row in table.rows() {
        let (Some(&lon), Some(&lat), Some(&time), Some(&dist)) = (
            row.get(0),
            row.get(1),
            row.get(column),
            row.get(DISTANCE_COLUMN),
        ) else {
            excluded = excluded.saturating_add(1);
            continue;
        };
        if !time.is_finite() || time <= MIN_TRAVEL_TIME || !dist.is_finite() {
            excluded = excluded.saturating_add(1);
            continue;
        }
        samples.push(ScatteredSample::new(lon, lat, dist / time));
    }
    (samples, excluded)
}

/// Assemble a complete record off-store.
fn event_record(source: SourceLocation, products: &FieldProducts) -> Result<GroupNode, StoreError> {
    let mut record = GroupNode::new();
    record.set_attr(names::EVLO, source.lon)?;
    record.set_attr(names::EVLA, source.lat)?;
    record.create_dataset(names::APP_V, Dataset::from_array(&products.app_velocity))?;
    record.create_dataset(names::REASON_N, Dataset::from_codes(&products.reason))?;
    record.create_dataset(names::PRO_ANGLE, Dataset::from_array(&products.propagation_angle))?;
    record.create_dataset(names::AZ, Dataset::from_array(&products.azimuth))?;
    record.create_dataset(names::BAZ, Dataset::from_array(&products.back_azimuth))?;
    record.create_dataset(names::TRAVEL_T, Dataset::from_array(&products.travel_time))?;
    record.create_dataset(names::LON_ARR, Dataset::from_array(&products.lon))?;
    record.create_dataset(names::LAT_ARR, Dataset::from_array(&products.lat))?;
    Ok(record)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::float_cmp,
    clippy::indexing_slicing
)]
mod tests {
    use eikonal_field::{CurvatureMask, GradientMode, RegionBounds, Surface};
    use eikonal_types::{RunId, SourceCoordinates};
    use ndarray::array;

    use super::*;
    use crate::archive::MemoryArchive;
    use crate::run::create_run;

    /// Builder that accepts every node and records nothing else.
    struct AcceptAll;

    impl ScalarFieldBuilder for AcceptAll {
        fn interpolate(
            &self,
            config: &FieldConfig<'_>,
            _samples: &[ScatteredSample],
            _source: SourceLocation,
        ) -> Result<Surface, FieldError> {
            let shape = config.region.grid_shape();
            Ok(Surface {
                values: Array2::zeros(shape),
                constrained: Array2::from_elem(shape, true),
                iterations: 0,
            })
        }

        fn check_curvature(
            &self,
            config: &FieldConfig<'_>,
            _surface: &Surface,
        ) -> Result<CurvatureMask, FieldError> {
            let shape = config.region.grid_shape();
            Ok(CurvatureMask {
                laplacian: Array2::zeros(shape),
                flagged: Array2::from_elem(shape, false),
            })
        }

        fn gradient_qc(
            &self,
            config: &FieldConfig<'_>,
            surface: &Surface,
            _curvature: &CurvatureMask,
            _samples: &[ScatteredSample],
            _source: SourceLocation,
            _mode: GradientMode,
        ) -> Result<FieldProducts, FieldError> {
            let interior = config.region.stencil_shape();
            let (lon, lat) = config.region.mesh();
            Ok(FieldProducts {
                app_velocity: Array2::from_elem(interior, 3.0),
                reason: Array2::zeros(interior),
                propagation_angle: Array2::zeros(interior),
                azimuth: Array2::zeros(interior),
                back_azimuth: Array2::zeros(interior),
                travel_time: surface.values.clone(),
                lon,
                lat,
            })
        }
    }

    fn region() -> StudyRegion {
        StudyRegion::new(
            RegionBounds {
                minlon: 230.0,
                maxlon: 232.0,
                minlat: 35.0,
                maxlat: 37.0,
                dlon: 0.2,
                dlat: 0.2,
            },
            vec![Period::from_secs(10)],
        )
        .unwrap()
    }

    fn event() -> EventId {
        "TA.A04A".parse().unwrap()
    }

    fn archive(rows: Array2<f64>) -> MemoryArchive {
        let mut archive = MemoryArchive::new();
        archive.insert_event(
            event(),
            SourceCoordinates {
                latitude: 36.0,
                elevation: 0.0,
                longitude: -129.0,
            },
        );
        let key = AuxiliaryKey::new("FieldDISPpmf2interp", &event(), "ZZ", Period::from_secs(10));
        archive.insert_table(&key, rows).unwrap();
        archive
    }

    #[test]
    fn samples_seeded_with_source() {
        let table = array![
            [231.0, 36.0, 20.0, 25.0, 1.0, 70.0],
            [231.5, 36.5, 0.0, 25.0, 1.0, 90.0],
            [232.0, 36.0, 1e-9, 25.0, 1.0, 90.0],
            [232.0, 37.0, f64::NAN, 25.0, 1.0, 90.0],
            [230.5, 35.5, -20.0, 25.0, 1.0, 70.0],
        ];
        let source = SourceLocation { lon: 231.0, lat: 35.0 };
        let (samples, excluded) = scattered_samples(&table, FieldType::Phase, source);
        assert_eq!(excluded, 4);
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.value >= 0.0));
        assert_eq!(samples[0], ScatteredSample::new(231.0, 35.0, 0.0));
        assert_eq!(samples[1].value, 3.5);

        // The group column is used for group travel times.
        let (samples, excluded) = scattered_samples(&table, FieldType::Group, source);
        assert_eq!(excluded, 0);
        assert_eq!(samples.len(), 6);
        assert_eq!(samples[1].value, 70.0 / 25.0);
    }

    #[test]
    fn stores_complete_record() {
        let region = region();
        let mut store = TreeStore::in_memory();
        let run = create_run(&mut store, FieldType::Phase, RunId(0), 1).unwrap();
        let period = Period::from_secs(10);
        run.create_period_group(&mut store, period).unwrap();
        let settings = RunSettings::default();
        let ctx = EventContext {
            region: &region,
            run: &run,
            settings: &settings,
        };
        let archive = archive(array![[231.0, 36.0, 20.0, 25.0, 1.0, 70.0]]);

        let outcome = process_event(&mut store, &archive, &AcceptAll, &ctx, period, &event()).unwrap();
        let summary = match outcome {
            ProcessOutcome::Stored(summary) => summary,
            other => panic!("Expected Stored, got {other:?}"),
        };
        assert_eq!(summary.samples, 1);
        assert_eq!(summary.accepted, 49);

        let record = store.group(&run.event_path(period, &event()).unwrap()).unwrap();
        assert_eq!(record.attr_f64(names::EVLO).unwrap(), 231.0);
        assert_eq!(record.attr_f64(names::EVLA).unwrap(), 36.0);
        assert_eq!(record.dataset(names::REASON_N).unwrap().shape(), (7, 7));
        assert_eq!(record.dataset(names::TRAVEL_T).unwrap().shape(), (11, 11));
        assert_eq!(record.dataset_names().count(), 8);

        // A second attempt collides instead of overwriting.
        assert!(matches!(
            process_event(&mut store, &archive, &AcceptAll, &ctx, period, &event()),
            Err(ProcessError::Store(StoreError::NameCollision { .. }))
        ));
    }

    #[test]
    fn missing_table_leaves_period_untouched() {
        let region = region();
        let mut store = TreeStore::in_memory();
        let run = create_run(&mut store, FieldType::Phase, RunId(0), 1).unwrap();
        let period = Period::from_secs(12);
        let path = run.create_period_group(&mut store, period).unwrap();
        let before = store.group(&path).unwrap().clone();

        let settings = RunSettings::default();
        let ctx = EventContext {
            region: &region,
            run: &run,
            settings: &settings,
        };
        let archive = archive(array![[231.0, 36.0, 20.0, 25.0, 1.0, 70.0]]);
        let outcome = process_event(&mut store, &archive, &AcceptAll, &ctx, period, &event()).unwrap();
        assert_eq!(outcome, ProcessOutcome::Skipped(SkipReason::NoTravelTimeField));
        assert_eq!(store.group(&path).unwrap(), &before);
    }

    #[test]
    fn zero_travel_times_skip_the_event() {
        let region = region();
        let mut store = TreeStore::in_memory();
        let run = create_run(&mut store, FieldType::Phase, RunId(0), 1).unwrap();
        let period = Period::from_secs(10);
        run.create_period_group(&mut store, period).unwrap();
        let settings = RunSettings::default();
        let ctx = EventContext {
            region: &region,
            run: &run,
            settings: &settings,
        };
        let archive = archive(array![[231.0, 36.0, 0.0, 0.0, 1.0, 70.0]]);
        let outcome = process_event(&mut store, &archive, &AcceptAll, &ctx, period, &event()).unwrap();
        assert_eq!(outcome, ProcessOutcome::Skipped(SkipReason::NoUsableSamples));
        assert!(!store.contains(&run.event_path(period, &event()).unwrap()));
    }

    #[test]
    fn unknown_event_aborts() {
        let region = region();
        let mut store = TreeStore::in_memory();
        let run = create_run(&mut store, FieldType::Phase, RunId(0), 1).unwrap();
        let period = Period::from_secs(10);
        run.create_period_group(&mut store, period).unwrap();
        let settings = RunSettings::default();
        let ctx = EventContext {
            region: &region,
            run: &run,
            settings: &settings,
        };
        let mut archive = MemoryArchive::new();
        let key = AuxiliaryKey::new("FieldDISPpmf2interp", &event(), "ZZ", period);
        archive
            .insert_table(&key, array![[231.0, 36.0, 20.0, 25.0, 1.0, 70.0]])
            .unwrap();
        assert!(matches!(
            process_event(&mut store, &archive, &AcceptAll, &ctx, period, &event()),
            Err(ProcessError::Archive(ArchiveError::UnknownEvent { .. }))
        ));
    }
}
