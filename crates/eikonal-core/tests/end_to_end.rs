//! End-to-end runs over an in-memory archive and store.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::cast_precision_loss,
    clippy::arithmetic_side_effects
)]

use eikonal_core::stacking::{EVENT_COUNT_ATTR, NMEASURE};
use eikonal_core::{
    AuxiliaryKey, MemoryArchive, PipelineError, RunSettings, create_run, list_runs, open_run,
    persist_coverage, read_region, run_eikonal, set_input_parameters, stack,
};
use eikonal_field::{
    CurvatureMask, FieldConfig, FieldError, FieldProducts, GradientMode, GridFieldBuilder,
    RegionBounds, ScalarFieldBuilder, StudyRegion, Surface,
};
use eikonal_store::{Dataset, GroupNode, TreeStore};
use eikonal_types::{
    EventId, FieldType, Period, RejectReason, RunId, ScatteredSample, SourceCoordinates,
    SourceLocation,
};
use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rust_decimal_macros::dec;

/// Builder whose gradient QC accepts every interior node.
struct AcceptAll;

impl ScalarFieldBuilder for AcceptAll {
    fn interpolate(
        &self,
        config: &FieldConfig<'_>,
        samples: &[ScatteredSample],
        _source: SourceLocation,
    ) -> Result<Surface, FieldError> {
        let mean = samples.iter().map(|s| s.value).sum::<f64>() / samples.len() as f64;
        let shape = config.region.grid_shape();
        Ok(Surface {
            values: Array2::from_elem(shape, mean),
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
            app_velocity: Array2::from_elem(interior, 3.2),
            reason: Array2::from_elem(interior, RejectReason::Accepted.code()),
            propagation_angle: Array2::zeros(interior),
            azimuth: Array2::zeros(interior),
            back_azimuth: Array2::zeros(interior),
            travel_time: surface.values.clone(),
            lon,
            lat,
        })
    }
}

fn study_region(periods: Vec<Period>) -> StudyRegion {
    StudyRegion::new(
        RegionBounds {
            minlon: 230.0,
            maxlon: 235.0,
            minlat: 35.0,
            maxlat: 40.0,
            dlon: 0.2,
            dlat: 0.2,
        },
        periods,
    )
    .expect("valid region")
}

fn event(id: &str) -> EventId {
    id.parse().expect("valid event id")
}

/// Station rows on a ring around the grid centre for a source at
/// (`src_lon`, `src_lat`), with travel times for a 3.5 km/s wave.
fn station_table(src_lon: f64, src_lat: f64) -> Array2<f64> {
    let mut rows = Vec::new();
    for i in 0..12 {
        let lon = 230.5 + 0.35 * f64::from(i);
        for lat in [35.5, 37.5, 39.5] {
            let dist = eikonal_field::geodesy::distance_km(src_lon, src_lat, lon, lat);
            let t = dist / 3.5;
            rows.extend_from_slice(&[lon, lat, t, t * 1.1, 1.0, dist]);
        }
    }
    let n = rows.len() / 6;
    Array2::from_shape_vec((n, 6), rows).expect("table shape")
}

fn add_event(archive: &mut MemoryArchive, id: &str, lon: f64, lat: f64, periods: &[Period]) {
    let ev = event(id);
    archive.insert_event(
        ev.clone(),
        SourceCoordinates {
            latitude: lat,
            elevation: 0.0,
            longitude: lon,
        },
    );
    for &period in periods {
        let key = AuxiliaryKey::new("FieldDISPpmf2interp", &ev, "ZZ", period);
        archive
            .insert_table(&key, station_table(lon.rem_euclid(360.0), lat))
            .expect("six-column table");
    }
}

#[test]
fn two_events_give_full_double_coverage() {
    let period = Period::from_secs(10);
    let region = study_region(vec![period]);
    assert_eq!((region.nlon(), region.nlat()), (26, 26));

    let mut store = TreeStore::in_memory();
    set_input_parameters(&mut store, &region).unwrap();

    let mut archive = MemoryArchive::new();
    add_event(&mut archive, "TA.A04A", -125.0, 37.0, &[period]);
    add_event(&mut archive, "TA.B05B", -110.0, 38.0, &[period]);

    let summary = run_eikonal(&mut store, &archive, &AcceptAll, &RunSettings::default()).unwrap();
    assert_eq!(summary.run_id, RunId(0));
    let counts = summary.periods.get(&period).unwrap();
    assert_eq!((counts.stored, counts.skipped), (2, 0));

    let maps = stack(&store, &region, summary.run_id).unwrap();
    assert_eq!(maps.len(), 1);
    let coverage = maps.get(&period).unwrap();
    assert_eq!(coverage.counts.dim(), (22, 22));
    assert!(coverage.counts.iter().all(|&c| c == 2));
    assert_eq!(coverage.events, 2);

    // Source longitudes are normalised on the record.
    let run = open_run(&store, summary.run_id).unwrap();
    let record = store
        .group(&run.event_path(period, &event("TA.A04A")).unwrap())
        .unwrap();
    assert_eq!(record.attr_f64("evlo").unwrap(), 235.0);
    assert_eq!(record.attr_f64("evla").unwrap(), 37.0);
    assert_eq!(record.dataset("lonArr").unwrap().shape(), (26, 26));
}

#[test]
fn missing_archive_entries_are_skipped() {
    let p10 = Period::from_secs(10);
    let p24 = Period::new(dec!(24.5)).unwrap();
    let region = study_region(vec![p10, p24]);
    let mut store = TreeStore::in_memory();
    set_input_parameters(&mut store, &region).unwrap();

    let mut archive = MemoryArchive::new();
    add_event(&mut archive, "TA.A04A", 240.0, 37.0, &[p10, p24]);
    add_event(&mut archive, "TA.B05B", 250.0, 38.0, &[p24]);
    // Listed, but without any travel-time table.
    archive.insert_event(
        event("XX.NONE"),
        SourceCoordinates {
            latitude: 36.0,
            elevation: 0.0,
            longitude: 228.0,
        },
    );

    let summary = run_eikonal(&mut store, &archive, &AcceptAll, &RunSettings::default()).unwrap();
    let s10 = summary.periods.get(&p10).unwrap();
    let s24 = summary.periods.get(&p24).unwrap();
    assert_eq!((s10.stored, s10.skipped), (1, 2));
    assert_eq!((s24.stored, s24.skipped), (2, 1));
    assert_eq!(summary.total_stored(), 3);

    let run = open_run(&store, summary.run_id).unwrap();
    let g10 = store.group(&run.period_path(p10).unwrap()).unwrap();
    assert_eq!(g10.child_names().collect::<Vec<_>>(), vec!["TA.A04A"]);
    assert!(store.contains(&run.period_path(p24).unwrap()));
    assert_eq!(run.period_path(p24).unwrap().name(), Some("24.5_sec"));

    let maps = stack(&store, &region, summary.run_id).unwrap();
    assert_eq!(maps.get(&p10).unwrap().max_count(), 1);
    assert_eq!(maps.get(&p24).unwrap().max_count(), 2);
}

#[test]
fn runs_take_the_next_free_id() {
    let region = study_region(vec![Period::from_secs(10)]);
    let mut store = TreeStore::in_memory();
    set_input_parameters(&mut store, &region).unwrap();
    let archive = MemoryArchive::new();

    for expected in 0..3 {
        let summary =
            run_eikonal(&mut store, &archive, &AcceptAll, &RunSettings::default()).unwrap();
        assert_eq!(summary.run_id, RunId(expected));
    }
    assert_eq!(list_runs(&store).len(), 3);

    let settings = RunSettings {
        max_run_attempts: 3,
        ..RunSettings::default()
    };
    assert!(matches!(
        run_eikonal(&mut store, &archive, &AcceptAll, &settings),
        Err(PipelineError::Run(_))
    ));
}

#[test]
fn uninitialised_store_is_rejected() {
    let mut store = TreeStore::in_memory();
    let archive = MemoryArchive::new();
    assert!(matches!(
        run_eikonal(&mut store, &archive, &AcceptAll, &RunSettings::default()),
        Err(PipelineError::Dataset(_))
    ));
    assert!(list_runs(&store).is_empty());
}

#[test]
fn random_reason_grids_are_counted_exactly() {
    let period = Period::from_secs(16);
    let region = study_region(vec![period]);
    let shape = region.stencil_shape();
    let mut store = TreeStore::in_memory();
    set_input_parameters(&mut store, &region).unwrap();
    let run = create_run(&mut store, FieldType::Phase, RunId(0), 1).unwrap();
    let group = run.create_period_group(&mut store, period).unwrap();

    let mut rng = SmallRng::seed_from_u64(42);
    let mut expected = Array2::<u32>::zeros(shape);
    for n in 0..25 {
        let reasons = Array2::from_shape_fn(shape, |_| {
            if rng.random_bool(0.6) {
                0_u8
            } else {
                rng.random_range(1..=5)
            }
        });
        for (e, &r) in expected.iter_mut().zip(reasons.iter()) {
            if r == 0 {
                *e += 1;
            }
        }
        let mut record = GroupNode::new();
        record
            .create_dataset("reason_n", Dataset::from_codes(&reasons))
            .unwrap();
        store
            .insert_group(&group.join(format!("XX.S{n:02}")).unwrap(), record)
            .unwrap();
    }

    let maps = stack(&store, &region, RunId(0)).unwrap();
    let coverage = maps.get(&period).unwrap();
    assert_eq!(coverage.counts, expected);
    assert_eq!(coverage.events, 25);
}

/// One station on every node of `region`, with travel times of a 3.5 km/s
/// wave from (`src_lon`, `src_lat`).
fn dense_station_table(region: &StudyRegion, src_lon: f64, src_lat: f64) -> Array2<f64> {
    let (lon, lat) = region.mesh();
    let mut rows = Vec::new();
    for (&x, &y) in lon.iter().zip(lat.iter()) {
        let dist = eikonal_field::geodesy::distance_km(src_lon, src_lat, x, y);
        let t = dist / 3.5;
        rows.extend_from_slice(&[x, y, t, t * 1.1, 1.0, dist]);
    }
    Array2::from_shape_vec((lon.len(), 6), rows).expect("table shape")
}

#[test]
fn reference_builder_recovers_a_clean_wave() {
    let period = Period::from_secs(20);
    let region = study_region(vec![period]);
    let mut store = TreeStore::in_memory();
    set_input_parameters(&mut store, &region).unwrap();

    // Source 10 degrees west of the grid.
    let ev = event("TA.A04A");
    let mut archive = MemoryArchive::new();
    archive.insert_event(
        ev.clone(),
        SourceCoordinates {
            latitude: 37.5,
            elevation: 0.0,
            longitude: -140.0,
        },
    );
    let key = AuxiliaryKey::new("FieldDISPpmf2interp", &ev, "ZZ", period);
    archive
        .insert_table(&key, dense_station_table(&region, 220.0, 37.5))
        .unwrap();

    let summary =
        run_eikonal(&mut store, &archive, &GridFieldBuilder::new(), &RunSettings::default())
            .unwrap();
    assert_eq!(summary.total_stored(), 1);

    let run = open_run(&store, summary.run_id).unwrap();
    let record = store.group(&run.event_path(period, &ev).unwrap()).unwrap();
    for name in ["appV", "reason_n", "proAngle", "az", "baz"] {
        assert_eq!(record.dataset(name).unwrap().shape(), (22, 22), "{name}");
    }
    for name in ["travelT", "lonArr", "latArr"] {
        assert_eq!(record.dataset(name).unwrap().shape(), (26, 26), "{name}");
    }

    let reasons = record.dataset("reason_n").unwrap();
    let velocities = record.dataset("appV").unwrap();
    let accepted = reasons
        .values()
        .iter()
        .filter(|&&c| RejectReason::is_accepted_code(c))
        .count();
    assert!(accepted * 10 >= 484 * 9, "only {accepted} of 484 nodes accepted");
    for (&v, &c) in velocities.values().iter().zip(reasons.values()) {
        if RejectReason::is_accepted_code(c) {
            assert!((v - 3.5).abs() / 3.5 < 0.02, "apparent velocity {v}");
        } else {
            assert_eq!(v, 0.0);
        }
    }

    // The stored surface holds travel times, not velocities.
    let travel = record.dataset("travelT").unwrap().to_array().unwrap();
    let corner = eikonal_field::geodesy::distance_km(220.0, 37.5, 230.0, 35.0) / 3.5;
    assert!((travel[[0, 0]] - corner).abs() < 1e-6);

    let maps = stack(&store, &region, summary.run_id).unwrap();
    assert_eq!(maps.get(&period).unwrap().covered_nodes(), accepted);
}

#[test]
fn file_backed_run_survives_reopen() {
    let dir = tempfile::tempdir().expect("temp dir");
    let file = dir.path().join("eikonal.json");
    let period = Period::from_secs(10);
    let region = study_region(vec![period]);

    {
        let mut store = TreeStore::open(&file).unwrap();
        set_input_parameters(&mut store, &region).unwrap();
        let mut archive = MemoryArchive::new();
        add_event(&mut archive, "TA.A04A", -125.0, 37.0, &[period]);
        run_eikonal(&mut store, &archive, &AcceptAll, &RunSettings::default()).unwrap();
    }

    let mut store = TreeStore::open(&file).unwrap();
    let region = read_region(&store).unwrap();
    let maps = stack(&store, &region, RunId(0)).unwrap();
    let run = open_run(&store, RunId(0)).unwrap();
    persist_coverage(&mut store, &run, &maps).unwrap();
    store.flush().unwrap();

    let store = TreeStore::open(&file).unwrap();
    let group = store.group(&run.period_path(period).unwrap()).unwrap();
    assert_eq!(group.attr_int(EVENT_COUNT_ATTR).unwrap(), 1);
    let nmeasure = group.dataset(NMEASURE).unwrap();
    assert_eq!(nmeasure.shape(), (22, 22));
    assert!(nmeasure.values().iter().all(|&c| c == 1.0));
}
