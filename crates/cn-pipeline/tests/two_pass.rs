//! End-to-end two-pass runs over in-memory and JSON sources.

use approx::assert_relative_eq;
use cn_core::{EventRecord, Species};
use cn_pipeline::{
    EmitOutcome, EventCap, JsonTreeSource, MemorySource, Pipeline, PipelineSource, StatsTable,
    parse_source_name,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn tmp_dir(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    p.push(format!("cn-two-pass-{}-{}-{}", name, std::process::id(), nanos));
    fs::create_dir_all(&p).unwrap();
    p
}

fn rm_rf(path: &Path) {
    let _ = fs::remove_dir_all(path);
}

fn mem_source(name: &str, species: Species, events: Vec<EventRecord>) -> PipelineSource<MemorySource> {
    PipelineSource {
        source: MemorySource::new(name, events),
        meta: parse_source_name(name).unwrap(),
        species,
    }
}

fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    let header = rdr.headers().unwrap().iter().map(str::to_string).collect();
    let rows = rdr
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}

fn column(header: &[String], row: &[String], name: &str) -> f64 {
    let idx = header.iter().position(|h| h == name).unwrap_or_else(|| panic!("no column {name}"));
    row[idx].parse().unwrap()
}

// Two identical events in one bin: zero spread, so every normalized
// feature collapses to 0.
#[test]
fn identical_events_normalize_to_zero() {
    let dir = tmp_dir("identical");
    let events = vec![
        EventRecord::from_layers([(0, 10.0), (1, 10.0)], [(0, 0.9), (1, 0.8)]),
        EventRecord::from_layers([(0, 10.0), (1, 10.0)], [(0, 0.7), (1, 0.6)]),
    ];
    let src = mem_source("pid22_E100_eta_0_1.json", Species::Photons, events);
    let pipeline = Pipeline::new(&[Species::Photons], Vec::new()).unwrap();

    let stats = pipeline.aggregate(std::slice::from_ref(&src)).unwrap();
    let out = dir.join("out.csv");
    let outcome = pipeline.emit(&src, &stats, &out).unwrap();
    assert_eq!(outcome, EmitOutcome::Written { rows: 2 });

    let (header, rows) = read_csv(&out);
    for row in &rows {
        assert_eq!(column(&header, row, "e_0"), 10.0);
        assert_eq!(column(&header, row, "e_1"), 10.0);
        // mean(ef_0) = 0.5 with stddev 0 -> z = 0.
        assert_eq!(column(&header, row, "ef_0"), 0.0);
        assert_eq!(column(&header, row, "ef_1"), 0.0);
        assert_eq!(column(&header, row, "etrue"), 0.0);
    }
    // Raw extrapolation weights pass through untouched.
    assert_eq!(column(&header, &rows[0], "extrapWeight_0"), 0.9);
    assert_eq!(column(&header, &rows[1], "extrapWeight_1"), 0.6);
    rm_rf(&dir);
}

// An all-zero event is excluded from statistics but still produces an
// output row with zero-substituted fractions.
#[test]
fn zero_energy_event_still_emits_a_row() {
    let dir = tmp_dir("zero-energy");
    let events = vec![EventRecord::from_layers([], [(0, 0.4), (12, 0.3)])];
    let src = mem_source("pid22_E100_eta_0_1.json", Species::Photons, events);
    let pipeline = Pipeline::new(&[Species::Photons], Vec::new()).unwrap();

    let stats = pipeline.aggregate(std::slice::from_ref(&src)).unwrap();
    let out = dir.join("out.csv");
    assert_eq!(pipeline.emit(&src, &stats, &out).unwrap(), EmitOutcome::Written { rows: 1 });

    let (header, rows) = read_csv(&out);
    let row = &rows[0];
    for l in [0u32, 1, 2, 3, 12] {
        assert_eq!(column(&header, row, &format!("e_{l}")), 0.0);
        assert_eq!(column(&header, row, &format!("ef_{l}")), 0.0);
    }
    assert_eq!(column(&header, row, "extrapWeight_0"), 0.4);
    assert_eq!(column(&header, row, "extrapWeight_12"), 0.3);
    rm_rf(&dir);
}

// The configured cap truncates emission for matching sources only.
#[test]
fn capped_source_is_truncated() {
    let dir = tmp_dir("cap");
    let many: Vec<EventRecord> = (0..5000)
        .map(|i| EventRecord::from_layers([(0, 1.0 + (i % 7) as f64), (1, 2.0)], [(0, 0.5)]))
        .collect();
    let capped = mem_source("pid22_E2097152_eta_0_1.json", Species::Photons, many.clone());
    let free = mem_source("pid22_E65536_eta_0_1.json", Species::Photons, many);
    let pipeline = Pipeline::new(&[Species::Photons], EventCap::known_defects()).unwrap();

    let sources = vec![capped, free];
    let stats = pipeline.aggregate(&sources).unwrap();

    let capped_out = dir.join("capped.csv");
    assert_eq!(
        pipeline.emit(&sources[0], &stats, &capped_out).unwrap(),
        EmitOutcome::Written { rows: 2000 }
    );
    let (_, rows) = read_csv(&capped_out);
    assert_eq!(rows.len(), 2000);

    let free_out = dir.join("free.csv");
    assert_eq!(
        pipeline.emit(&sources[1], &stats, &free_out).unwrap(),
        EmitOutcome::Written { rows: 5000 }
    );
    rm_rf(&dir);
}

// Joint electron/photon run: union layer set zero-pads the pion-only
// layers and the pid column carries the species code.
#[test]
fn joint_run_zero_pads_and_tags_species() {
    let dir = tmp_dir("joint");
    let electron = mem_source(
        "pid11_E100_eta_0_1_phiCorrected.json",
        Species::Electrons,
        vec![EventRecord::from_layers([(0, 6.0), (1, 4.0)], [(0, 0.9)])],
    );
    let photon = mem_source(
        "pid22_E100_eta_0_1.json",
        Species::Photons,
        vec![EventRecord::from_layers([(0, 2.0), (1, 8.0)], [(1, 0.5)])],
    );
    let pipeline =
        Pipeline::new(&[Species::Electrons, Species::Photons, Species::Pions], Vec::new())
            .unwrap();
    assert_eq!(pipeline.layers().iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 12, 13, 14]);

    let sources = vec![electron, photon];
    let stats = pipeline.aggregate(&sources).unwrap();

    let e_out = dir.join("electrons.csv");
    let p_out = dir.join("photons.csv");
    pipeline.emit(&sources[0], &stats, &e_out).unwrap();
    pipeline.emit(&sources[1], &stats, &p_out).unwrap();

    let (header, e_rows) = read_csv(&e_out);
    let (_, p_rows) = read_csv(&p_out);
    for row in e_rows.iter().chain(p_rows.iter()) {
        // Pion-only layers are zero-padded for electrons and photons.
        assert_eq!(column(&header, row, "e_13"), 0.0);
        assert_eq!(column(&header, row, "e_14"), 0.0);
        assert_eq!(column(&header, row, "extrapWeight_13"), 0.0);
    }
    assert_eq!(column(&header, &e_rows[0], "pid"), 0.0);
    assert_eq!(column(&header, &p_rows[0], "pid"), 1.0);
    rm_rf(&dir);
}

// Statistics accumulate across sources sharing an eta bin, and the
// emitted z-scores match a direct recomputation.
#[test]
fn z_scores_match_direct_recomputation() {
    let dir = tmp_dir("zscore");
    let a = mem_source(
        "pid22_E100_eta_20_25_a.json",
        Species::Photons,
        vec![EventRecord::from_layers([(0, 2.0), (1, 8.0)], [])],
    );
    let b = mem_source(
        "pid22_E400_eta_20_25_b.json",
        Species::Photons,
        vec![EventRecord::from_layers([(0, 6.0), (1, 4.0)], [])],
    );
    let pipeline = Pipeline::new(&[Species::Photons], Vec::new()).unwrap();
    let sources = vec![a, b];
    let stats = pipeline.aggregate(&sources).unwrap();

    let out = dir.join("a.csv");
    pipeline.emit(&sources[0], &stats, &out).unwrap();
    let (header, rows) = read_csv(&out);

    // ef_0 samples: 0.2 and 0.6 -> mean 0.4, sample stddev sqrt(0.08).
    let stddev = (2.0 * 0.04_f64 / 1.0).sqrt();
    let expected = (0.2 - 0.4) / stddev;
    assert_relative_eq!(column(&header, &rows[0], "ef_0"), expected, epsilon = 1e-12);

    // etrue samples: 100 and 400 -> mean 250, sample stddev per (n-1).
    let e_stddev = ((150.0_f64 * 150.0) * 2.0 / 1.0).sqrt();
    let e_expected = (100.0 - 250.0) / e_stddev;
    assert_relative_eq!(column(&header, &rows[0], "etrue"), e_expected, epsilon = 1e-12);
    rm_rf(&dir);
}

// Persisted statistics can drive emission directly (the LOAD_STATS entry
// point), reproducing the same output as the in-memory table.
#[test]
fn persisted_stats_reproduce_emission() {
    let dir = tmp_dir("load-stats");
    let src = mem_source(
        "pid22_E100_eta_0_1.json",
        Species::Photons,
        vec![
            EventRecord::from_layers([(0, 2.0), (1, 8.0)], []),
            EventRecord::from_layers([(0, 7.0), (1, 3.0)], []),
        ],
    );
    let pipeline = Pipeline::new(&[Species::Photons], Vec::new()).unwrap();
    let stats = pipeline.aggregate(std::slice::from_ref(&src)).unwrap();

    let stats_dir = dir.join("stats");
    stats.persist(&stats_dir).unwrap();
    let loaded = StatsTable::load(&stats_dir).unwrap();

    let fresh = dir.join("fresh.csv");
    let reloaded = dir.join("reloaded.csv");
    pipeline.emit(&src, &stats, &fresh).unwrap();
    pipeline.emit(&src, &loaded, &reloaded).unwrap();
    assert_eq!(fs::read_to_string(&fresh).unwrap(), fs::read_to_string(&reloaded).unwrap());
    rm_rf(&dir);
}

// A JSON source whose event table is absent is skipped during emission
// without failing the batch.
#[test]
fn missing_table_skips_source_on_emission() {
    let dir = tmp_dir("skip");
    let good_path = dir.join("pid22_E100_eta_0_1_good.json");
    fs::write(&good_path, r#"{"rootTree": {"e_0": [4.0, 1.0], "e_1": [6.0, 9.0]}}"#).unwrap();
    let bad_path = dir.join("pid22_E100_eta_0_1_bad.json");
    fs::write(&bad_path, r#"{"wrongTree": {"e_0": [1.0]}}"#).unwrap();

    let good = PipelineSource {
        source: JsonTreeSource::new(&good_path, "rootTree"),
        meta: parse_source_name("pid22_E100_eta_0_1_good.json").unwrap(),
        species: Species::Photons,
    };
    let bad = PipelineSource {
        source: JsonTreeSource::new(&bad_path, "rootTree"),
        meta: parse_source_name("pid22_E100_eta_0_1_bad.json").unwrap(),
        species: Species::Photons,
    };

    let pipeline = Pipeline::new(&[Species::Photons], Vec::new()).unwrap();
    // Pass 1 over the good source only; a missing table in pass 1 would be
    // fatal, since incomplete statistics cannot be trusted.
    let stats = pipeline.aggregate(std::slice::from_ref(&good)).unwrap();

    let bad_out = dir.join("bad.csv");
    assert_eq!(
        pipeline.emit(&bad, &stats, &bad_out).unwrap(),
        EmitOutcome::SkippedMissingTable
    );
    assert!(!bad_out.exists());

    let good_out = dir.join("good.csv");
    assert_eq!(pipeline.emit(&good, &stats, &good_out).unwrap(), EmitOutcome::Written { rows: 2 });
    rm_rf(&dir);
}
