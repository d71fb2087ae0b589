#![cfg(unix)]
use std::path::Path;
use std::thread;
use std::time::Duration;

use babel_core::{
    BundleVariant, CachedRunSummary, MaterialTable, ProgressEvent, ResultBundle, SimulationConfig,
    TransducerGeometry, ERROR_SENTINEL,
};
use babel_io::{write_bundle_hdf5, ResultStore};
use babel_sim::{Error, RunMessage, RunObserver, RunOutcome, SimulationOrchestrator, SolverCommand};
use ndarray::Array3;
use tempfile::TempDir;

#[derive(Default)]
struct Recorder {
    reuse: bool,
    reuse_asked: Vec<CachedRunSummary>,
    busy: Vec<bool>,
    lines: Vec<String>,
    failures: usize,
}

impl RunObserver for Recorder {
    fn confirm_reuse(&mut self, summary: &CachedRunSummary) -> bool {
        self.reuse_asked.push(*summary);
        self.reuse
    }

    fn set_busy(&mut self, busy: bool) {
        self.busy.push(busy);
    }

    fn on_progress(&mut self, event: &ProgressEvent) {
        self.lines.push(event.line.clone());
    }

    fn on_solver_failure(&mut self) {
        self.failures += 1;
    }
}

fn config(dir: &Path) -> SimulationConfig {
    SimulationConfig::new(
        "sub-01",
        dir.join("sub-01_H246_"),
        TransducerGeometry {
            focal_length_m: 0.135,
            diameter_m: 0.064,
        },
    )
}

fn bundle(amplitude: f64) -> ResultBundle {
    ResultBundle {
        p_amp: Array3::from_elem((3, 3, 3), amplitude),
        material_map: Array3::from_elem((3, 3, 3), 4),
        x_vec: vec![-0.001, 0.0, 0.001],
        y_vec: vec![-0.001, 0.0, 0.001],
        z_vec: vec![0.0, 0.001, 0.002],
        material: MaterialTable::from_pairs(&[(1000.0, 1500.0); 5]).unwrap(),
        target_location: [1, 1, 1],
        adjustment_in_ras: [0.0; 3],
        tx_mechanical_adjustment: [Some(0.001), Some(0.0), Some(0.0)],
        z_steering: Some(0.0),
    }
}

fn write_bundles(cfg: &SimulationConfig) {
    let store = ResultStore::new();
    store.save(cfg, BundleVariant::Full, &bundle(2.0)).unwrap();
    store.save(cfg, BundleVariant::Water, &bundle(1.0)).unwrap();
}

/// Stand-in solver that touches `marker` so tests can tell whether it ran.
fn orchestrator(script: &str, marker: &Path) -> SimulationOrchestrator {
    let script = format!("touch '{}'; {script}", marker.display());
    SimulationOrchestrator::new(SolverCommand::new("sh").arg("-c").arg(script).arg("solver"))
        .with_poll_interval(Duration::from_millis(10))
}

#[test]
fn test_cache_hit_skips_solver() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    write_bundles(&cfg);
    let marker = dir.path().join("ran");

    let mut observer = Recorder {
        reuse: true,
        ..Recorder::default()
    };
    let outcome = orchestrator("echo hi", &marker)
        .run(&cfg, false, &mut observer)
        .unwrap();

    assert!(matches!(outcome, RunOutcome::CacheHit(_)));
    assert_eq!(outcome.bundles().unwrap().full, bundle(2.0));
    assert_eq!(observer.reuse_asked.len(), 1);
    assert_eq!(observer.reuse_asked[0].tx_mechanical_adjustment_mm[0], Some(1.0));
    assert!(observer.busy.is_empty());
    assert!(!marker.exists());
}

#[test]
fn test_declined_reuse_recomputes() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    write_bundles(&cfg);
    let marker = dir.path().join("ran");

    let mut observer = Recorder::default();
    let outcome = orchestrator("echo computing; echo done", &marker)
        .run(&cfg, false, &mut observer)
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Computed(_)));
    assert!(marker.exists());
    assert_eq!(observer.lines, ["computing", "done"]);
    assert_eq!(observer.busy, [true, false]);
    assert_eq!(observer.failures, 0);
}

#[test]
fn test_unreadable_water_bundle_still_offers_recompute() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    let store = ResultStore::new();
    store.save(&cfg, BundleVariant::Full, &bundle(2.0)).unwrap();
    let water_path = store.path_for(&cfg, BundleVariant::Water);
    std::fs::write(&water_path, b"truncated").unwrap();

    let good_water = dir.path().join("good_water.h5");
    write_bundle_hdf5(&good_water, &bundle(1.0)).unwrap();
    let marker = dir.path().join("ran");
    let script = format!("cp '{}' '{}'", good_water.display(), water_path.display());

    let mut observer = Recorder::default();
    let outcome = orchestrator(&script, &marker)
        .run(&cfg, false, &mut observer)
        .unwrap();

    assert_eq!(observer.reuse_asked.len(), 1);
    assert!(marker.exists());
    let pair = outcome.bundles().unwrap();
    assert!(matches!(outcome, RunOutcome::Computed(_)));
    assert_eq!(pair.water, bundle(1.0));
}

#[test]
fn test_reusing_unreadable_water_bundle_fails() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    let store = ResultStore::new();
    store.save(&cfg, BundleVariant::Full, &bundle(2.0)).unwrap();
    std::fs::write(store.path_for(&cfg, BundleVariant::Water), b"truncated").unwrap();
    let marker = dir.path().join("ran");

    let mut observer = Recorder {
        reuse: true,
        ..Recorder::default()
    };
    let err = orchestrator("true", &marker)
        .run(&cfg, false, &mut observer)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Store(babel_io::Error::MissingResult { .. })
    ));
    assert_eq!(observer.reuse_asked.len(), 1);
    assert!(!marker.exists());
}

#[test]
fn test_force_recompute_ignores_cache() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    write_bundles(&cfg);
    let marker = dir.path().join("ran");

    let mut observer = Recorder {
        reuse: true,
        ..Recorder::default()
    };
    let outcome = orchestrator("true", &marker)
        .run(&cfg, true, &mut observer)
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Computed(_)));
    assert!(observer.reuse_asked.is_empty());
    assert!(marker.exists());
}

#[test]
fn test_sentinel_yields_error_outcome() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    let marker = dir.path().join("ran");
    let script = format!("echo step 1; echo 'fatal {ERROR_SENTINEL}'; echo step 2; exit 0");

    let mut observer = Recorder::default();
    let outcome = orchestrator(&script, &marker)
        .run(&cfg, false, &mut observer)
        .unwrap();

    assert_eq!(outcome, RunOutcome::Error);
    assert!(outcome.bundles().is_none());
    assert_eq!(observer.failures, 1);
    assert_eq!(observer.busy, [true, false]);
    assert_eq!(observer.lines.len(), 3);
}

#[test]
fn test_success_without_bundles_is_missing_result() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    let marker = dir.path().join("ran");

    let mut observer = Recorder::default();
    let err = orchestrator("echo nothing written", &marker)
        .run(&cfg, false, &mut observer)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Store(babel_io::Error::MissingResult { .. })
    ));
    assert_eq!(observer.busy, [true, false]);
}

#[test]
fn test_invalid_config_starts_nothing() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path()).with_frequencies(vec![], vec![]);
    let marker = dir.path().join("ran");

    let mut observer = Recorder::default();
    let err = orchestrator("true", &marker)
        .run(&cfg, true, &mut observer)
        .unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert!(observer.busy.is_empty());
    assert!(!marker.exists());
}

#[test]
fn test_compute_reports_progress() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    write_bundles(&cfg);
    let marker = dir.path().join("ran");

    let mut lines = Vec::new();
    let outcome = orchestrator("echo a; echo b", &marker)
        .compute(&cfg, |event| lines.push(event.line.clone()))
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Computed(_)));
    assert_eq!(lines, ["a", "b"]);
}

#[test]
fn test_spawn_compute_messages() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    write_bundles(&cfg);
    let marker = dir.path().join("ran");

    let task = orchestrator("echo one; echo two", &marker)
        .spawn_compute(cfg)
        .unwrap();
    let messages = task.wait().unwrap();

    let progress: Vec<&str> = messages
        .iter()
        .filter_map(|m| match m {
            RunMessage::Progress(e) => Some(e.line.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(progress, ["one", "two"]);
    match messages.last() {
        Some(RunMessage::Complete(outcome)) => {
            assert!(matches!(**outcome, RunOutcome::Computed(_)));
        }
        other => panic!("unexpected last message: {other:?}"),
    }
}

#[test]
fn test_spawn_compute_try_recv_after_finish() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    write_bundles(&cfg);
    let marker = dir.path().join("ran");

    let task = orchestrator("echo one", &marker).spawn_compute(cfg).unwrap();
    while !task.is_finished() {
        thread::sleep(Duration::from_millis(5));
    }

    let mut messages = Vec::new();
    while let Some(message) = task.try_recv() {
        messages.push(message);
    }
    assert!(matches!(messages.last(), Some(RunMessage::Complete(_))));
    assert!(task.try_recv().is_none());
    assert!(task.recv().is_none());
    assert!(task.wait().unwrap().is_empty());
}

#[test]
fn test_spawn_compute_reports_start_failure() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    let orchestrator = SimulationOrchestrator::new(SolverCommand::new("/nonexistent/solver"));

    let messages = orchestrator.spawn_compute(cfg).unwrap().wait().unwrap();
    assert_eq!(messages.len(), 1);
    assert!(matches!(messages[0], RunMessage::Error(_)));
}
