mod common;

use common::{size_of, wait_until, write_sized, ScriptedEngine, MB};
use pdf_shrink_core::cancel::CancelSignal;
use pdf_shrink_core::compressor::cache_key;
use pdf_shrink_core::{
    Compressor, FolderWatcher, QualityProfile, ScanSummary, SilentSink, SizeCache,
};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn low() -> QualityProfile {
    QualityProfile::Low
}

/// Layout:
///   root/
///     a.pdf              (2MB)
///     a_compressed.pdf   (2MB)  <- output marker, never eligible
///     notes.txt
///     nested/
///       B.PDF            (3MB)
///       archive/
///         old.pdf        (3MB)
fn create_test_tree(root: &Path) {
    write_sized(&root.join("a.pdf"), 2 * MB);
    write_sized(&root.join("a_compressed.pdf"), 2 * MB);
    write_sized(&root.join("notes.txt"), 100);
    write_sized(&root.join("nested").join("B.PDF"), 3 * MB);
    write_sized(&root.join("nested").join("archive").join("old.pdf"), 3 * MB);
}

fn processed_names(engine: &ScriptedEngine) -> Vec<String> {
    let mut names: Vec<String> = engine
        .paths_used()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_scan_skips_compressed_marker_files() {
    let tmp = tempdir().unwrap();
    create_test_tree(tmp.path());

    let engine = Arc::new(ScriptedEngine::producing(MB));
    let cache = Arc::new(SizeCache::in_memory());
    // A stale record must not matter: the marker rule wins regardless of cache state.
    cache
        .put(&cache_key(&tmp.path().join("a_compressed.pdf")), 1)
        .unwrap();
    let compressor = Compressor::new(engine.clone(), cache);

    let summary = FolderWatcher::new(tmp.path()).scan_once(
        &compressor,
        &low,
        &CancelSignal::new(),
        &SilentSink,
    );

    assert_eq!(processed_names(&engine), vec!["B.PDF", "a.pdf", "old.pdf"]);
    assert_eq!(summary.eligible, 3);
    assert_eq!(summary.compressed, 3);
    assert_eq!(summary.bytes_saved, (2 - 1) * MB + 2 * (3 - 1) * MB);
    assert_eq!(size_of(&tmp.path().join("a_compressed.pdf")), 2 * MB);
}

#[test]
fn test_second_scan_skips_everything() {
    let tmp = tempdir().unwrap();
    create_test_tree(tmp.path());

    let engine = Arc::new(ScriptedEngine::producing(MB));
    let compressor = Compressor::new(engine.clone(), Arc::new(SizeCache::in_memory()));
    let watcher = FolderWatcher::new(tmp.path());
    let cancel = CancelSignal::new();

    watcher.scan_once(&compressor, &low, &cancel, &SilentSink);
    let second = watcher.scan_once(&compressor, &low, &cancel, &SilentSink);
    assert_eq!(
        second,
        ScanSummary {
            eligible: 3,
            unchanged: 3,
            ..ScanSummary::default()
        }
    );
    assert_eq!(engine.calls(), 3);
}

#[test]
fn test_non_recursive_scan_stays_at_top_level() {
    let tmp = tempdir().unwrap();
    create_test_tree(tmp.path());

    let engine = Arc::new(ScriptedEngine::producing(MB));
    let compressor = Compressor::new(engine.clone(), Arc::new(SizeCache::in_memory()));
    FolderWatcher::new(tmp.path()).recursive(false).scan_once(
        &compressor,
        &low,
        &CancelSignal::new(),
        &SilentSink,
    );

    assert_eq!(processed_names(&engine), vec!["a.pdf"]);
}

#[test]
fn test_ignore_patterns_prune_directories() {
    let tmp = tempdir().unwrap();
    create_test_tree(tmp.path());

    let engine = Arc::new(ScriptedEngine::producing(MB));
    let compressor = Compressor::new(engine.clone(), Arc::new(SizeCache::in_memory()));
    FolderWatcher::new(tmp.path())
        .ignore_patterns(&["**/archive".to_string()])
        .scan_once(&compressor, &low, &CancelSignal::new(), &SilentSink);

    assert_eq!(processed_names(&engine), vec!["B.PDF", "a.pdf"]);
}

#[test]
fn test_engine_unavailable_ends_pass_early() {
    let tmp = tempdir().unwrap();
    create_test_tree(tmp.path());

    let engine = Arc::new(ScriptedEngine::unavailable());
    let compressor = Compressor::new(engine.clone(), Arc::new(SizeCache::in_memory()));
    let summary = FolderWatcher::new(tmp.path()).scan_once(
        &compressor,
        &low,
        &CancelSignal::new(),
        &SilentSink,
    );

    assert!(summary.engine_unavailable);
    assert_eq!(summary.eligible, 1);
    assert_eq!(summary.failed, 1);
}

#[test]
fn test_cancelled_scan_processes_nothing() {
    let tmp = tempdir().unwrap();
    create_test_tree(tmp.path());

    let engine = Arc::new(ScriptedEngine::producing(MB));
    let compressor = Compressor::new(engine.clone(), Arc::new(SizeCache::in_memory()));
    let cancel = CancelSignal::new();
    cancel.cancel();

    let summary = FolderWatcher::new(tmp.path()).scan_once(&compressor, &low, &cancel, &SilentSink);
    assert!(summary.cancelled);
    assert_eq!(engine.calls(), 0);
}

#[test]
fn test_run_stops_mid_scan_within_one_file() {
    let tmp = tempdir().unwrap();
    for i in 0..20 {
        write_sized(&tmp.path().join(format!("doc{:02}.pdf", i)), 4096);
    }

    let engine = Arc::new(ScriptedEngine::producing(1024).with_delay(Duration::from_millis(100)));
    let compressor = Arc::new(Compressor::new(
        engine.clone(),
        Arc::new(SizeCache::in_memory()),
    ));
    let cancel = CancelSignal::new();

    let worker = {
        let compressor = Arc::clone(&compressor);
        let cancel = cancel.clone();
        let root = tmp.path().to_path_buf();
        thread::spawn(move || {
            FolderWatcher::new(root).run(&compressor, &low, &cancel, &SilentSink);
        })
    };

    assert!(wait_until(Duration::from_secs(5), || engine.calls() >= 2));
    let start = Instant::now();
    cancel.cancel();
    worker.join().unwrap();

    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(engine.calls() < 20);
}

#[test]
fn test_run_survives_unbounded_poll_interval() {
    let tmp = tempdir().unwrap();
    write_sized(&tmp.path().join("a.pdf"), 4096);

    let engine = Arc::new(ScriptedEngine::producing(1024));
    let compressor = Arc::new(Compressor::new(
        engine.clone(),
        Arc::new(SizeCache::in_memory()),
    ));
    let cancel = CancelSignal::new();

    let worker = {
        let compressor = Arc::clone(&compressor);
        let cancel = cancel.clone();
        let root = tmp.path().to_path_buf();
        thread::spawn(move || {
            FolderWatcher::new(root)
                .poll_interval(Duration::from_secs(i64::MAX as u64))
                .run(&compressor, &low, &cancel, &SilentSink);
        })
    };

    assert!(wait_until(Duration::from_secs(5), || engine.calls() == 1));
    // Give the worker time to enter its wait after the first pass.
    thread::sleep(Duration::from_millis(100));
    assert!(!worker.is_finished(), "watcher thread exited on its own");

    cancel.cancel();
    worker.join().unwrap();
}
