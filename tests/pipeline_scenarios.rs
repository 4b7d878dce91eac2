//! End-to-end runs over small trees built with assert_fs.

use assert_fs::prelude::*;
use assert_fs::TempDir;
use std::time::Duration;

use audio_dedupe::{run, run_detailed, Config, DedupeError, Event, Level, MemorySink};

fn config(td: &TempDir) -> Config {
    let mut cfg = Config::new(td.path().join("ref"), td.path().join("src"), td.path().join("out"));
    cfg.threads = 2;
    cfg.retries = 1;
    cfg.retry_delay = Duration::from_millis(1);
    cfg
}

#[test]
fn reference_match_and_internal_copy_are_moved() {
    let td = TempDir::new().unwrap();
    td.child("ref/song.mp3").write_binary(b"AAAA").unwrap();
    td.child("src/song.mp3").write_binary(b"AAAA").unwrap();
    td.child("src/song_copy.mp3").write_binary(b"AAAA").unwrap();
    td.child("src/unique.flac").write_binary(b"BBBBBB").unwrap();

    let sink = MemorySink::new();
    let summary = run(&config(&td), &sink).unwrap();

    assert_eq!(summary.reference_files, 1);
    assert_eq!(summary.source_files, 3);
    assert_eq!(summary.duplicates, 2);
    assert_eq!(summary.moved, 2);
    assert!(summary.is_clean());

    assert!(td.child("ref/song.mp3").path().exists());
    assert!(td.child("src/unique.flac").path().exists());
    assert!(!td.child("src/song.mp3").path().exists());
    assert!(!td.child("src/song_copy.mp3").path().exists());
    assert!(td.child("out/song.mp3").path().exists());
    assert!(td.child("out/song_copy.mp3").path().exists());
    assert_eq!(sink.count_level(Level::Error), 0);
}

#[test]
fn first_of_two_identical_sources_stays() {
    let td = TempDir::new().unwrap();
    td.child("ref").create_dir_all().unwrap();
    td.child("src/a.wav").write_binary(b"same bytes").unwrap();
    td.child("src/b.wav").write_binary(b"same bytes").unwrap();

    let report = run_detailed(&config(&td), &MemorySink::new()).unwrap();

    assert_eq!(report.summary.duplicates, 1);
    assert!(td.child("src/a.wav").path().exists());
    assert!(!td.child("src/b.wav").path().exists());
    td.child("out/b.wav").assert(b"same bytes" as &[u8]);
    let reason = report.duplicates.iter().next().unwrap().reason.to_string();
    assert!(reason.contains("a.wav"), "reason should name the kept copy: {reason}");
}

#[test]
fn missing_reference_aborts_before_any_mutation() {
    let td = TempDir::new().unwrap();
    td.child("src/a.wav").write_binary(b"x").unwrap();
    td.child("src/b.wav").write_binary(b"x").unwrap();

    let err = run(&config(&td), &MemorySink::new()).unwrap_err();

    match err.downcast_ref::<DedupeError>() {
        Some(DedupeError::RootMissing { role, .. }) => assert_eq!(*role, "reference"),
        other => panic!("expected RootMissing, got {other:?}"),
    }
    assert!(td.child("src/b.wav").path().exists());
    assert!(!td.child("out").path().exists());
}

#[test]
fn non_audio_files_are_ignored() {
    let td = TempDir::new().unwrap();
    td.child("ref/cover.jpg").write_binary(b"img").unwrap();
    td.child("src/cover.jpg").write_binary(b"img").unwrap();
    td.child("src/TRACK.MP3").write_binary(b"t").unwrap();

    let summary = run(&config(&td), &MemorySink::new()).unwrap();

    assert_eq!(summary.reference_files, 0);
    assert_eq!(summary.source_files, 1);
    assert_eq!(summary.duplicates, 0);
    assert!(td.child("src/cover.jpg").path().exists());
}

#[test]
fn files_with_equal_size_but_different_prefix_are_kept() {
    let td = TempDir::new().unwrap();
    td.child("ref/x.ogg").write_binary(b"1234").unwrap();
    td.child("src/y.ogg").write_binary(b"abcd").unwrap();

    let summary = run(&config(&td), &MemorySink::new()).unwrap();
    assert_eq!(summary.hashed, 2);
    assert_eq!(summary.duplicates, 0);
}

#[test]
fn summary_event_closes_the_run() {
    let td = TempDir::new().unwrap();
    td.child("ref/a.aiff").write_binary(b"a").unwrap();
    td.child("src/a.aiff").write_binary(b"a").unwrap();

    let sink = MemorySink::new();
    let summary = run(&config(&td), &sink).unwrap();
    match sink.events().last() {
        Some(Event::Summary(s)) => assert_eq!(*s, summary),
        other => panic!("expected a summary event last, got {other:?}"),
    }
}

#[test]
fn dotted_extensions_still_match() {
    let td = TempDir::new().unwrap();
    td.child("ref/a.mp3").write_binary(b"same").unwrap();
    td.child("src/a.mp3").write_binary(b"same").unwrap();
    let mut cfg = config(&td);
    cfg.extensions = vec![".MP3".into()];

    let summary = run(&cfg, &MemorySink::new()).unwrap();

    assert_eq!(summary.reference_files, 1);
    assert_eq!(summary.source_files, 1);
    assert_eq!(summary.moved, 1);
}
