//! A dry run must report exactly the destinations a real run then uses.

use assert_fs::prelude::*;
use assert_fs::TempDir;
use std::path::PathBuf;

use audio_dedupe::{run_detailed, Config, MemorySink, MoveOutcome};

fn build_tree(td: &TempDir) {
    td.child("ref/album/01.flac").write_binary(b"track one").unwrap();
    td.child("src/a/01.flac").write_binary(b"track one").unwrap();
    td.child("src/b/01.flac").write_binary(b"track one").unwrap();
    td.child("src/c/01.flac").write_binary(b"track one").unwrap();
    // an unrelated file already occupies the plain name in the output
    td.child("out/01.flac").write_binary(b"older").unwrap();
}

fn config(td: &TempDir, dry_run: bool) -> Config {
    let mut cfg = Config::new(td.path().join("ref"), td.path().join("src"), td.path().join("out"));
    cfg.dry_run = dry_run;
    cfg.threads = 4;
    cfg
}

fn destinations(outcomes: &[MoveOutcome]) -> Vec<(PathBuf, PathBuf)> {
    outcomes
        .iter()
        .map(|o| (o.src().to_path_buf(), o.dest().expect("no failures expected").to_path_buf()))
        .collect()
}

#[test]
fn dry_run_names_match_real_run() {
    let td = TempDir::new().unwrap();
    build_tree(&td);

    let dry = run_detailed(&config(&td, true), &MemorySink::new()).unwrap();
    assert_eq!(dry.summary.simulated, 3);
    assert_eq!(dry.summary.moved, 0);
    assert!(td.child("src/a/01.flac").path().exists());
    assert!(!td.child("out/01_1.flac").path().exists());

    let real = run_detailed(&config(&td, false), &MemorySink::new()).unwrap();
    assert_eq!(real.summary.moved, 3);

    assert_eq!(destinations(&dry.relocation.outcomes), destinations(&real.relocation.outcomes));
    let out = td.path().join("out");
    let dests: Vec<_> = destinations(&real.relocation.outcomes).into_iter().map(|(_, d)| d).collect();
    assert_eq!(
        dests,
        vec![out.join("01_1.flac"), out.join("01_2.flac"), out.join("01_3.flac")]
    );
    td.child("out/01.flac").assert(b"older" as &[u8]);
}

#[test]
fn dry_run_does_not_create_output() {
    let td = TempDir::new().unwrap();
    td.child("ref/s.mp3").write_binary(b"s").unwrap();
    td.child("src/s.mp3").write_binary(b"s").unwrap();

    let report = run_detailed(&config(&td, true), &MemorySink::new()).unwrap();
    assert_eq!(report.summary.simulated, 1);
    assert!(!td.child("out").path().exists());
}
