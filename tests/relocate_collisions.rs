//! Collision naming across runs: a second batch continues the numbering instead of clobbering.

use std::fs;
use std::time::Duration;
use tempfile::tempdir;

use audio_dedupe::{relocate_all, MemorySink, MoveSettings};

fn settings() -> MoveSettings {
    MoveSettings {
        dry_run: false,
        retries: 0,
        retry_delay: Duration::ZERO,
        preserve_metadata: false,
    }
}

#[test]
fn second_batch_continues_suffixes() {
    let td = tempdir().unwrap();
    let out = td.path().join("out");
    let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();

    for (batch, body) in [(0, "first"), (1, "second")] {
        let src = td.path().join(format!("batch{batch}"));
        fs::create_dir_all(&src).unwrap();
        let p = src.join("intro.mp3");
        fs::write(&p, body).unwrap();
        let report = relocate_all(&[p], &out, settings(), &pool, &MemorySink::new());
        assert_eq!(report.moved(), 1);
    }

    assert_eq!(fs::read_to_string(out.join("intro.mp3")).unwrap(), "first");
    assert_eq!(fs::read_to_string(out.join("intro_1.mp3")).unwrap(), "second");
}

#[test]
fn names_without_extension_get_plain_suffix() {
    let td = tempdir().unwrap();
    let out = td.path().join("out");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("README"), b"taken").unwrap();
    let src = td.path().join("README");
    fs::write(&src, b"moved").unwrap();

    let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
    let report = relocate_all(&[src], &out, settings(), &pool, &MemorySink::new());
    assert_eq!(report.outcomes[0].dest(), Some(out.join("README_1").as_path()));
}
