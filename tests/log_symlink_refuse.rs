#![cfg(unix)]

//! path_has_symlink_ancestor flags a symlinked parent of the default log directory.
//!
//! The parent test re-runs this binary with HOME pointed at a temp dir, so the child can swap
//! the log directory for a symlink without touching real user state.

use std::fs;
use std::os::unix::fs as unix_fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn log_file_symlink_parent_refused() {
    let temp_home = tempdir().expect("temp HOME");
    let outside = tempdir().expect("outside target");

    let me = std::env::current_exe().expect("current test binary");
    let status = Command::new(me)
        .arg("--ignored")
        .arg("log_file_symlink_parent_refused_child")
        .env("HOME", temp_home.path())
        .env_remove("XDG_DATA_HOME")
        .env_remove("AUDIO_DEDUPE_CONFIG")
        .env("AUDIO_DEDUPE_OUTSIDE", outside.path())
        .status()
        .expect("spawn child test");
    assert!(status.success(), "child test failed: {status}");
}

#[test]
#[ignore]
fn log_file_symlink_parent_refused_child() {
    let log_path = audio_dedupe::default_log_path().expect("default_log_path should resolve");
    assert!(
        !audio_dedupe::path_has_symlink_ancestor(&log_path).unwrap(),
        "baseline: no symlink ancestor expected for {}",
        log_path.display()
    );

    let app_dir = log_path.parent().expect("log_path has parent").to_path_buf();
    fs::create_dir_all(app_dir.parent().expect("app_dir has parent")).unwrap();

    let outside = std::path::PathBuf::from(
        std::env::var_os("AUDIO_DEDUPE_OUTSIDE").expect("OUTSIDE provided by parent"),
    );
    if app_dir.exists() {
        fs::remove_dir_all(&app_dir).unwrap();
    }
    unix_fs::symlink(&outside, &app_dir).unwrap();

    assert!(
        audio_dedupe::path_has_symlink_ancestor(&log_path).unwrap(),
        "symlink ancestor should be detected for {}",
        log_path.display()
    );
}
