//! Candidate discovery.
//! - Walks the whole subtree below a root and keeps regular files with a configured extension.
//! - Extension matching is case-insensitive; symlinks are not followed.
//! - Entries are visited in file-name order so discovery order is stable between runs.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::events::{Event, EventSink};

/// Enumerate audio files under `root`, in discovery order.
///
/// `extensions` must already be normalized (lowercase, no leading dot). Entries that cannot be
/// read are reported as warnings and skipped; the walk itself never fails.
pub fn scan(root: &Path, extensions: &[String], sink: &dyn EventSink) -> Vec<PathBuf> {
    let mut found = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                sink.emit(&Event::ScanEntrySkipped {
                    root: e.path().unwrap_or(root).to_path_buf(),
                    error: e.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if has_extension(entry.path(), extensions) {
            found.push(entry.into_path());
        }
    }

    debug!(root = %root.display(), files = found.len(), "scan finished");
    found
}

/// True when the path's extension matches one of `extensions`, ignoring case.
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
