//! Platform-specific helpers for the config and log files.
//! Unix gets real 0600/0700 modes; Windows gets the same API with best-effort semantics.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(unix)]
mod unix;
#[cfg(not(unix))]
mod windows;

#[cfg(unix)]
pub use unix::{
    open_log_file_secure_append, set_dir_mode_0700, set_file_mode_0600,
    write_config_secure_new_0600,
};

#[cfg(not(unix))]
pub use windows::{
    open_log_file_secure_append, set_dir_mode_0700, set_file_mode_0600,
    write_config_secure_new_0600,
};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Hidden sibling name for an atomic write of `target`.
/// Pattern: .audio_dedupe.config.tmp.<pid>.<nanos>.<seq>
fn tmp_sibling_name(target: &Path) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = format!(".audio_dedupe.config.tmp.{pid}.{nanos}.{seq}");
    target
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn sibling_names_are_unique_across_threads() {
        let handles: Vec<_> = (0..16)
            .map(|_| thread::spawn(|| tmp_sibling_name(Path::new("dir/config.xml"))))
            .collect();
        let set: HashSet<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(set.len(), 16);
        assert!(set.iter().all(|p| p.starts_with("dir")));
    }
}
