//! Destination naming.
//!
//! Policy: keep the source's base name; on collision append `_<n>` before the extension with the
//! lowest free `n` starting at 1 (`song.mp3`, `song_1.mp3`, `song_2.mp3`, ...). Existing files
//! are never overwritten.
//!
//! A name is claimed, not just computed:
//! - real runs create an empty placeholder with exclusive-create, so two claimants (threads or
//!   processes) can never both win the same name;
//! - dry runs record the name in an in-memory ledger, consulted together with the filesystem, so a
//!   simulated batch reports exactly the names a real batch would get.
//!
//! Placeholders waiting for their move are tracked in a [`ClaimRegistry`]. On interrupt,
//! [`abandon_pending_claims`] removes the ones no worker has started on, so an aborted run does
//! not leave empty files behind. A move already in flight may still leave its placeholder.

use std::collections::{BTreeSet, HashSet};
use std::ffi::{OsStr, OsString};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use tracing::trace;

use super::helpers::io_error_with_help;
use crate::errors::DedupeError;

/// Highest numeric suffix tried before giving up on a name.
pub const MAX_SUFFIX: u32 = 10_000;

// Conservative filename limits (bytes/characters, platform-specific and approximate).
#[cfg(windows)]
const MAX_FILENAME_LEN: usize = 240;
#[cfg(not(windows))]
const MAX_FILENAME_LEN: usize = 255;

/// Placeholders created on disk that no move has started filling yet.
pub struct ClaimRegistry {
    state: Mutex<RegistryState>,
}

struct RegistryState {
    pending: BTreeSet<PathBuf>,
    stopping: bool,
}

impl ClaimRegistry {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                pending: BTreeSet::new(),
                stopping: false,
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn add(&self, path: &Path) {
        self.state().pending.insert(path.to_path_buf());
    }

    fn forget(&self, path: &Path) {
        self.state().pending.remove(path);
    }

    /// Take `path` off the pending list. False once the registry is stopping.
    fn start(&self, path: &Path) -> bool {
        let mut state = self.state();
        if state.stopping {
            return false;
        }
        state.pending.remove(path);
        true
    }

    /// Stop handing out moves and remove every pending placeholder that is still empty.
    /// Returns how many were removed.
    pub fn abandon(&self) -> usize {
        let mut state = self.state();
        state.stopping = true;
        let mut removed = 0;
        for path in std::mem::take(&mut state.pending) {
            if remove_if_placeholder(&path) {
                removed += 1;
            }
        }
        removed
    }
}

impl Default for ClaimRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static PENDING_CLAIMS: ClaimRegistry = ClaimRegistry::new();

/// Remove the placeholders of every move that has not started yet. Meant for interrupt handlers.
pub fn abandon_pending_claims() -> usize {
    PENDING_CLAIMS.abandon()
}

/// Hands out unique destination names inside one directory tree.
pub struct NameClaims {
    simulate: bool,
    ledger: Mutex<HashSet<PathBuf>>,
    registry: &'static ClaimRegistry,
}

impl NameClaims {
    /// `simulate` selects ledger-only claims for dry runs.
    pub fn new(simulate: bool) -> Self {
        Self::with_registry(simulate, &PENDING_CLAIMS)
    }

    pub fn with_registry(simulate: bool, registry: &'static ClaimRegistry) -> Self {
        Self {
            simulate,
            ledger: Mutex::new(HashSet::new()),
            registry,
        }
    }

    /// Mark `claimed` as being filled by a move. False when an interrupt abandoned the claim.
    pub fn begin_move(&self, claimed: &Path) -> bool {
        self.simulate || self.registry.start(claimed)
    }

    /// Claim the lowest free name for `file_name` inside `dir`.
    pub fn claim(&self, dir: &Path, file_name: &OsStr) -> Result<PathBuf> {
        let base = Path::new(file_name);
        let stem: OsString = base
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_else(|| file_name.to_os_string());
        let ext: Option<OsString> = base.extension().map(|e| e.to_os_string());

        for n in 0..=MAX_SUFFIX {
            let suffix = if n == 0 { String::new() } else { format!("_{n}") };
            let candidate = dir.join(build_name_with_suffix(&stem, ext.as_deref(), &suffix));
            if self.try_take(&candidate)? {
                if n > 0 {
                    trace!(name = ?file_name, dest = %candidate.display(), "collision resolved with suffix");
                }
                return Ok(candidate);
            }
        }

        Err(DedupeError::NameSpaceExhausted {
            dir: dir.to_path_buf(),
            name: file_name.to_string_lossy().into_owned(),
        }
        .into())
    }

    /// Give a claimed name back. Real runs remove the placeholder if it is still empty.
    pub fn release(&self, claimed: &Path) {
        if self.simulate {
            self.lock().remove(claimed);
            return;
        }
        self.registry.forget(claimed);
        remove_if_placeholder(claimed);
    }

    fn try_take(&self, candidate: &Path) -> Result<bool> {
        if self.simulate {
            let mut ledger = self.lock();
            if ledger.contains(candidate) || occupied(candidate) {
                return Ok(false);
            }
            ledger.insert(candidate.to_path_buf());
            return Ok(true);
        }

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(candidate)
        {
            Ok(_) => {
                self.registry.add(candidate);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(io_error_with_help("reserve destination name", candidate)(e).into()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        match self.ledger.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Remove `path` only if it is still an empty regular file.
fn remove_if_placeholder(path: &Path) -> bool {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() == 0 => fs::remove_file(path).is_ok(),
        _ => false,
    }
}

/// Anything at the path, including a dangling symlink, makes the name unavailable.
fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Measure the approximate length of an OsStr for filename budgeting.
#[cfg(unix)]
fn name_len_units(s: &OsStr) -> usize {
    use std::os::unix::ffi::OsStrExt;
    s.as_bytes().len()
}

#[cfg(not(unix))]
fn name_len_units(s: &OsStr) -> usize {
    s.to_string_lossy().len()
}

/// Build `stem + suffix + ["." + ext]`, trimming the stem so the result fits MAX_FILENAME_LEN.
pub(crate) fn build_name_with_suffix(stem: &OsStr, ext: Option<&OsStr>, suffix: &str) -> OsString {
    let mut overhead = name_len_units(OsStr::new(suffix));
    let mut ext_part = OsString::new();
    if let Some(e) = ext {
        overhead = overhead.saturating_add(1 + name_len_units(e));
        ext_part.push(".");
        ext_part.push(e);
    }

    let mut stem_os = stem.to_os_string();
    if name_len_units(&stem_os) + overhead > MAX_FILENAME_LEN {
        stem_os = trim_stem(stem, MAX_FILENAME_LEN.saturating_sub(overhead));
    }

    let mut new_name = stem_os;
    new_name.push(suffix);
    new_name.push(&ext_part);
    new_name
}

fn trim_stem(stem: &OsStr, budget: usize) -> OsString {
    if budget == 0 {
        return OsString::from("f");
    }
    if let Some(s) = stem.to_str() {
        let mut acc = String::new();
        for ch in s.chars() {
            if acc.len() + ch.len_utf8() > budget {
                break;
            }
            acc.push(ch);
        }
        if acc.is_empty() {
            acc.push('f');
        }
        return OsString::from(acc);
    }
    #[cfg(unix)]
    {
        use std::os::unix::ffi::{OsStrExt, OsStringExt};
        let bytes = stem.as_bytes();
        OsString::from_vec(bytes[..bytes.len().min(budget)].to_vec())
    }
    #[cfg(not(unix))]
    {
        let lossy = stem.to_string_lossy();
        trim_stem(OsStr::new(&*lossy), budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn suffix_goes_before_extension() {
        let n = build_name_with_suffix(OsStr::new("song"), Some(OsStr::new("mp3")), "_1");
        assert_eq!(n, OsString::from("song_1.mp3"));
        let n = build_name_with_suffix(OsStr::new("README"), None, "_2");
        assert_eq!(n, OsString::from("README_2"));
    }

    #[test]
    fn long_names_are_trimmed_to_fit() {
        let stem = "x".repeat(400);
        let n = build_name_with_suffix(OsStr::new(&stem), Some(OsStr::new("flac")), "_12");
        assert_eq!(name_len_units(&n), MAX_FILENAME_LEN);
        assert!(n.to_string_lossy().ends_with("_12.flac"));
    }

    #[test]
    fn real_claims_create_placeholders_and_pick_lowest_free() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("song.mp3"), b"existing").unwrap();
        fs::write(td.path().join("song_2.mp3"), b"existing").unwrap();

        let claims = NameClaims::new(false);
        let first = claims.claim(td.path(), OsStr::new("song.mp3")).unwrap();
        assert_eq!(first, td.path().join("song_1.mp3"));
        assert!(first.exists());
        let second = claims.claim(td.path(), OsStr::new("song.mp3")).unwrap();
        assert_eq!(second, td.path().join("song_3.mp3"));

        claims.release(&first);
        assert!(!first.exists());
        // existing content is never released
        claims.release(&td.path().join("song.mp3"));
        assert!(td.path().join("song.mp3").exists());
    }

    #[test]
    fn abandoning_removes_only_unstarted_placeholders() {
        static REGISTRY: ClaimRegistry = ClaimRegistry::new();
        let td = tempdir().unwrap();
        let claims = NameClaims::with_registry(false, &REGISTRY);
        let started = claims.claim(td.path(), OsStr::new("a.mp3")).unwrap();
        let waiting = claims.claim(td.path(), OsStr::new("b.mp3")).unwrap();
        assert!(claims.begin_move(&started));

        assert_eq!(REGISTRY.abandon(), 1);

        assert!(started.exists());
        assert!(!waiting.exists());
        // nothing new starts once abandoned
        let late = claims.claim(td.path(), OsStr::new("c.mp3")).unwrap();
        assert!(!claims.begin_move(&late));
    }

    #[test]
    fn dry_runs_always_start() {
        static REGISTRY: ClaimRegistry = ClaimRegistry::new();
        REGISTRY.abandon();
        let td = tempdir().unwrap();
        let claims = NameClaims::with_registry(true, &REGISTRY);
        let name = claims.claim(td.path(), OsStr::new("x.wav")).unwrap();
        assert!(claims.begin_move(&name));
    }

    #[test]
    fn simulated_claims_touch_nothing_but_still_collide() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("a.wav"), b"existing").unwrap();

        let claims = NameClaims::new(true);
        let one = claims.claim(td.path(), OsStr::new("a.wav")).unwrap();
        let two = claims.claim(td.path(), OsStr::new("a.wav")).unwrap();
        assert_eq!(one, td.path().join("a_1.wav"));
        assert_eq!(two, td.path().join("a_2.wav"));
        assert!(!one.exists());
        assert!(!two.exists());
    }

    #[test]
    fn exhausted_namespace_is_an_error() {
        let td = tempdir().unwrap();
        let claims = NameClaims::new(true);
        {
            let mut ledger = claims.lock();
            ledger.insert(td.path().join("a.ogg"));
            for n in 1..=MAX_SUFFIX {
                ledger.insert(td.path().join(format!("a_{n}.ogg")));
            }
        }
        let err = claims.claim(td.path(), OsStr::new("a.ogg")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DedupeError>(),
            Some(DedupeError::NameSpaceExhausted { .. })
        ));
    }
}
