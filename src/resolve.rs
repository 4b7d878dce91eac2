//! Duplicate resolution between the protected reference index and the source index.
//!
//! Policy:
//! - a source fingerprint that also exists in the reference selects every source path under it;
//! - a fingerprint only in the source with N paths keeps the first discovered and selects N-1;
//! - a fingerprint only in the source with a single path is left alone.
//!
//! Reference paths are only ever read from; they never end up in a `DuplicateSet`.

use std::fmt;
use std::path::PathBuf;

use crate::fingerprint::FingerprintIndex;

/// Why a source path was selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateReason {
    /// Same fingerprint as a protected reference file (the first one discovered is named).
    MatchesReference { reference: PathBuf },
    /// Same fingerprint as an earlier source file that is kept.
    CopyOf { canonical: PathBuf },
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateReason::MatchesReference { reference } => {
                write!(f, "matches reference {}", reference.display())
            }
            DuplicateReason::CopyOf { canonical } => {
                write!(f, "copy of {}", canonical.display())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    pub path: PathBuf,
    pub reason: DuplicateReason,
    ordinal: usize,
}

/// Source paths selected for relocation, in source discovery order.
#[derive(Debug, Default, Clone)]
pub struct DuplicateSet {
    entries: Vec<Duplicate>,
}

impl DuplicateSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Duplicate> {
        self.entries.iter()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|d| d.path.clone()).collect()
    }

    pub fn contains(&self, path: &std::path::Path) -> bool {
        self.entries.iter().any(|d| d.path == path)
    }
}

impl<'a> IntoIterator for &'a DuplicateSet {
    type Item = &'a Duplicate;
    type IntoIter = std::slice::Iter<'a, Duplicate>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Compute which source paths are redundant.
pub fn resolve(reference: &FingerprintIndex, source: &FingerprintIndex) -> DuplicateSet {
    let mut entries = Vec::new();

    for (fingerprint, paths) in source.groups() {
        if let Some(protected) = reference.get(fingerprint).and_then(|r| r.first()) {
            entries.extend(paths.iter().map(|p| Duplicate {
                path: p.path.clone(),
                reason: DuplicateReason::MatchesReference {
                    reference: protected.path.clone(),
                },
                ordinal: p.ordinal,
            }));
            continue;
        }
        if let Some((canonical, rest)) = paths.split_first() {
            entries.extend(rest.iter().map(|p| Duplicate {
                path: p.path.clone(),
                reason: DuplicateReason::CopyOf {
                    canonical: canonical.path.clone(),
                },
                ordinal: p.ordinal,
            }));
        }
    }

    entries.sort_by_key(|d| d.ordinal);
    DuplicateSet { entries }
}
