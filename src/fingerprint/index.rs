//! Data model of the fingerprinting stage: records, size buckets and the fingerprint index.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use super::digest::Digest;

/// A discovered candidate. `ordinal` is its position in the tree's discovery order and decides
/// which copy counts as "first"; hashing completion order never does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub ordinal: usize,
}

/// Records of one tree grouped by exact byte size. Every record lives in exactly one bucket.
#[derive(Debug, Default)]
pub struct SizeBuckets {
    buckets: BTreeMap<u64, Vec<FileRecord>>,
    records: usize,
}

impl SizeBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record; buckets stay sorted by ordinal.
    pub fn insert(&mut self, record: FileRecord) {
        let bucket = self.buckets.entry(record.size).or_default();
        let pos = bucket.partition_point(|r| r.ordinal < record.ordinal);
        bucket.insert(pos, record);
        self.records += 1;
    }

    /// Number of records across all buckets.
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    pub fn bucket(&self, size: u64) -> Option<&[FileRecord]> {
        self.buckets.get(&size).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &[FileRecord])> {
        self.buckets.iter().map(|(s, v)| (*s, v.as_slice()))
    }

    pub fn census(&self) -> SizeCensus {
        let mut census = SizeCensus::default();
        for (size, records) in &self.buckets {
            census.add(*size, records.len());
        }
        census
    }
}

impl FromIterator<FileRecord> for SizeBuckets {
    fn from_iter<I: IntoIterator<Item = FileRecord>>(iter: I) -> Self {
        let mut b = SizeBuckets::new();
        for r in iter {
            b.insert(r);
        }
        b
    }
}

/// How many files of each size exist across every tree taking part in a comparison.
///
/// A size counted once is a dead end: no other file anywhere can share its content, so it is
/// never hashed. Merging the reference census with the source census keeps a file that is unique
/// in its own tree but matches a file in the other tree in play.
#[derive(Debug, Default, Clone)]
pub struct SizeCensus {
    counts: HashMap<u64, usize>,
}

impl SizeCensus {
    pub fn add(&mut self, size: u64, n: usize) {
        *self.counts.entry(size).or_insert(0) += n;
    }

    pub fn merge(&mut self, other: &SizeCensus) {
        for (size, n) in &other.counts {
            self.add(*size, *n);
        }
    }

    pub fn merged(mut self, other: &SizeCensus) -> Self {
        self.merge(other);
        self
    }

    pub fn count(&self, size: u64) -> usize {
        self.counts.get(&size).copied().unwrap_or(0)
    }

    /// True when at least two files of this size exist.
    pub fn is_shared(&self, size: u64) -> bool {
        self.count(size) >= 2
    }
}

/// Content identity: equal size and equal prefix digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    pub size: u64,
    pub digest: Digest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedPath {
    pub ordinal: usize,
    pub path: PathBuf,
}

/// Fingerprint → paths of one tree, each list in discovery order.
#[derive(Debug, Default)]
pub struct FingerprintIndex {
    groups: HashMap<Fingerprint, Vec<IndexedPath>>,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a path; its position inside the group follows `ordinal`, not call order.
    pub fn insert(&mut self, fingerprint: Fingerprint, ordinal: usize, path: PathBuf) {
        let group = self.groups.entry(fingerprint).or_default();
        let pos = group.partition_point(|p| p.ordinal < ordinal);
        group.insert(pos, IndexedPath { ordinal, path });
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.groups.contains_key(fingerprint)
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&[IndexedPath]> {
        self.groups.get(fingerprint).map(Vec::as_slice)
    }

    /// Number of distinct fingerprints.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of indexed paths.
    pub fn path_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Groups ordered by the discovery ordinal of their first path.
    pub fn groups(&self) -> Vec<(&Fingerprint, &[IndexedPath])> {
        let mut out: Vec<_> = self
            .groups
            .iter()
            .map(|(fp, paths)| (fp, paths.as_slice()))
            .collect();
        out.sort_by_key(|(_, paths)| paths.first().map(|p| p.ordinal).unwrap_or(usize::MAX));
        out
    }

    /// The group a path belongs to, if it was indexed.
    pub fn fingerprint_of(&self, path: &Path) -> Option<&Fingerprint> {
        self.groups
            .iter()
            .find(|(_, paths)| paths.iter().any(|p| p.path == path))
            .map(|(fp, _)| fp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(path: &str, size: u64, ordinal: usize) -> FileRecord {
        FileRecord {
            path: PathBuf::from(path),
            size,
            ordinal,
        }
    }

    #[test]
    fn buckets_keep_discovery_order() {
        let b: SizeBuckets = [rec("c", 5, 2), rec("a", 5, 0), rec("b", 7, 1)]
            .into_iter()
            .collect();
        assert_eq!(b.len(), 3);
        let five: Vec<_> = b.bucket(5).unwrap().iter().map(|r| r.ordinal).collect();
        assert_eq!(five, vec![0, 2]);
    }

    #[test]
    fn census_merges_across_trees() {
        let reference: SizeBuckets = [rec("r", 5, 0)].into_iter().collect();
        let source: SizeBuckets = [rec("s", 5, 0), rec("t", 9, 1)].into_iter().collect();
        let census = reference.census().merged(&source.census());
        assert!(census.is_shared(5));
        assert!(!census.is_shared(9));
        assert_eq!(census.count(42), 0);
    }

    #[test]
    fn index_orders_by_ordinal_not_insertion() {
        let fp = Fingerprint {
            size: 1,
            digest: super::super::digest::Digester::new(Default::default()).finish(),
        };
        let mut idx = FingerprintIndex::new();
        idx.insert(fp.clone(), 3, "late".into());
        idx.insert(fp.clone(), 1, "early".into());
        let paths: Vec<_> = idx.get(&fp).unwrap().iter().map(|p| p.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("early"), PathBuf::from("late")]);
        assert_eq!(idx.path_count(), 2);
        assert_eq!(idx.fingerprint_of(Path::new("late")), Some(&fp));
    }
}
