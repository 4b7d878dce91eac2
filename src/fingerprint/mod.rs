//! Fingerprinting engine.
//!
//! Two phases keep expensive reads bounded:
//! 1. size probe: every candidate is stat'ed and bucketed by exact byte size;
//! 2. bounded hashing: only records whose size occurs at least twice in the census are hashed.
//!
//! Unreadable files are reported and dropped. A file that cannot be probed or hashed is treated
//! as unique and never as a duplicate.

mod digest;
mod index;

pub use digest::{hash_prefix, Digest, Digester, HashAlgorithm};
pub use index::{FileRecord, Fingerprint, FingerprintIndex, IndexedPath, SizeBuckets, SizeCensus};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::debug;

use crate::events::{Event, EventSink};
use crate::progress::{NoProgress, Phase, ProgressReporter};

/// Hashing knobs, narrowed from `Config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashSettings {
    pub algorithm: HashAlgorithm,
    pub block_size: usize,
    pub max_hash_bytes: u64,
}

/// Result of the size probe for one tree.
#[derive(Debug, Default)]
pub struct ProbeOutcome {
    pub buckets: SizeBuckets,
    /// Candidates whose size could not be read
    pub failed: usize,
}

/// Result of hashing one tree.
#[derive(Debug, Default)]
pub struct IndexOutcome {
    pub index: FingerprintIndex,
    /// Files that were actually read
    pub hashed: usize,
    /// Files whose hash could not be computed
    pub failed: usize,
}

/// Runs size probes and prefix hashing on a shared worker pool.
pub struct FingerprintEngine<'a> {
    settings: HashSettings,
    pool: &'a ThreadPool,
    sink: &'a dyn EventSink,
    progress: &'a dyn ProgressReporter,
}

impl<'a> FingerprintEngine<'a> {
    pub fn new(settings: HashSettings, pool: &'a ThreadPool, sink: &'a dyn EventSink) -> Self {
        Self {
            settings,
            pool,
            sink,
            progress: &NoProgress,
        }
    }

    /// Report each probed and hashed file to `progress`.
    pub fn with_progress(mut self, progress: &'a dyn ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Stat every path and bucket it by size. The position of a path in `paths` becomes its
    /// ordinal, so discovery order is fixed here, before any concurrent work starts.
    pub fn probe_sizes(&self, paths: &[PathBuf]) -> ProbeOutcome {
        self.progress.add_work(Phase::Sizes, paths.len() as u64);
        let sizes: Vec<io::Result<u64>> = self.pool.install(|| {
            paths
                .par_iter()
                .map(|p| {
                    let size = file_size(p);
                    self.progress.advance(Phase::Sizes);
                    size
                })
                .collect()
        });

        let mut out = ProbeOutcome::default();
        for (ordinal, (path, size)) in paths.iter().zip(sizes).enumerate() {
            match size {
                Ok(size) => out.buckets.insert(FileRecord {
                    path: path.clone(),
                    size,
                    ordinal,
                }),
                Err(e) => {
                    out.failed += 1;
                    self.sink.emit(&Event::SizeProbeFailed {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        debug!(
            records = out.buckets.len(),
            failed = out.failed,
            "size probe finished"
        );
        out
    }

    /// Hash every record whose size is shared according to `census` and build the index.
    ///
    /// Pass the census of every tree taking part in the comparison; records of a size that
    /// appears only once overall are skipped without being opened.
    pub fn index(&self, buckets: &SizeBuckets, census: &SizeCensus) -> IndexOutcome {
        let candidates: Vec<&FileRecord> = buckets
            .iter()
            .filter(|(size, _)| census.is_shared(*size))
            .flat_map(|(_, records)| records.iter())
            .collect();

        let settings = self.settings;
        self.progress.add_work(Phase::Hashing, candidates.len() as u64);
        let digests: Vec<(&FileRecord, io::Result<Digest>)> = self.pool.install(|| {
            candidates
                .par_iter()
                .map(|r| {
                    let digest = hash_prefix(&r.path, &settings);
                    self.progress.advance(Phase::Hashing);
                    (*r, digest)
                })
                .collect()
        });

        let mut out = IndexOutcome::default();
        for (record, digest) in digests {
            match digest {
                Ok(digest) => {
                    out.hashed += 1;
                    out.index.insert(
                        Fingerprint {
                            size: record.size,
                            digest,
                        },
                        record.ordinal,
                        record.path.clone(),
                    );
                }
                Err(e) => {
                    out.failed += 1;
                    self.sink.emit(&Event::HashFailed {
                        path: record.path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        debug!(
            hashed = out.hashed,
            failed = out.failed,
            groups = out.index.len(),
            skipped = buckets.len() - candidates.len(),
            "hashing finished"
        );
        out
    }

    /// Probe and index a single tree on its own.
    pub fn fingerprint(&self, paths: &[PathBuf]) -> IndexOutcome {
        let probe = self.probe_sizes(paths);
        let census = probe.buckets.census();
        let mut out = self.index(&probe.buckets, &census);
        out.failed += probe.failed;
        out
    }
}

fn file_size(path: &Path) -> io::Result<u64> {
    let meta = fs::metadata(path)?;
    if !meta.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }
    Ok(meta.len())
}
