//! Relocation engine.
//!
//! Moves a batch of paths into one output directory, each path independently:
//! 1. claim a destination name (base name, then `_1`, `_2`, ... on collision);
//! 2. in dry-run mode report the move and stop;
//! 3. otherwise rename, falling back to copy-then-delete, with bounded exponential-backoff retries.
//!
//! Names are claimed for the whole batch in input order before any worker starts, so the names a
//! batch receives do not depend on scheduling and a dry run reports the same names a real run
//! would use. The moves themselves then run on the worker pool; one path failing never affects
//! another. An interrupt removes the placeholders of moves that have not started
//! (see [`abandon_pending_claims`]).

mod attempt;
mod helpers;
mod meta;
mod naming;
mod space;
mod transfer;

pub use attempt::{backoff_delay, drive, is_transient, transition, MoveState, RetryPolicy};
pub use helpers::io_error_with_help;
pub use naming::{abandon_pending_claims, ClaimRegistry, NameClaims, MAX_SUFFIX};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::debug;

use crate::errors::DedupeError;
use crate::events::{Event, EventSink};
use crate::progress::{NoProgress, Phase, ProgressReporter};

/// Move knobs, narrowed from `Config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveSettings {
    pub dry_run: bool,
    /// Extra attempts after the first failed one
    pub retries: u32,
    /// Delay before the first retry; doubles for each further retry
    pub retry_delay: Duration,
    pub preserve_metadata: bool,
}

impl MoveSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, self.retry_delay)
    }
}

/// How a successful move was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStrategy {
    /// Atomic rename on the same filesystem
    Rename,
    /// Copy into the output directory, then delete the source
    CopyDelete,
}

impl fmt::Display for MoveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MoveStrategy::Rename => "rename",
            MoveStrategy::CopyDelete => "copy+delete",
        })
    }
}

/// Per-path result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved {
        src: PathBuf,
        dest: PathBuf,
        strategy: MoveStrategy,
        attempts: u32,
    },
    DryRun {
        src: PathBuf,
        dest: PathBuf,
    },
    Failed {
        src: PathBuf,
        reason: String,
    },
}

impl MoveOutcome {
    pub fn src(&self) -> &Path {
        match self {
            MoveOutcome::Moved { src, .. }
            | MoveOutcome::DryRun { src, .. }
            | MoveOutcome::Failed { src, .. } => src,
        }
    }

    /// Final (or intended) destination; `None` for failures.
    pub fn dest(&self) -> Option<&Path> {
        match self {
            MoveOutcome::Moved { dest, .. } | MoveOutcome::DryRun { dest, .. } => Some(dest),
            MoveOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, MoveOutcome::Failed { .. })
    }
}

/// Outcomes of a batch, in input order.
#[derive(Debug, Default, Clone)]
pub struct RelocationReport {
    pub outcomes: Vec<MoveOutcome>,
}

impl RelocationReport {
    pub fn moved(&self) -> usize {
        self.count(|o| matches!(o, MoveOutcome::Moved { .. }))
    }

    pub fn simulated(&self) -> usize {
        self.count(|o| matches!(o, MoveOutcome::DryRun { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(MoveOutcome::is_failure)
    }

    fn count(&self, pred: impl Fn(&MoveOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// Moves files into one output directory.
pub struct Relocator<'a> {
    output_dir: &'a Path,
    settings: MoveSettings,
    sink: &'a dyn EventSink,
    claims: NameClaims,
    progress: &'a dyn ProgressReporter,
}

impl<'a> Relocator<'a> {
    pub fn new(output_dir: &'a Path, settings: MoveSettings, sink: &'a dyn EventSink) -> Self {
        Self {
            output_dir,
            settings,
            sink,
            claims: NameClaims::new(settings.dry_run),
            progress: &NoProgress,
        }
    }

    /// Report each finished path to `progress`.
    pub fn with_progress(mut self, progress: &'a dyn ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Relocate every path on `pool` and wait for all of them.
    pub fn relocate_all(&self, paths: &[PathBuf], pool: &ThreadPool) -> RelocationReport {
        if paths.is_empty() {
            return RelocationReport::default();
        }
        self.progress.add_work(Phase::Moving, paths.len() as u64);
        let planned: Vec<(PathBuf, Result<PathBuf>)> = match self.prepare_output() {
            Ok(()) => paths.iter().map(|p| (p.clone(), self.claim_for(p))).collect(),
            Err(e) => {
                let reason = format!("{e:#}");
                paths
                    .iter()
                    .map(|p| (p.clone(), Err(anyhow!(reason.clone()))))
                    .collect()
            }
        };

        let outcomes = pool.install(|| {
            planned
                .into_par_iter()
                .map(|(src, dest)| {
                    let outcome = self.finish(src, dest);
                    self.progress.advance(Phase::Moving);
                    outcome
                })
                .collect()
        });
        let report = RelocationReport { outcomes };
        debug!(
            moved = report.moved(),
            simulated = report.simulated(),
            failed = report.failed(),
            "relocation finished"
        );
        report
    }

    /// Relocate a single path on the calling thread.
    pub fn relocate_one(&self, src: &Path) -> MoveOutcome {
        self.progress.add_work(Phase::Moving, 1);
        let dest = self.prepare_output().and_then(|()| self.claim_for(src));
        let outcome = self.finish(src.to_path_buf(), dest);
        self.progress.advance(Phase::Moving);
        outcome
    }

    fn prepare_output(&self) -> Result<()> {
        if self.settings.dry_run {
            return Ok(());
        }
        fs::create_dir_all(self.output_dir)
            .map_err(io_error_with_help("create output directory", self.output_dir))?;
        Ok(())
    }

    fn claim_for(&self, src: &Path) -> Result<PathBuf> {
        let name = src
            .file_name()
            .ok_or_else(|| anyhow!("'{}' has no file name", src.display()))?;
        self.claims.claim(self.output_dir, name)
    }

    fn finish(&self, src: PathBuf, dest: Result<PathBuf>) -> MoveOutcome {
        let dest = match dest {
            Ok(d) => d,
            Err(e) => return self.fail(src, format!("{e:#}")),
        };

        if self.settings.dry_run {
            self.sink.emit(&Event::WouldMove {
                src: src.clone(),
                dest: dest.clone(),
            });
            return MoveOutcome::DryRun { src, dest };
        }

        if !self.claims.begin_move(&dest) {
            return self.fail(src, "interrupted before the move started".into());
        }

        let policy = self.settings.retry_policy();
        let end = drive(
            &policy,
            |_| transfer::move_once(&src, &dest, self.settings.preserve_metadata),
            |attempt, delay, error| {
                self.sink.emit(&Event::MoveRetry {
                    path: src.clone(),
                    attempt,
                    max_attempts: policy.max_attempts,
                    delay,
                    error: error.to_string(),
                })
            },
            std::thread::sleep,
        );

        let (strategy, attempts) = match end {
            MoveState::Succeeded { attempts } => (MoveStrategy::Rename, attempts),
            MoveState::FallbackSucceeded { attempts } => (MoveStrategy::CopyDelete, attempts),
            MoveState::ExhaustedFailed { attempts, error } => {
                self.claims.release(&dest);
                let err = DedupeError::MoveFailed {
                    path: src.clone(),
                    attempts,
                    reason: error.to_string(),
                };
                return self.fail(src, err.to_string());
            }
            MoveState::Attempting { .. } | MoveState::Retrying { .. } => {
                unreachable!("drive only returns terminal states")
            }
        };

        self.sink.emit(&Event::Moved {
            src: src.clone(),
            dest: dest.clone(),
            strategy,
        });
        MoveOutcome::Moved {
            src,
            dest,
            strategy,
            attempts,
        }
    }

    fn fail(&self, src: PathBuf, error: String) -> MoveOutcome {
        self.sink.emit(&Event::MoveFailed {
            path: src.clone(),
            error: error.clone(),
        });
        MoveOutcome::Failed { src, reason: error }
    }
}

/// Convenience wrapper: relocate `paths` into `output_dir`.
pub fn relocate_all(
    paths: &[PathBuf],
    output_dir: &Path,
    settings: MoveSettings,
    pool: &ThreadPool,
    sink: &dyn EventSink,
) -> RelocationReport {
    Relocator::new(output_dir, settings, sink).relocate_all(paths, pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Level, MemorySink};
    use tempfile::tempdir;

    fn settings(dry_run: bool) -> MoveSettings {
        MoveSettings {
            dry_run,
            retries: 1,
            retry_delay: Duration::from_millis(1),
            preserve_metadata: true,
        }
    }

    fn pool() -> ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap()
    }

    #[test]
    fn same_names_get_distinct_destinations_in_input_order() {
        let td = tempdir().unwrap();
        let out = td.path().join("out");
        let mut paths = Vec::new();
        for d in ["a", "b", "c"] {
            let dir = td.path().join(d);
            fs::create_dir_all(&dir).unwrap();
            let p = dir.join("song.mp3");
            fs::write(&p, d).unwrap();
            paths.push(p);
        }

        let sink = MemorySink::new();
        let report = relocate_all(&paths, &out, settings(false), &pool(), &sink);

        assert_eq!(report.moved(), 3);
        let dests: Vec<_> = report.outcomes.iter().map(|o| o.dest().unwrap().to_path_buf()).collect();
        assert_eq!(
            dests,
            vec![out.join("song.mp3"), out.join("song_1.mp3"), out.join("song_2.mp3")]
        );
        assert_eq!(fs::read(out.join("song_1.mp3")).unwrap(), b"b");
        assert!(paths.iter().all(|p| !p.exists()));
    }

    #[test]
    fn dry_run_touches_nothing() {
        let td = tempdir().unwrap();
        let src = td.path().join("x.wav");
        fs::write(&src, b"x").unwrap();
        let out = td.path().join("never");

        let sink = MemorySink::new();
        let report = relocate_all(&[src.clone()], &out, settings(true), &pool(), &sink);

        assert_eq!(report.simulated(), 1);
        assert!(src.exists());
        assert!(!out.exists());
        assert!(sink.events().iter().any(|e| e.to_string().starts_with("[Dry Run] Would move:")));
    }

    #[test]
    fn one_failure_does_not_stop_the_batch() {
        let td = tempdir().unwrap();
        let good = td.path().join("good.flac");
        fs::write(&good, b"g").unwrap();
        let gone = td.path().join("gone.flac");
        let out = td.path().join("out");

        let sink = MemorySink::new();
        let report = relocate_all(&[gone.clone(), good.clone()], &out, settings(false), &pool(), &sink);

        assert_eq!(report.failed(), 1);
        assert_eq!(report.moved(), 1);
        assert!(report.outcomes[0].is_failure());
        assert!(out.join("good.flac").exists());
        // the failed path's reserved name is handed back
        assert!(!out.join("gone.flac").exists());
        assert_eq!(sink.count_level(Level::Error), 1);
    }

    #[test]
    fn relocate_one_moves_a_single_file() {
        let td = tempdir().unwrap();
        let src = td.path().join("one.ogg");
        fs::write(&src, b"1").unwrap();
        let out = td.path().join("nested/out");
        let sink = MemorySink::new();
        let outcome = Relocator::new(&out, settings(false), &sink).relocate_one(&src);
        assert!(matches!(
            outcome,
            MoveOutcome::Moved { strategy: MoveStrategy::Rename, attempts: 1, .. }
        ));
        assert!(out.join("one.ogg").exists());
    }
}
