//! End-to-end run: scan both trees, fingerprint, resolve, relocate.
//!
//! Each stage consumes its whole input before the next one starts. Only root problems abort a
//! run; every per-file problem is reported through the sink and the run carries on.

use anyhow::{Context, Result};
use rayon::ThreadPool;
use tracing::debug;

use crate::config::{check_roots, normalize_extensions, Config};
use crate::events::{Event, EventSink};
use crate::fingerprint::FingerprintEngine;
use crate::progress::{NoProgress, Phase, ProgressReporter};
use crate::relocate::{RelocationReport, Relocator};
use crate::resolve::{resolve, DuplicateSet};
use crate::scan::scan;

/// End-of-run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub reference_files: usize,
    pub source_files: usize,
    /// Files whose prefix was read and hashed, both trees
    pub hashed: usize,
    /// Files dropped because their size or hash could not be read
    pub probe_failures: usize,
    pub duplicates: usize,
    pub moved: usize,
    pub simulated: usize,
    pub move_failures: usize,
}

impl RunSummary {
    /// True when every selected duplicate was moved (or simulated).
    pub fn is_clean(&self) -> bool {
        self.move_failures == 0
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub summary: RunSummary,
    pub duplicates: DuplicateSet,
    pub relocation: RelocationReport,
}

/// Build the worker pool shared by hashing and moving.
pub fn build_pool(threads: usize) -> Result<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("dedupe-worker-{i}"))
        .build()
        .context("build worker pool")
}

/// Run the whole pipeline and return the counters.
pub fn run(cfg: &Config, sink: &dyn EventSink) -> Result<RunSummary> {
    run_detailed(cfg, sink).map(|report| report.summary)
}

/// Run the whole pipeline and keep the per-path results.
pub fn run_detailed(cfg: &Config, sink: &dyn EventSink) -> Result<RunReport> {
    run_with_progress(cfg, sink, &NoProgress)
}

/// Like [`run_detailed`], reporting each probed, hashed and moved file to `progress`.
pub fn run_with_progress(
    cfg: &Config,
    sink: &dyn EventSink,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    check_roots(cfg)?;
    let pool = build_pool(cfg.threads)?;
    // Accept ".MP3" as well as "mp3" when the config did not go through validation.
    let extensions = normalize_extensions(&cfg.extensions);

    stage(sink, "start", format!("Output folder: {}", cfg.output_dir.display()));
    if cfg.dry_run {
        stage(sink, "start", "DRY RUN MODE ENABLED - No files will be moved".into());
    }

    stage(sink, "scan", "Scanning reference folder...".into());
    let reference_paths = scan(&cfg.reference_dir, &extensions, sink);
    stage(
        sink,
        "scan",
        format!("Found {} audio files in {}", reference_paths.len(), cfg.reference_dir.display()),
    );

    stage(sink, "scan", "Scanning source folder...".into());
    let mut source_paths = scan(&cfg.source_dir, &extensions, sink);
    // An output directory nested in the source tree holds files moved by earlier runs.
    source_paths.retain(|p| !p.starts_with(&cfg.output_dir));
    stage(
        sink,
        "scan",
        format!("Found {} audio files in {}", source_paths.len(), cfg.source_dir.display()),
    );

    let engine = FingerprintEngine::new(cfg.hash_settings(), &pool, sink).with_progress(progress);
    stage(sink, "size", "Collecting file sizes...".into());
    let reference_probe = engine.probe_sizes(&reference_paths);
    let source_probe = engine.probe_sizes(&source_paths);
    let census = reference_probe
        .buckets
        .census()
        .merged(&source_probe.buckets.census());
    progress.finish(Phase::Sizes);

    stage(sink, "hash", "Computing hashes...".into());
    let reference_index = engine.index(&reference_probe.buckets, &census);
    let source_index = engine.index(&source_probe.buckets, &census);
    let hashed = reference_index.hashed + source_index.hashed;
    progress.finish(Phase::Hashing);
    stage(sink, "hash", format!("Hashed {hashed} potential duplicates"));

    stage(sink, "resolve", "Identifying duplicates...".into());
    let duplicates = resolve(&reference_index.index, &source_index.index);
    for dup in &duplicates {
        sink.emit(&Event::DuplicateSelected {
            path: dup.path.clone(),
            reason: dup.reason.to_string(),
        });
    }
    stage(sink, "resolve", format!("Identified {} duplicate files", duplicates.len()));

    let relocation = if duplicates.is_empty() {
        stage(sink, "move", "No duplicates found to move".into());
        RelocationReport::default()
    } else {
        stage(sink, "move", "Initiating file move process...".into());
        let report = Relocator::new(&cfg.output_dir, cfg.move_settings(), sink)
            .with_progress(progress)
            .relocate_all(&duplicates.paths(), &pool);
        progress.finish(Phase::Moving);
        report
    };

    let summary = RunSummary {
        reference_files: reference_paths.len(),
        source_files: source_paths.len(),
        hashed,
        probe_failures: reference_probe.failed
            + source_probe.failed
            + reference_index.failed
            + source_index.failed,
        duplicates: duplicates.len(),
        moved: relocation.moved(),
        simulated: relocation.simulated(),
        move_failures: relocation.failed(),
    };
    debug!(?summary, "run finished");
    sink.emit(&Event::Summary(summary.clone()));

    Ok(RunReport {
        summary,
        duplicates,
        relocation,
    })
}

fn stage(sink: &dyn EventSink, stage: &'static str, message: String) {
    sink.emit(&Event::Stage { stage, message });
}
