//! Core library for `audio_dedupe`.
//!
//! Finds audio files in a source tree that duplicate a protected reference tree (or each other)
//! and moves the redundant copies into an output directory.
//!
//! Stages, in order: [`scan`] → [`fingerprint`] → [`resolve`] → [`relocate`], driven by
//! [`pipeline::run`]. Every stage reports through an injected [`events::EventSink`].

pub mod cli;
pub mod config;
pub mod errors;
pub mod events;
pub mod fingerprint;
pub mod output;
pub mod pipeline;
pub mod platform;
pub mod progress;
pub mod relocate;
pub mod resolve;
pub mod scan;

pub use config::{
    default_config_path, default_log_path, load_config_from_xml_path, path_has_symlink_ancestor,
    validate_and_normalize, Config, LogLevel, CONFIG_ENV_VAR,
};
pub use errors::DedupeError;
pub use events::{Event, EventSink, Level, MemorySink, NullSink, TracingSink};
pub use fingerprint::{FingerprintEngine, FingerprintIndex, HashAlgorithm, HashSettings};
pub use pipeline::{run, run_detailed, run_with_progress, RunReport, RunSummary};
pub use progress::{NoProgress, Phase, ProgressBars, ProgressReporter};
pub use relocate::{relocate_all, MoveOutcome, MoveSettings, MoveStrategy, RelocationReport, Relocator};
pub use resolve::{resolve, DuplicateReason, DuplicateSet};
pub use scan::scan;
