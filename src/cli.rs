//! CLI definition and parsing.
//!
//! Notes:
//! - Every flag is optional; unset flags leave the XML/default value alone.
//! - --debug is a shorthand for --log-level debug.
//! - --extensions accepts repeats and comma lists (`--extensions mp3,flac --extensions wav`).

use clap::{Parser, ValueHint};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::xml::split_extensions;
use crate::config::{Config, LogLevel};
use crate::fingerprint::HashAlgorithm;

/// Move duplicate audio files out of a source tree.
/// CLI flags override config values (which are loaded from XML if present).
#[derive(Parser, Debug, Clone, Default)]
#[command(
    author,
    version,
    about = "Find duplicate audio files against a protected reference library and move the extra copies out"
)]
pub struct Args {
    /// Protected reference library (never modified).
    #[arg(long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub reference: Option<PathBuf>,

    /// Tree to clean up.
    #[arg(long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub source: Option<PathBuf>,

    /// Where duplicates are moved (created if missing).
    #[arg(long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Fingerprint digest: blake3, xxh64 or sha256.
    #[arg(long, value_name = "NAME")]
    pub algorithm: Option<HashAlgorithm>,

    /// Bytes read per hashing step.
    #[arg(long, value_name = "BYTES")]
    pub block_size: Option<usize>,

    /// Only this many leading bytes of each file are hashed.
    #[arg(long, value_name = "BYTES")]
    pub max_hash_bytes: Option<u64>,

    /// Worker pool size.
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Report what would be moved without touching the filesystem.
    #[arg(long)]
    pub dry_run: bool,

    /// Extra attempts for a failing move.
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Delay before the first retry, in milliseconds; doubles for each further retry.
    #[arg(long, value_name = "MS")]
    pub retry_delay_ms: Option<u64>,

    /// Audio extensions to consider (repeatable or comma separated).
    #[arg(long, value_name = "EXT", num_args = 1.., action = clap::ArgAction::Append)]
    pub extensions: Vec<String>,

    /// Keep timestamps and permissions when a move has to copy (true/false).
    #[arg(long, value_name = "BOOL")]
    pub preserve_metadata: Option<bool>,

    /// Set log level: quiet, normal, info, debug.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Enable debug logging (shorthand for --log-level debug).
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Also write logs to this file.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Emit logs in structured JSON.
    #[arg(long)]
    pub json: bool,

    /// Print the config file location and exit.
    #[arg(long)]
    pub print_config: bool,
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config value).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// True when all three directories were given on the command line.
    pub fn names_all_directories(&self) -> bool {
        self.reference.is_some() && self.source.is_some() && self.output.is_some()
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(p) = &self.reference {
            cfg.reference_dir = p.clone();
        }
        if let Some(p) = &self.source {
            cfg.source_dir = p.clone();
        }
        if let Some(p) = &self.output {
            cfg.output_dir = p.clone();
        }
        if let Some(a) = self.algorithm {
            cfg.algorithm = a;
        }
        if let Some(n) = self.block_size {
            cfg.block_size = n;
        }
        if let Some(n) = self.max_hash_bytes {
            cfg.max_hash_bytes = n;
        }
        if let Some(n) = self.threads {
            cfg.threads = n;
        }
        if self.dry_run {
            cfg.dry_run = true;
        }
        if let Some(n) = self.retries {
            cfg.retries = n;
        }
        if let Some(ms) = self.retry_delay_ms {
            cfg.retry_delay = Duration::from_millis(ms);
        }
        let exts: Vec<String> = self.extensions.iter().flat_map(|e| split_extensions(e)).collect();
        if !exts.is_empty() {
            cfg.extensions = exts;
        }
        if let Some(b) = self.preserve_metadata {
            cfg.preserve_metadata = b;
        }
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if let Some(p) = &self.log_file {
            cfg.log_file = Some(p.clone());
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
