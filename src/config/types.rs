//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::paths::default_log_path;
use super::{
    DEFAULT_BLOCK_SIZE, DEFAULT_EXTENSIONS, DEFAULT_MAX_HASH_BYTES, DEFAULT_RETRIES,
    DEFAULT_RETRY_DELAY, DEFAULT_THREADS,
};
use crate::fingerprint::{HashAlgorithm, HashSettings};
use crate::relocate::MoveSettings;

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// More info (like verbose)
    Info,
    /// Debug/trace
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Runtime configuration. Built once at startup, validated, then only borrowed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Protected library; scanned and hashed, never written to
    pub reference_dir: PathBuf,
    /// Tree to clean up
    pub source_dir: PathBuf,
    /// Where redundant copies are moved
    pub output_dir: PathBuf,
    /// Digest used for fingerprints
    pub algorithm: HashAlgorithm,
    /// Read size per hashing step
    pub block_size: usize,
    /// Only this many leading bytes of a file are hashed
    pub max_hash_bytes: u64,
    /// Worker pool size for hashing and moving
    pub threads: usize,
    /// If true, report intended moves but do not touch the filesystem
    pub dry_run: bool,
    /// Extra attempts after the first failed move
    pub retries: u32,
    /// Base delay for exponential backoff between move attempts
    pub retry_delay: Duration,
    /// Lowercase extensions without the leading dot
    pub extensions: Vec<String>,
    /// Keep timestamps and permissions when a move has to copy
    pub preserve_metadata: bool,
    /// Console verbosity
    pub log_level: LogLevel,
    /// Log file; defaults to the platform data dir
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reference_dir: PathBuf::new(),
            source_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            algorithm: HashAlgorithm::default(),
            block_size: DEFAULT_BLOCK_SIZE,
            max_hash_bytes: DEFAULT_MAX_HASH_BYTES,
            threads: DEFAULT_THREADS,
            dry_run: false,
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            preserve_metadata: true,
            log_level: LogLevel::Normal,
            // Always log to a file unless told otherwise; None only when no data dir can be found.
            log_file: default_log_path().ok(),
        }
    }
}

impl Config {
    /// Construct a Config with explicit directories; other fields use defaults.
    pub fn new(
        reference_dir: impl Into<PathBuf>,
        source_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            reference_dir: reference_dir.into(),
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    /// True once all three directories have been given a value.
    pub fn has_directories(&self) -> bool {
        !self.reference_dir.as_os_str().is_empty()
            && !self.source_dir.as_os_str().is_empty()
            && !self.output_dir.as_os_str().is_empty()
    }

    pub fn hash_settings(&self) -> HashSettings {
        HashSettings {
            algorithm: self.algorithm,
            block_size: self.block_size,
            max_hash_bytes: self.max_hash_bytes,
        }
    }

    pub fn move_settings(&self) -> MoveSettings {
        MoveSettings {
            dry_run: self.dry_run,
            retries: self.retries,
            retry_delay: self.retry_delay,
            preserve_metadata: self.preserve_metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_values() {
        let cfg = Config::default();
        assert_eq!(cfg.threads, 8);
        assert_eq!(cfg.block_size, 65536);
        assert_eq!(cfg.max_hash_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.retries, 3);
        assert_eq!(cfg.retry_delay, Duration::from_secs(1));
        assert!(cfg.extensions.iter().any(|e| e == "aiff"));
        assert!(!cfg.dry_run);
        assert!(!cfg.has_directories());
    }

    #[test]
    fn logs_to_the_default_file_unless_configured() {
        let cfg = Config::default();
        assert_eq!(cfg.log_file, default_log_path().ok());
        assert!(cfg.log_file.is_some());
        assert_eq!(Config::new("/r", "/s", "/o").log_file, cfg.log_file);
    }

    #[test]
    fn log_level_round_trips_through_display() {
        for lvl in [LogLevel::Quiet, LogLevel::Normal, LogLevel::Info, LogLevel::Debug] {
            assert_eq!(lvl.to_string().parse::<LogLevel>().unwrap(), lvl);
        }
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn narrowed_settings_carry_values() {
        let mut cfg = Config::new("/r", "/s", "/o");
        cfg.max_hash_bytes = 42;
        cfg.retries = 7;
        cfg.dry_run = true;
        assert_eq!(cfg.hash_settings().max_hash_bytes, 42);
        let mv = cfg.move_settings();
        assert_eq!(mv.retries, 7);
        assert!(mv.dry_run);
    }
}
