//! XML configuration support.
//! - Loads settings from config.xml (quick_xml + serde).
//! - Creates a commented template if missing (unless AUDIO_DEDUPE_CONFIG is set).
//!
//! Notes:
//! - This module only reads/writes the config file; directory validation happens elsewhere.
//! - Unknown XML fields are a hard error so a typo never silently falls back to a default.

use anyhow::{bail, Context, Result};
use quick_xml::de::from_str as from_xml_str;
use serde::{Deserialize, Deserializer};
use std::env;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::paths::{default_config_path, path_has_symlink_ancestor, CONFIG_ENV_VAR};
use super::types::{Config, LogLevel};
use super::{
    DEFAULT_BLOCK_SIZE, DEFAULT_EXTENSIONS, DEFAULT_MAX_HASH_BYTES, DEFAULT_RETRIES,
    DEFAULT_RETRY_DELAY, DEFAULT_THREADS,
};
use crate::fingerprint::HashAlgorithm;
use crate::platform::{set_dir_mode_0700, set_file_mode_0600, write_config_secure_new_0600};

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    reference_dir: Option<String>,
    source_dir: Option<String>,
    output_dir: Option<String>,
    hash_algorithm: Option<String>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    block_size: Option<usize>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    max_hash_bytes: Option<u64>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    threads: Option<usize>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    dry_run: Option<bool>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    retries: Option<u32>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    retry_delay_ms: Option<u64>,
    /// Comma or whitespace separated list, e.g. "mp3, flac .wav"
    extensions: Option<String>,
    #[serde(default, deserialize_with = "de_trimmed_opt")]
    preserve_metadata: Option<bool>,
    log_level: Option<String>,
    log_file: Option<String>,
}

/// Parse an optional scalar, tolerating surrounding whitespace. Empty elements count as absent.
fn de_trimmed_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<T>().map(Some).map_err(serde::de::Error::custom),
    }
}

fn non_empty_path(s: Option<&str>) -> Option<PathBuf> {
    s.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(PathBuf::from)
}

/// Split an extension list on commas and whitespace.
pub(crate) fn split_extensions(s: &str) -> Vec<String> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

// Map XmlConfig -> Config, leaving defaults where the file is silent.
fn xml_to_config(parsed: XmlConfig) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(p) = non_empty_path(parsed.reference_dir.as_deref()) {
        cfg.reference_dir = p;
    }
    if let Some(p) = non_empty_path(parsed.source_dir.as_deref()) {
        cfg.source_dir = p;
    }
    if let Some(p) = non_empty_path(parsed.output_dir.as_deref()) {
        cfg.output_dir = p;
    }
    if let Some(p) = non_empty_path(parsed.log_file.as_deref()) {
        cfg.log_file = Some(p);
    }

    if let Some(s) = parsed.hash_algorithm.as_deref() {
        cfg.algorithm = s.trim().parse::<HashAlgorithm>()?;
    }
    if let Some(s) = parsed.log_level.as_deref() {
        cfg.log_level = s
            .trim()
            .parse::<LogLevel>()
            .map_err(anyhow::Error::msg)?;
    }
    if let Some(list) = parsed.extensions.as_deref() {
        let exts = split_extensions(list);
        if !exts.is_empty() {
            cfg.extensions = exts;
        }
    }

    cfg.block_size = parsed.block_size.unwrap_or(DEFAULT_BLOCK_SIZE);
    cfg.max_hash_bytes = parsed.max_hash_bytes.unwrap_or(DEFAULT_MAX_HASH_BYTES);
    cfg.threads = parsed.threads.unwrap_or(DEFAULT_THREADS);
    cfg.dry_run = parsed.dry_run.unwrap_or(false);
    cfg.retries = parsed.retries.unwrap_or(DEFAULT_RETRIES);
    cfg.retry_delay = parsed
        .retry_delay_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_RETRY_DELAY);
    cfg.preserve_metadata = parsed.preserve_metadata.unwrap_or(cfg.preserve_metadata);

    Ok(cfg)
}

/// Load a Config from a specific XML file path.
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig = from_xml_str(&contents)
        .with_context(|| format!("parse config xml '{}'; refusing to start", path.display()))?;
    xml_to_config(parsed).with_context(|| format!("invalid value in '{}'", path.display()))
}

/// Outcome of looking for the config file.
#[derive(Debug)]
pub enum LoadResult {
    Loaded { config: Config, path: PathBuf },
    /// No file at the default location and no template was requested.
    NotFound(PathBuf),
    /// A fresh template was written; the user should edit it and re-run.
    CreatedTemplate(PathBuf),
}

/// Locate and load the config file.
///
/// An explicit `AUDIO_DEDUPE_CONFIG` that points nowhere is an error. A missing file at the
/// default location yields a template when `create_template` is set.
pub fn load_or_init(create_template: bool) -> Result<LoadResult> {
    let path = default_config_path()?;
    if path.exists() {
        let config = load_config_from_xml_path(&path)?;
        return Ok(LoadResult::Loaded { config, path });
    }
    if env::var_os(CONFIG_ENV_VAR).is_some() {
        bail!(
            "{CONFIG_ENV_VAR} points to '{}', which does not exist",
            path.display()
        );
    }
    if !create_template {
        return Ok(LoadResult::NotFound(path));
    }
    create_template_config(&path)?;
    Ok(LoadResult::CreatedTemplate(path))
}

/// Create a default template config file and its parent directory (best-effort permissions).
pub fn create_template_config(path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        bail!(
            "Refusing to create config: ancestor of {} is a symlink",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
        let _ = set_dir_mode_0700(parent);
    }

    let content = format!(
        "<!--\n  audio_dedupe configuration (XML)\n\n    reference_dir      -> protected library; never modified\n    source_dir         -> tree to clean; duplicates are moved out of it\n    output_dir         -> where duplicates are moved (created if missing)\n    hash_algorithm     -> blake3 | xxh64 | sha256\n    block_size         -> bytes read per hashing step\n    max_hash_bytes     -> only this many leading bytes are hashed (speed/accuracy tradeoff)\n    threads            -> worker pool size\n    dry_run            -> true to only report what would be moved\n    retries            -> extra attempts for a failing move\n    retry_delay_ms     -> first backoff delay; doubles on each retry\n    extensions         -> comma separated list of audio extensions\n    preserve_metadata  -> keep timestamps/permissions when a move has to copy\n    log_level          -> quiet | normal | info | debug\n    log_file           -> log file path (empty: default location)\n\n  CLI flags override XML values.\n-->\n<config>\n  <reference_dir></reference_dir>\n  <source_dir></source_dir>\n  <output_dir></output_dir>\n  <hash_algorithm>blake3</hash_algorithm>\n  <block_size>{}</block_size>\n  <max_hash_bytes>{}</max_hash_bytes>\n  <threads>{}</threads>\n  <dry_run>false</dry_run>\n  <retries>{}</retries>\n  <retry_delay_ms>{}</retry_delay_ms>\n  <extensions>{}</extensions>\n  <preserve_metadata>true</preserve_metadata>\n  <log_level>normal</log_level>\n</config>\n",
        DEFAULT_BLOCK_SIZE,
        DEFAULT_MAX_HASH_BYTES,
        DEFAULT_THREADS,
        DEFAULT_RETRIES,
        DEFAULT_RETRY_DELAY.as_millis(),
        DEFAULT_EXTENSIONS.join(", "),
    );

    write_config_secure_new_0600(path, content.as_bytes())?;
    let _ = set_file_mode_0600(path);

    info!("Created template config at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn template_parses_back_with_defaults() {
        let td = tempdir().unwrap();
        let path = td.path().join("nested").join("config.xml");
        create_template_config(&path).unwrap();
        let cfg = load_config_from_xml_path(&path).unwrap();
        assert!(!cfg.has_directories());
        assert_eq!(cfg.threads, DEFAULT_THREADS);
        assert_eq!(cfg.algorithm, HashAlgorithm::Blake3);
        assert_eq!(cfg.extensions.len(), DEFAULT_EXTENSIONS.len());
    }

    #[test]
    fn split_extensions_accepts_mixed_separators() {
        assert_eq!(
            split_extensions("mp3, .FLAC  wav,,"),
            vec!["mp3".to_string(), ".FLAC".into(), "wav".into()]
        );
    }
}
