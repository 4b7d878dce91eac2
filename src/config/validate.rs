//! Config validation logic.
//! Runs once at startup, before anything is written: roots must exist, numeric knobs must be
//! usable and the three directories must not overlap in ways that would endanger the reference.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use super::types::Config;
use crate::errors::DedupeError;

/// Validate the configuration and normalize paths and extensions in place.
///
/// Fatal problems come back as `DedupeError` (downcastable from the anyhow error):
/// a missing reference or source root is reported with its role before any mutation.
/// The output directory is created unless this is a dry run.
pub fn validate_and_normalize(cfg: &mut Config) -> Result<()> {
    check_roots(cfg)?;

    check_knobs(cfg)?;
    cfg.extensions = normalize_extensions(&cfg.extensions);
    if cfg.extensions.is_empty() {
        return Err(DedupeError::InvalidConfig("no audio extensions configured".into()).into());
    }

    cfg.reference_dir = dunce::canonicalize(&cfg.reference_dir)
        .with_context(|| format!("canonicalize reference '{}'", cfg.reference_dir.display()))?;
    cfg.source_dir = dunce::canonicalize(&cfg.source_dir)
        .with_context(|| format!("canonicalize source '{}'", cfg.source_dir.display()))?;

    let (reference, source) = (&cfg.reference_dir, &cfg.source_dir);
    if reference == source {
        return Err(DedupeError::InvalidConfig(format!(
            "reference and source resolve to the same path: '{}'",
            reference.display()
        ))
        .into());
    }
    if reference.starts_with(source) || source.starts_with(reference) {
        return Err(DedupeError::InvalidConfig(format!(
            "reference '{}' and source '{}' must not be nested inside each other",
            reference.display(),
            source.display()
        ))
        .into());
    }

    if cfg.output_dir.as_os_str().is_empty() {
        return Err(DedupeError::InvalidConfig("output directory is not set".into()).into());
    }
    // Checked before ensure_output so a bad output path never creates anything in the reference.
    if resolve_through_existing(&cfg.output_dir)?.starts_with(&cfg.reference_dir) {
        return Err(DedupeError::InvalidConfig(format!(
            "output '{}' must not be inside the reference directory '{}'",
            cfg.output_dir.display(),
            cfg.reference_dir.display()
        ))
        .into());
    }
    ensure_output(cfg)?;

    info!(
        reference = %cfg.reference_dir.display(),
        source = %cfg.source_dir.display(),
        output = %cfg.output_dir.display(),
        algorithm = %cfg.algorithm,
        threads = cfg.threads,
        dry_run = cfg.dry_run,
        "Config validated"
    );
    Ok(())
}

/// Re-check that both roots are still usable directories. Cheap; runs before any mutation.
pub fn check_roots(cfg: &Config) -> Result<()> {
    ensure_root(&cfg.reference_dir, "reference")?;
    ensure_root(&cfg.source_dir, "source")
}

/// Lowercase, strip a leading dot, drop empties and duplicates (first occurrence wins).
pub fn normalize_extensions(exts: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(exts.len());
    for e in exts {
        let norm = e.trim().trim_start_matches('.').to_ascii_lowercase();
        if !norm.is_empty() && !out.contains(&norm) {
            out.push(norm);
        }
    }
    out
}

fn ensure_root(path: &Path, role: &'static str) -> Result<()> {
    if path.as_os_str().is_empty() || !path.exists() {
        error!("{role} directory does not exist: {}", path.display());
        return Err(DedupeError::RootMissing {
            role,
            path: path.to_path_buf(),
        }
        .into());
    }
    if !path.is_dir() {
        error!("{role} path is not a directory: {}", path.display());
        return Err(DedupeError::RootNotDirectory {
            role,
            path: path.to_path_buf(),
        }
        .into());
    }
    fs::read_dir(path).with_context(|| {
        format!("Cannot read {role} directory '{}'; check permissions", path.display())
    })?;
    debug!("{role} readable: {}", path.display());
    Ok(())
}

fn check_knobs(cfg: &Config) -> Result<()> {
    let bad = if cfg.threads == 0 {
        Some("threads must be at least 1")
    } else if cfg.block_size == 0 {
        Some("block_size must be at least 1 byte")
    } else if cfg.max_hash_bytes == 0 {
        Some("max_hash_bytes must be at least 1 byte")
    } else {
        None
    };
    match bad {
        Some(msg) => Err(DedupeError::InvalidConfig(msg.into()).into()),
        None => Ok(()),
    }
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the rest.
fn resolve_through_existing(path: &Path) -> Result<PathBuf> {
    let abs = if path.is_relative() {
        std::env::current_dir()?.join(path)
    } else {
        path.to_path_buf()
    };
    let mut rest = Vec::new();
    let mut cur = abs.as_path();
    while !cur.exists() {
        match (cur.parent(), cur.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                cur = parent;
            }
            _ => return Ok(abs),
        }
    }
    let mut resolved = dunce::canonicalize(cur)
        .with_context(|| format!("canonicalize '{}'", cur.display()))?;
    resolved.extend(rest.iter().rev());
    Ok(resolved)
}

/// Output must be a directory. Created (with parents) on real runs; only inspected on dry runs.
fn ensure_output(cfg: &mut Config) -> Result<()> {
    let out = &cfg.output_dir;
    if out.exists() {
        if !out.is_dir() {
            error!("output exists but isn't a directory: {}", out.display());
            return Err(DedupeError::RootNotDirectory {
                role: "output",
                path: out.clone(),
            }
            .into());
        }
    } else if cfg.dry_run {
        info!("dry-run: output directory would be created: {}", out.display());
    } else {
        fs::create_dir_all(out)
            .with_context(|| format!("Failed to create output directory '{}'", out.display()))?;
        info!("Created output directory: {}", out.display());
    }

    if out.exists() {
        cfg.output_dir = dunce::canonicalize(&cfg.output_dir)
            .with_context(|| format!("canonicalize output '{}'", cfg.output_dir.display()))?;
    } else if let Ok(cwd) = std::env::current_dir() {
        if cfg.output_dir.is_relative() {
            cfg.output_dir = cwd.join(&cfg.output_dir);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_normalized() {
        let raw: Vec<String> = vec![".MP3".into(), "flac".into(), "mp3".into(), " ".into()];
        assert_eq!(normalize_extensions(&raw), vec!["mp3".to_string(), "flac".into()]);
    }

    #[test]
    fn missing_reference_is_reported_before_source() {
        let td = tempfile::tempdir().unwrap();
        let cfg = Config::new(td.path().join("nope"), td.path().join("also-nope"), td.path());
        let err = check_roots(&cfg).unwrap_err();
        match err.downcast_ref::<DedupeError>() {
            Some(DedupeError::RootMissing { role, .. }) => assert_eq!(*role, "reference"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_tail_is_resolved_against_existing_ancestor() {
        let td = tempfile::tempdir().unwrap();
        let base = dunce::canonicalize(td.path()).unwrap();
        let got = resolve_through_existing(&td.path().join("a/b")).unwrap();
        assert_eq!(got, base.join("a").join("b"));
    }

    #[test]
    fn zero_threads_rejected() {
        let mut cfg = Config::new("/r", "/s", "/o");
        cfg.threads = 0;
        let err = check_knobs(&cfg).unwrap_err();
        assert!(err.to_string().contains("threads"));
    }
}
