//! Default path helpers and symlink checks.
//! Determines OS-appropriate config/log paths and detects symlinked ancestors for safety.

use anyhow::{anyhow, Result};
use dirs::{config_dir, data_dir};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "AUDIO_DEDUPE_CONFIG";

const APP_DIR: &str = "audio_dedupe";
const LOG_FILE_NAME: &str = "audio_dedupe.log";

/// Config file location: `$AUDIO_DEDUPE_CONFIG` if set, else the platform config dir.
/// A relative override is resolved against the current directory.
pub fn default_config_path() -> Result<PathBuf> {
    if let Some(p) = env::var_os(CONFIG_ENV_VAR) {
        let p = PathBuf::from(p);
        if p.is_relative() {
            let cwd = env::current_dir()?;
            return Ok(cwd.join(p));
        }
        return Ok(p);
    }
    if let Some(mut base) = config_dir() {
        base.push(APP_DIR);
        base.push("config.xml");
        return Ok(base);
    }
    env::var("HOME")
        .map(|h| PathBuf::from(h).join(".config").join(APP_DIR).join("config.xml"))
        .map_err(|_| anyhow!("cannot determine a config directory (no platform config dir and HOME unset)"))
}

/// Log file location. Colocated with an explicit config file, otherwise under the data dir.
pub fn default_log_path() -> Result<PathBuf> {
    if env::var_os(CONFIG_ENV_VAR).is_some() {
        let cfg = default_config_path()?;
        let parent = cfg.parent().unwrap_or_else(|| Path::new("."));
        return Ok(parent.join(LOG_FILE_NAME));
    }
    if let Some(mut base) = data_dir() {
        base.push(APP_DIR);
        // ensure dir exists (best-effort)
        let _ = fs::create_dir_all(&base);
        base.push(LOG_FILE_NAME);
        return Ok(base);
    }
    env::var("HOME")
        .map(|h| {
            PathBuf::from(h)
                .join(".local")
                .join("share")
                .join(APP_DIR)
                .join(LOG_FILE_NAME)
        })
        .map_err(|_| anyhow!("cannot determine a data directory for the log file"))
}

/// Return true if any existing ancestor of `path` is a symlink.
pub fn path_has_symlink_ancestor(path: &Path) -> io::Result<bool> {
    let mut p = path.parent();
    while let Some(anc) = p {
        if anc.exists() {
            let meta = fs::symlink_metadata(anc)?;
            if meta.file_type().is_symlink() {
                return Ok(true);
            }
        }
        p = anc.parent();
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn plain_directories_have_no_symlink_ancestor() {
        let td = tempdir().unwrap();
        let nested = td.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        let root = dunce::canonicalize(&nested).unwrap();
        assert!(!path_has_symlink_ancestor(&root.join("file.log")).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_parent_is_detected() {
        let td = tempdir().unwrap();
        let root = dunce::canonicalize(td.path()).unwrap();
        let real = root.join("real");
        fs::create_dir_all(&real).unwrap();
        let link = root.join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        assert!(path_has_symlink_ancestor(&link.join("x.log")).unwrap());
    }
}
