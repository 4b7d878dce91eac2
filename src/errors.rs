//! Typed error definitions for audio_dedupe.
//! Provides a small set of well-known failure modes for better logs and tests.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DedupeError {
    #[error("{role} directory does not exist: {path}")]
    RootMissing { role: &'static str, path: PathBuf },

    #[error("{role} path is not a directory: {path}")]
    RootNotDirectory { role: &'static str, path: PathBuf },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unsupported hash algorithm '{0}' (expected one of: blake3, xxh64, sha256)")]
    UnsupportedAlgorithm(String),

    #[error("no free destination name for '{name}' in {dir} after trying every numeric suffix")]
    NameSpaceExhausted { dir: PathBuf, name: String },

    #[error("failed to move {path} after {attempts} attempt(s): {reason}")]
    MoveFailed {
        path: PathBuf,
        attempts: u32,
        reason: String,
    },
}

impl DedupeError {
    /// Stable numeric code emitted as a structured log field.
    pub fn code(&self) -> u16 {
        match self {
            DedupeError::RootMissing { .. } => 10,
            DedupeError::RootNotDirectory { .. } => 11,
            DedupeError::InvalidConfig(_) => 20,
            DedupeError::UnsupportedAlgorithm(_) => 21,
            DedupeError::NameSpaceExhausted { .. } => 30,
            DedupeError::MoveFailed { .. } => 31,
        }
    }

    /// Only root validation problems abort a whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DedupeError::RootMissing { .. }
                | DedupeError::RootNotDirectory { .. }
                | DedupeError::InvalidConfig(_)
                | DedupeError::UnsupportedAlgorithm(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_missing_names_the_role() {
        let err = DedupeError::RootMissing {
            role: "reference",
            path: PathBuf::from("/nope"),
        };
        let msg = err.to_string();
        assert!(msg.contains("reference"));
        assert!(msg.contains("/nope"));
        assert!(err.is_fatal());
    }

    #[test]
    fn per_file_errors_are_not_fatal() {
        let err = DedupeError::MoveFailed {
            path: PathBuf::from("a.mp3"),
            attempts: 4,
            reason: "busy".into(),
        };
        assert!(!err.is_fatal());
        assert_eq!(err.code(), 31);
    }
}
