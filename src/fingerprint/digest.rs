//! Streaming digests over a bounded file prefix.
//!
//! The prefix bound is deliberate: two files whose first `max_hash_bytes` agree and whose sizes
//! agree get the same fingerprint even if they differ further in. Raising `max_hash_bytes`
//! trades speed for accuracy; it is never raised implicitly.

use std::fmt;
use std::fs::File;
use std::hash::Hasher as _;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use sha2::Digest as _;
use twox_hash::XxHash64;

use super::HashSettings;
use crate::errors::DedupeError;

/// Supported fingerprint digests. None of them needs to be cryptographically strong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Xxh64,
    Sha256,
}

impl FromStr for HashAlgorithm {
    type Err = DedupeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blake3" => Ok(HashAlgorithm::Blake3),
            "xxh64" | "xxhash" | "xxhash64" => Ok(HashAlgorithm::Xxh64),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            _ => Err(DedupeError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HashAlgorithm::Blake3 => "blake3",
            HashAlgorithm::Xxh64 => "xxh64",
            HashAlgorithm::Sha256 => "sha256",
        })
    }
}

/// Raw digest bytes; prints as lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(Vec<u8>);

impl Digest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", hex::encode(&self.0))
    }
}

/// Incremental hasher for one of the supported algorithms.
pub enum Digester {
    Blake3(Box<blake3::Hasher>),
    Xxh64(XxHash64),
    Sha256(sha2::Sha256),
}

impl Digester {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Blake3 => Digester::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgorithm::Xxh64 => Digester::Xxh64(XxHash64::with_seed(0)),
            HashAlgorithm::Sha256 => Digester::Sha256(sha2::Sha256::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Digester::Blake3(h) => {
                h.update(data);
            }
            Digester::Xxh64(h) => h.write(data),
            Digester::Sha256(h) => h.update(data),
        }
    }

    pub fn finish(self) -> Digest {
        match self {
            Digester::Blake3(h) => Digest(h.finalize().as_bytes().to_vec()),
            Digester::Xxh64(h) => Digest(h.finish().to_be_bytes().to_vec()),
            Digester::Sha256(h) => Digest(h.finalize().to_vec()),
        }
    }
}

/// Hash at most `max_hash_bytes` from the start of `path`, reading `block_size` bytes at a time.
/// Stops early at end of file; an empty file yields the algorithm's empty digest.
pub fn hash_prefix(path: &Path, settings: &HashSettings) -> io::Result<Digest> {
    let mut file = File::open(path)?;
    hash_reader(&mut file, settings)
}

pub(crate) fn hash_reader<R: Read>(reader: &mut R, settings: &HashSettings) -> io::Result<Digest> {
    let mut digester = Digester::new(settings.algorithm);
    let block = settings.block_size.max(1);
    let mut buf = vec![0u8; block];
    let mut remaining = settings.max_hash_bytes;

    while remaining > 0 {
        let want = block.min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let n = match reader.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        digester.update(&buf[..n]);
        remaining -= n as u64;
    }

    Ok(digester.finish())
}
