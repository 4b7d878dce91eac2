//! Config module.
//! Provides configuration types, default paths, XML loading, and validation.

pub mod paths;
pub mod types;
mod validate;
pub mod xml;

pub use paths::{default_config_path, default_log_path, path_has_symlink_ancestor, CONFIG_ENV_VAR};
pub use types::{Config, LogLevel};
pub use validate::{check_roots, normalize_extensions, validate_and_normalize};
pub use xml::{create_template_config, load_config_from_xml_path, load_or_init, LoadResult};

/// Defaults shared across submodules; they match the values the tool has always shipped with.
pub const DEFAULT_THREADS: usize = 8;
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;
pub const DEFAULT_MAX_HASH_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(1);
pub const DEFAULT_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "aac", "ogg", "aif", "aiff"];
