//! Configuration file loading.
//!
//! ## Responsibility
//! Read a TOML file from disk, parse it into a [`LiveConfig`], and run
//! validation before returning.
//!
//! ## Guarantees
//! - A successfully loaded config is always validated
//! - I/O errors and parse errors are distinguished in the error type
//! - File path is included in every error message

use std::path::Path;

use super::validation::{self, ConfigError};
use super::LiveConfig;

/// Load a [`LiveConfig`] from a TOML file.
///
/// # Returns
///
/// - `Ok(LiveConfig)` if the file is readable, well-formed, and valid.
/// - `Err(ConfigError::Io)` if the file cannot be read.
/// - `Err(ConfigError::Parse)` if the TOML is malformed.
/// - `Err(ConfigError::Validation)` if semantic constraints are violated.
///
/// # Panics
///
/// This function never panics.
pub fn load_from_file(path: &Path) -> Result<LiveConfig, ConfigError> {
    let file = path.display().to_string();
    match std::fs::read_to_string(path) {
        Ok(content) => load_from_str(&content, &file),
        Err(source) => Err(ConfigError::Io { file, source }),
    }
}

/// Load a [`LiveConfig`] from a TOML string.
///
/// `source_name` identifies the document in parse and validation errors.
pub fn load_from_str(content: &str, source_name: &str) -> Result<LiveConfig, ConfigError> {
    let config = toml::from_str::<LiveConfig>(content).map_err(|source| ConfigError::Parse {
        file: source_name.to_string(),
        source,
    })?;
    validation::check(&config, source_name)?;
    Ok(config)
}
