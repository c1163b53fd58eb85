// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{RawServiceConfig, ServiceConfig};
use crate::errors::Result;

/// Read a config file into a `RawServiceConfig` without validating it.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawServiceConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    load_from_str(&contents)
}

/// Parse TOML text into a `RawServiceConfig` without validating it.
pub fn load_from_str(contents: &str) -> Result<RawServiceConfig> {
    Ok(toml::from_str(contents)?)
}

/// Read and validate a config file.
///
/// This is the entry point the host uses: TOML is deserialized (defaults come
/// from `serde`), then every stage entry is checked and converted into a
/// `TaskSpec`.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ServiceConfig> {
    let raw_config = load_from_path(&path)?;
    ServiceConfig::try_from(raw_config)
}
