// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: the TOML-backed data model and the validated `ServiceConfig`.
//! - `loader.rs`: reading a config file from disk.
//! - `validate.rs`: `RawServiceConfig` → `ServiceConfig` conversion.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{
    EnvValue, RawServiceConfig, ServiceConfig, Settings, SettingsSection, TaskConfig, TaskItem,
};
