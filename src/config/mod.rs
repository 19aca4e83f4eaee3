// src/config/mod.rs

//! Mirror options and the optional TOML config file.
//!
//! Responsibilities:
//! - Define the options every operation accepts and the TOML data model
//!   (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate globs, transforms and limits (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    ConfigFile, DefaultSection, MirrorConfig, MirrorJob, MirrorOptions, RawConfigFile,
    DEFAULT_MAX_CONCURRENT_COPIES,
};
