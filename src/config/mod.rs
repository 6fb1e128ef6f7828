//! Configuration for size runs
//!
//! This module provides:
//! - .size-diff.toml config file support
//! - package.json / lerna.json discovery of what to measure

pub mod file;
pub mod loader;
pub mod manifest;

pub use file::{
    BaselineSettings, BaselineStrategy, BundlerSettings, ConfigFile, OutputSettings,
    ReviewSettings, CONFIG_FILE_NAME, DEFAULT_TOLERANCE_PERCENT,
};
pub use loader::ConfigLoader;
pub use manifest::{discover, PackageManifest, TargetOptions};
