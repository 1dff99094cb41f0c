use std::path::PathBuf;

use anyhow::{Context, Result};

use sharedfolders_core::config::{Config, ConfigPaths};

pub mod config;
pub mod mount;
pub mod policy;
pub mod service;

/// The config at `path`, or at the resolved default location. A missing
/// file means built-in defaults.
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config_path = path.unwrap_or_else(|| ConfigPaths::resolve().config_path);
    Config::load_or_default(&config_path)
        .with_context(|| format!("load config {}", config_path.display()))
}
