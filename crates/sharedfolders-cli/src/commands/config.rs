use std::path::PathBuf;

use anyhow::{anyhow, Result};

use sharedfolders_core::config::{Config, ConfigPaths};

pub fn print_effective(config_path: Option<PathBuf>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let output = config.to_toml_string()?;
    println!("{}", output);
    Ok(())
}

pub fn init(path: Option<PathBuf>, force: bool) -> Result<()> {
    let config_path = path.unwrap_or_else(|| ConfigPaths::resolve().config_path);
    if config_path.exists() && !force {
        return Err(anyhow!(
            "Config already exists at {} (use --force to overwrite)",
            config_path.display()
        ));
    }
    Config::default_config().save(&config_path)?;
    println!("Config written to {}", config_path.display());
    Ok(())
}
