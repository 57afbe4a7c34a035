use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::cli::{CommonConfigArgs, ConfigCommand};
use crate::config::FigcacheConfig;
use crate::config_discovery::{discover_config, load_config_with_discovery};
use crate::merger;

pub fn run(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Validate { path } => validate(path),
        ConfigCommand::Example => example(),
        ConfigCommand::Show { common } => show(&common),
    }
}

fn validate(path: Option<String>) -> Result<()> {
    let path: PathBuf = match path {
        Some(path) => path.into(),
        None => {
            let cwd = std::env::current_dir()?;
            discover_config(&cwd)?.context("No figcache.toml found")?
        }
    };

    info!("Validating config file: {}", path.display());

    let config = FigcacheConfig::from_file(&path)?;
    config.validate()?;

    println!("✓ Configuration file is valid: {}", path.display());
    println!("\nSummary:");
    println!("  - Figures directory: {}", config.paths.figures);
    println!("  - Temp directory: {}", config.paths.temp);
    println!("  - Manifest: {}", config.manifest_path().display());
    println!("  - Script command: {}", config.runner.script_cmd);
    println!("  - Lock timeout: {}", config.cache.lock_timeout);

    Ok(())
}

fn example() -> Result<()> {
    println!("{}", FigcacheConfig::example()?);
    Ok(())
}

fn show(common: &CommonConfigArgs) -> Result<()> {
    let mut config = load_config_with_discovery(common.config.as_deref())?.unwrap_or_default();
    if let Some(temp) = &common.temp_dir {
        config.paths.temp = temp.clone();
    }

    println!("Effective Configuration:\n");
    println!("{}", toml::to_string_pretty(&config)?);
    println!(
        "# sibling cache: {}",
        merger::cache_dir(common, Some(config.clone())).display()
    );

    Ok(())
}
