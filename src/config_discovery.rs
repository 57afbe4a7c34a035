use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::FigcacheConfig;

/// Project-level config file name
pub const CONFIG_FILE: &str = "figcache.toml";

/// Discovers figcache configuration by traversing up the directory tree
pub fn discover_config(start_dir: &Path) -> Result<Option<PathBuf>> {
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Ok(Some(config_path));
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    // Fallback to global config
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("figcache").join("config.toml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// Loads configuration with auto-discovery support
///
/// If `explicit_path` is provided, loads config from that path.
/// Otherwise, auto-discovers config by traversing up directory tree from cwd.
///
/// Returns Ok(None) if no config is found (neither explicit nor discovered).
pub fn load_config_with_discovery(explicit_path: Option<&str>) -> Result<Option<FigcacheConfig>> {
    if let Some(config_path) = explicit_path {
        return Ok(Some(FigcacheConfig::from_file(config_path)?));
    }

    let current_dir =
        std::env::current_dir().context("Failed to get current directory for config discovery")?;

    match discover_config(&current_dir)? {
        Some(discovered_path) => {
            tracing::debug!("Using config: {}", discovered_path.display());
            Ok(Some(FigcacheConfig::from_file(&discovered_path)?))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_config_in_parent() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("src").join("scripts");
        fs::create_dir_all(&nested).unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "[paths]\n").unwrap();

        let found = discover_config(&nested).unwrap();
        assert_eq!(found, Some(temp.path().join(CONFIG_FILE)));
    }

    #[test]
    fn test_explicit_path_is_loaded() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        fs::write(&path, "[runner]\nscript_cmd = \"bash {script}\"\n").unwrap();

        let config = load_config_with_discovery(path.to_str()).unwrap().unwrap();
        assert_eq!(config.runner.script_cmd, "bash {script}");
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.toml");

        assert!(load_config_with_discovery(path.to_str()).is_err());
    }
}
