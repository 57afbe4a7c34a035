use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete figcache configuration (loaded from TOML file)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FigcacheConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub runner: RunnerConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Destination directory of generated figures
    #[serde(default = "default_figures_dir")]
    pub figures: String,

    /// Build temp directory; holds the manifest and the sibling cache
    #[serde(default = "default_temp_dir")]
    pub temp: String,

    /// Manifest path (defaults to `<temp>/scripts.json`)
    #[serde(default)]
    pub manifest: Option<String>,

    /// File the outer error reporter reads script failures from
    #[serde(default)]
    pub exception_file: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            figures: default_figures_dir(),
            temp: default_temp_dir(),
            manifest: None,
            exception_file: None,
        }
    }
}

/// Generator script invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Command template; `{script}` and `{figure}` are substituted
    #[serde(default = "default_script_cmd")]
    pub script_cmd: String,

    /// Search paths appended to PATH after `$HOME/bin`
    #[serde(default)]
    pub extra_path: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            script_cmd: default_script_cmd(),
            extra_path: Vec::new(),
        }
    }
}

/// Sibling cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum wait for the owner lock (e.g., "30s", "10m")
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lock_timeout: default_lock_timeout(),
        }
    }
}

/// Name of the sibling cache directory inside the temp directory
pub const SIBLING_CACHE_DIR: &str = "sibling-cache";

/// Manifest file name inside the temp directory
pub const MANIFEST_FILE: &str = "scripts.json";

fn default_figures_dir() -> String {
    "src/tex/figures".to_string()
}

fn default_temp_dir() -> String {
    ".figcache".to_string()
}

fn default_script_cmd() -> String {
    "python {script}".to_string()
}

fn default_lock_timeout() -> String {
    "10m".to_string()
}

impl FigcacheConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: FigcacheConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Generate example configuration as TOML string
    pub fn example() -> Result<String> {
        let config = FigcacheConfig {
            paths: PathsConfig {
                exception_file: Some(".figcache/exception.log".to_string()),
                ..Default::default()
            },
            runner: RunnerConfig {
                script_cmd: "python {script}".to_string(),
                extra_path: vec!["/usr/local/texlive/bin".to_string()],
            },
            cache: CacheConfig::default(),
        };

        toml::to_string_pretty(&config).context("Failed to serialize example config")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.paths.figures.is_empty() {
            anyhow::bail!("paths.figures must be set");
        }

        if self.paths.temp.is_empty() {
            anyhow::bail!("paths.temp must be set");
        }

        if !self.runner.script_cmd.contains("{script}") {
            anyhow::bail!("runner.script_cmd must contain the {{script}} placeholder");
        }

        parse_duration(&self.cache.lock_timeout)
            .with_context(|| format!("Invalid cache.lock_timeout: {}", self.cache.lock_timeout))?;

        Ok(())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.paths
            .manifest
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Path::new(&self.paths.temp).join(MANIFEST_FILE))
    }
}

/// Parse a duration of the form `30s`, `10m`, `1h` or `1d`
pub fn parse_duration(s: &str) -> Result<Duration> {
    if s.is_empty() {
        return Err(anyhow!("Empty duration string"));
    }

    let (split, unit) = s
        .char_indices()
        .next_back()
        .ok_or_else(|| anyhow!("Empty duration string"))?;
    let num: u64 = s[..split]
        .parse()
        .map_err(|_| anyhow!("Invalid duration: {}", s))?;

    let multiplier: u64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        _ => return Err(anyhow!("Invalid duration unit: {}. Use: s, m, h, d", unit)),
    };
    let seconds = num
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow!("Duration out of range: {}", s))?;

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FigcacheConfig::default();
        assert_eq!(config.paths.figures, "src/tex/figures");
        assert_eq!(config.paths.temp, ".figcache");
        assert_eq!(config.runner.script_cmd, "python {script}");
        assert_eq!(config.cache.lock_timeout, "10m");
        assert_eq!(config.manifest_path(), PathBuf::from(".figcache/scripts.json"));
    }

    #[test]
    fn test_validate_config() {
        assert!(FigcacheConfig::default().validate().is_ok());
    }

    #[test]
    fn test_template_without_script_is_invalid() {
        let mut config = FigcacheConfig::default();
        config.runner.script_cmd = "make figures".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_lock_timeout() {
        let mut config = FigcacheConfig::default();
        config.cache.lock_timeout = "soon".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: FigcacheConfig = toml::from_str(
            r#"
            [paths]
            temp = "build/temp"
            manifest = "build/manifest.json"

            [runner]
            script_cmd = "python {script} {figure}"
            "#,
        )
        .unwrap();

        assert_eq!(config.paths.figures, "src/tex/figures");
        assert_eq!(config.manifest_path(), PathBuf::from("build/manifest.json"));
        assert_eq!(config.runner.script_cmd, "python {script} {figure}");
        assert_eq!(config.cache.lock_timeout, "10m");
    }

    #[test]
    fn test_example_round_trips() {
        let example = FigcacheConfig::example().unwrap();
        let config: FigcacheConfig = toml::from_str(&example).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.runner.extra_path.len(), 1);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5y").is_err());
        assert!(parse_duration("5µ").is_err());
        assert!(parse_duration("µ").is_err());
        assert!(parse_duration("999999999999999999d").is_err());
    }
}
