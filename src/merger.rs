/// Configuration merger: CLI args > Env vars > Config file > Defaults
///
/// Env vars are folded into the CLI args by clap, so only the file and the
/// built-in defaults need handling here.
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{CommonConfigArgs, FigureArgs};
use crate::config::{parse_duration, FigcacheConfig, SIBLING_CACHE_DIR};
use crate::figure::{GateSettings, RunnerSettings};

/// Merged configuration for the `figure` command
#[derive(Debug, Clone)]
pub struct MergedFigureConfig {
    pub figures_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub manifest: PathBuf,
    pub exception_file: Option<PathBuf>,
    pub script_cmd: String,
    pub extra_path: Vec<PathBuf>,
    pub lock_timeout: Duration,
}

impl MergedFigureConfig {
    /// Merge configuration from CLI args and config file
    pub fn merge(args: &FigureArgs, file_config: Option<FigcacheConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        file.validate()?;

        let temp_dir = args
            .common
            .temp_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&file.paths.temp));

        let manifest = match (&args.manifest, &file.paths.manifest) {
            (Some(path), _) | (None, Some(path)) => PathBuf::from(path),
            (None, None) => temp_dir.join(crate::config::MANIFEST_FILE),
        };

        let lock_timeout = args
            .lock_timeout
            .as_deref()
            .unwrap_or(&file.cache.lock_timeout);
        let lock_timeout = parse_duration(lock_timeout)
            .with_context(|| format!("Invalid lock timeout: {}", lock_timeout))?;

        Ok(Self {
            figures_dir: args
                .figures_dir
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(&file.paths.figures)),
            manifest,
            exception_file: args
                .exception_file
                .clone()
                .or(file.paths.exception_file)
                .map(PathBuf::from),
            script_cmd: args
                .script_cmd
                .clone()
                .unwrap_or(file.runner.script_cmd),
            extra_path: file.runner.extra_path.iter().map(PathBuf::from).collect(),
            lock_timeout,
            temp_dir,
        })
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.temp_dir.join(SIBLING_CACHE_DIR)
    }

    pub fn gate_settings(&self) -> GateSettings {
        GateSettings {
            figures_dir: self.figures_dir.clone(),
            lock_timeout: self.lock_timeout,
            exception_file: self.exception_file.clone(),
        }
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            script_cmd: self.script_cmd.clone(),
            working_dir: self.figures_dir.clone(),
            exception_file: self.exception_file.clone(),
            extra_path: self.extra_path.clone(),
        }
    }
}

/// Resolve the sibling cache directory for maintenance commands
pub fn cache_dir(args: &CommonConfigArgs, file_config: Option<FigcacheConfig>) -> PathBuf {
    let temp = args
        .temp_dir
        .clone()
        .unwrap_or_else(|| file_config.unwrap_or_default().paths.temp);
    Path::new(&temp).join(SIBLING_CACHE_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn figure_args(extra: &[&str]) -> FigureArgs {
        let mut argv = vec!["figcache", "figure", "plot.py", "a.pdf"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Figure(args) => args,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_defaults_without_file() {
        let merged = MergedFigureConfig::merge(&figure_args(&[]), None).unwrap();

        assert_eq!(merged.figures_dir, PathBuf::from("src/tex/figures"));
        assert_eq!(merged.manifest, PathBuf::from(".figcache/scripts.json"));
        assert_eq!(merged.cache_dir(), PathBuf::from(".figcache/sibling-cache"));
        assert_eq!(merged.lock_timeout, Duration::from_secs(600));
        assert!(merged.exception_file.is_none());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = FigcacheConfig::default();
        file.paths.figures = "file/figures".to_string();
        file.paths.temp = "file/temp".to_string();
        file.runner.script_cmd = "bash {script}".to_string();

        let merged = MergedFigureConfig::merge(
            &figure_args(&["--figures-dir", "cli/figures", "--lock-timeout", "5s"]),
            Some(file),
        )
        .unwrap();

        assert_eq!(merged.figures_dir, PathBuf::from("cli/figures"));
        assert_eq!(merged.manifest, PathBuf::from("file/temp/scripts.json"));
        assert_eq!(merged.script_cmd, "bash {script}");
        assert_eq!(merged.lock_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_lock_timeout_is_rejected() {
        assert!(MergedFigureConfig::merge(&figure_args(&["--lock-timeout", "never"]), None).is_err());
    }
}
