use clap::{Parser, Subcommand};

/// figcache - Sibling-output cache for figure generator scripts
///
/// Serves each figure of a multi-output generator script from a side cache
/// so the script runs once per build instead of once per figure.
#[derive(Parser, Debug)]
#[command(name = "figcache")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sibling-output cache for figure generator scripts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Path arguments shared across commands
#[derive(Parser, Debug, Clone, Default)]
pub struct CommonConfigArgs {
    /// Config file path
    #[arg(short = 'c', long, env = "FIGCACHE_CONFIG")]
    pub config: Option<String>,

    /// Build temp directory (holds the manifest and the sibling cache)
    #[arg(long, env = "FIGCACHE_TEMP_DIR")]
    pub temp_dir: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Produce one figure, running its script only when needed
    Figure(FigureArgs),

    /// Inspect the sibling cache
    Cache(CacheArgs),

    /// Remove the sibling cache
    Clean(CleanArgs),

    /// Configuration management utilities
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct FigureArgs {
    /// Generator script (file name or path)
    pub script: String,

    /// Requested figure (file name or path)
    pub figure: String,

    /// Number of outputs the calling build step declares
    #[arg(long, default_value_t = 1)]
    pub outputs: usize,

    #[command(flatten)]
    pub common: CommonConfigArgs,

    /// Destination directory of figures
    #[arg(long, env = "FIGCACHE_FIGURES_DIR")]
    pub figures_dir: Option<String>,

    /// Manifest of script outputs (default: <temp-dir>/scripts.json)
    #[arg(long, env = "FIGCACHE_MANIFEST")]
    pub manifest: Option<String>,

    /// File that receives a record of script failures
    #[arg(long, env = "FIGCACHE_EXCEPTION_FILE")]
    pub exception_file: Option<String>,

    /// Invocation template with {script} and {figure} placeholders
    #[arg(long, env = "FIGCACHE_SCRIPT_CMD")]
    pub script_cmd: Option<String>,

    /// Maximum wait for another request of the same script (e.g., "30s")
    #[arg(long, env = "FIGCACHE_LOCK_TIMEOUT")]
    pub lock_timeout: Option<String>,
}

#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(flatten)]
    pub common: CommonConfigArgs,

    /// List cached figures
    #[arg(long, group = "operation")]
    pub list: bool,

    /// Show cache statistics
    #[arg(long, group = "operation")]
    pub stats: bool,
}

#[derive(Parser, Debug)]
pub struct CleanArgs {
    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate a configuration file
    Validate {
        /// Config file path (discovered when omitted)
        path: Option<String>,
    },

    /// Print an example configuration
    Example,

    /// Show the effective configuration
    Show {
        #[command(flatten)]
        common: CommonConfigArgs,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_figure_args() {
        let cli = Cli::try_parse_from([
            "figcache",
            "figure",
            "src/scripts/multi.py",
            "src/tex/figures/a.pdf",
            "--figures-dir",
            "out",
            "--lock-timeout",
            "30s",
        ])
        .unwrap();

        match cli.command {
            Commands::Figure(args) => {
                assert_eq!(args.script, "src/scripts/multi.py");
                assert_eq!(args.figure, "src/tex/figures/a.pdf");
                assert_eq!(args.outputs, 1);
                assert_eq!(args.figures_dir.as_deref(), Some("out"));
                assert_eq!(args.lock_timeout.as_deref(), Some("30s"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cache_operations_are_exclusive() {
        assert!(Cli::try_parse_from(["figcache", "cache", "--list", "--stats"]).is_err());
    }
}
