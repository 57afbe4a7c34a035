use anyhow::Result;
use clap::Parser;

use figcache::cli::{Cli, Commands};
use figcache::{commands, logging};

fn main() -> Result<()> {
    // Initialize structured logging
    logging::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Figure(args) => commands::figure::run(&args),
        Commands::Cache(args) => commands::cache::cache(&args),
        Commands::Clean(args) => commands::clean::run(&args),
        Commands::Config(args) => commands::config::run(args.command),
    };

    if let Err(err) = &result {
        tracing::error!("{:#}", err);
    }

    result
}
