/// `figcache clean` command implementation
use anyhow::{Context, Result};

use crate::cli::CleanArgs;
use crate::cli_utils::figcache_prefix;
use crate::config_discovery::load_config_with_discovery;
use crate::merger;

pub fn run(args: &CleanArgs) -> Result<()> {
    let file_config = load_config_with_discovery(args.common.config.as_deref())?;
    let cache_dir = merger::cache_dir(&args.common, file_config);

    if !cache_dir.exists() {
        eprintln!("{} Nothing to clean.", figcache_prefix());
        return Ok(());
    }

    std::fs::remove_dir_all(&cache_dir)
        .with_context(|| format!("Failed to remove sibling cache: {}", cache_dir.display()))?;

    eprintln!(
        "{} Removed sibling cache {}",
        figcache_prefix(),
        cache_dir.display()
    );

    Ok(())
}
