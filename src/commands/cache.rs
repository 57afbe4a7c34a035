/// `figcache cache` command implementation
///
/// Lists the sibling cache or prints its statistics.
use anyhow::{Context, Result};

use crate::cli::CacheArgs;
use crate::config_discovery::load_config_with_discovery;
use crate::figure::SiblingCache;
use crate::merger;

pub fn cache(args: &CacheArgs) -> Result<()> {
    let file_config = load_config_with_discovery(args.common.config.as_deref())?;
    let cache = SiblingCache::new(merger::cache_dir(&args.common, file_config))
        .context("Failed to open sibling cache")?;

    if args.stats {
        stats(&cache)
    } else {
        list(&cache)
    }
}

/// List cached figures
fn list(cache: &SiblingCache) -> Result<()> {
    let entries = cache.entries().context("Failed to list cache entries")?;

    if entries.is_empty() {
        println!("No cached figures.");
        return Ok(());
    }

    println!("Cached figures ({} entries):", entries.len());
    println!();

    for entry in entries {
        println!("  {} ({} bytes)", entry.name, entry.size_bytes);
    }

    Ok(())
}

/// Show cache statistics
fn stats(cache: &SiblingCache) -> Result<()> {
    let entries = cache.entries().context("Failed to get cache statistics")?;
    let total_size: u64 = entries.iter().map(|e| e.size_bytes).sum();

    println!("Sibling Cache Statistics");
    println!();
    println!("Location: {}", cache.root().display());
    println!("Total entries: {}", entries.len());
    println!("Total size: {:.2} MB", total_size as f64 / 1_000_000.0);

    Ok(())
}
