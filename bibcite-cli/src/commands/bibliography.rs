//! Print the full bibliography.

use anyhow::{Context, Result};
use bibcite_core::{process_full_bibliography, Config, SiteBuilder};
use std::path::Path;

/// Render every loaded entry to stdout, numbered in load order
pub fn print_bibliography(config_path: &Path) -> Result<()> {
    let config = Config::from_file(config_path).context("Failed to load configuration")?;
    let options = config.rewrite_options()?;
    let builder = SiteBuilder::new(config);

    let store = builder
        .load_bibliography()
        .context("Failed to load bibliography")?;
    println!("{}", process_full_bibliography(&store, &options));
    Ok(())
}
