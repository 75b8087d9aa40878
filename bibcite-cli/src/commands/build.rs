//! Build command implementation.

use anyhow::{Context, Result};
use bibcite_core::{BuildOutput, Config, SiteBuilder};
use std::fs;
use std::path::Path;

/// Rewrite every page and write the results into the output directory
pub fn build_site(config_path: &Path) -> Result<()> {
    tracing::info!("Loading config from {:?}", config_path);
    let config = Config::from_file(config_path).context("Failed to load configuration")?;

    let builder = SiteBuilder::new(config.clone());
    let output = builder.build().context("Failed to build site")?;

    write_output(&config, &output)?;
    Ok(())
}

fn write_output(config: &Config, output: &BuildOutput) -> Result<()> {
    let output_dir = config.output_dir();
    fs::create_dir_all(&output_dir).context("Failed to create output directory")?;

    for page in &output.pages {
        let target = output_dir.join(&page.rel_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&target, &page.markdown)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        tracing::debug!("Wrote {}", target.display());
    }

    tracing::info!(
        "Wrote {} pages to {} ({} of {} entries cited, {} missing keys)",
        output.pages.len(),
        output_dir.display(),
        output.cited.len(),
        output.entry_count,
        output.missing.len()
    );
    Ok(())
}
