//! Site building logic - loads the bibliography and rewrites every page.

use crate::{
    bibliography::{Bibliography, LoadError},
    config::{Config, ConfigError},
    models::*,
    resolver::ResolutionState,
    rewriter::{plan_page, process_full_bibliography, render_page, PagePlan, RewriteOptions},
    sources::{load_bibliography, load_pages},
};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bibliography error: {0}")]
    Load(#[from] LoadError),
}

/// Everything a build produced, before anything is written
#[derive(Debug)]
pub struct BuildOutput {
    pub pages: Vec<RenderedPage>,
    /// Every loaded entry, as rendered for the full-bibliography command
    pub full_bibliography: String,
    pub diagnostics: Vec<Diagnostic>,
    pub entry_count: usize,
    /// Distinct keys cited successfully, in first-citation order
    pub cited: Vec<String>,
    /// Keys cited but never found, sorted
    pub missing: Vec<String>,
}

/// Main site builder
pub struct SiteBuilder {
    config: Config,
}

impl SiteBuilder {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load the configured bibliography.
    pub fn load_bibliography(&self) -> Result<Bibliography, BuildError> {
        let source = self.config.bib_source()?;
        let store = load_bibliography(&source)?;
        tracing::info!("Loaded {} bibliography entries", store.len());
        Ok(store)
    }

    /// Rewrite every page under the docs directory
    pub fn build(&self) -> Result<BuildOutput, BuildError> {
        let options = self.config.rewrite_options()?;
        let mut store = self.load_bibliography()?;
        let mut diagnostics = store.take_diagnostics();
        let skipped = diagnostics
            .iter()
            .filter(|d| d.code == "bibliography.malformed_entry")
            .count();

        let pages = load_pages(&self.config.docs_dir())?;
        tracing::info!("Found {} markdown pages", pages.len());

        let (rendered, mut state) = rewrite_pages(&pages, &store, &options, self.config.jobs());
        diagnostics.extend(state.take_diagnostics());

        let missing: Vec<String> = state.reported_missing().map(str::to_string).collect();
        if !missing.is_empty() {
            tracing::warn!(
                "{} citation keys not found: {}",
                missing.len(),
                missing.join(", ")
            );
        }
        if skipped > 0 {
            tracing::warn!("Skipped {} malformed bibliography records", skipped);
        }
        tracing::info!(
            "Rewrote {} pages citing {} of {} entries",
            rendered.len(),
            state.resolved_order().len(),
            store.len()
        );

        Ok(BuildOutput {
            pages: rendered,
            full_bibliography: process_full_bibliography(&store, &options),
            diagnostics,
            entry_count: store.len(),
            cited: state.resolved_order().to_vec(),
            missing,
        })
    }
}

/// Rewrite `pages` in order, sharing one resolution state.
///
/// Citations are resolved page by page in the given order, so numbering only
/// depends on that order. Rendering then runs on a pool of `jobs` threads;
/// the result is identical for any `jobs`.
pub fn rewrite_pages(
    pages: &[Page],
    store: &Bibliography,
    options: &RewriteOptions,
    jobs: usize,
) -> (Vec<RenderedPage>, ResolutionState) {
    let mut state = ResolutionState::new();
    let plans: Vec<PagePlan<'_>> = pages
        .iter()
        .map(|page| {
            let name = page.name();
            tracing::debug!("Resolving citations in {}", name);
            state.enter_page(name);
            plan_page(&page.source, store, &mut state)
        })
        .collect();

    let rendered: Vec<RenderedPage> = {
        let state = &state;
        let render = move |page: &Page, plan: &PagePlan<'_>| RenderedPage {
            rel_path: page.rel_path.clone(),
            markdown: render_page(&page.source, plan, store, state, options),
        };
        let sequential = || -> Vec<RenderedPage> {
            pages
                .iter()
                .zip(&plans)
                .map(|(page, plan)| render(page, plan))
                .collect()
        };

        if jobs <= 1 || pages.len() <= 1 {
            sequential()
        } else {
            match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
                Ok(pool) => pool.install(|| {
                    pages
                        .par_iter()
                        .zip(plans.par_iter())
                        .map(|(page, plan)| render(page, plan))
                        .collect::<Vec<_>>()
                }),
                Err(err) => {
                    tracing::warn!("Rendering on one thread: {}", err);
                    sequential()
                }
            }
        }
    };

    (rendered, state)
}
