//! Verify citations and emit diagnostics.

use anyhow::{Context, Result};
use bibcite_core::{Config, Diagnostic, DiagnosticSeverity, SiteBuilder};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct VerificationSummary<'a> {
    pages: usize,
    entries: usize,
    cited: usize,
    missing: &'a [String],
    errors: usize,
    warnings: usize,
    diagnostics: &'a [Diagnostic],
}

/// Run the build pipeline without writing output and surface diagnostics.
pub fn verify_site(config_path: &Path, json: bool) -> Result<()> {
    let config = Config::from_file(config_path).context("Failed to load configuration")?;
    let builder = SiteBuilder::new(config);
    let output = builder
        .build()
        .context("Failed to build site for verification")?;

    let diagnostics = output.diagnostics;
    let count = |severity: DiagnosticSeverity| {
        diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    };

    let summary = VerificationSummary {
        pages: output.pages.len(),
        entries: output.entry_count,
        cited: output.cited.len(),
        missing: &output.missing,
        errors: count(DiagnosticSeverity::Error),
        warnings: count(DiagnosticSeverity::Warning),
        diagnostics: &diagnostics,
    };

    if json {
        let payload = serde_json::to_string_pretty(&summary)?;
        println!("{}", payload);
    } else {
        println!(
            "Verification complete: {} pages, {} entries ({} cited), {} errors, {} warnings",
            summary.pages,
            summary.entries,
            summary.cited,
            summary.errors,
            summary.warnings
        );
        for diag in &diagnostics {
            let page = diag
                .page
                .as_deref()
                .map(|p| format!(" [{}]", p))
                .unwrap_or_default();
            let source = match (&diag.source_path, diag.line) {
                (Some(path), Some(line)) => format!(" ({}:{})", path, line),
                (Some(path), None) => format!(" ({})", path),
                _ => String::new(),
            };
            println!(
                "- {:?} {}{}{}: {}",
                diag.severity, diag.code, page, source, diag.message
            );
            if let Some(ctx) = &diag.context {
                println!("  context: {}", ctx);
            }
        }
    }

    Ok(())
}
