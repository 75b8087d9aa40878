//! Citation key resolution with build-wide usage tracking.

use crate::bibliography::{BibEntry, Bibliography};
use crate::citations::CitationRequest;
use crate::models::Diagnostic;
use std::collections::{BTreeSet, HashMap};
use std::mem;
use tracing::warn;

/// Per-build record of which keys have been cited and which were missing.
///
/// Append-only: a key keeps the position it got on its first successful
/// resolution, and a missing key is reported once for the whole build.
#[derive(Debug, Default)]
pub struct ResolutionState {
    resolved_order: Vec<String>,
    numbers: HashMap<String, usize>,
    reported_missing: BTreeSet<String>,
    diagnostics: Vec<Diagnostic>,
    current_page: Option<String>,
}

impl ResolutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the page being processed; used to attribute diagnostics.
    pub fn enter_page(&mut self, page: impl Into<String>) {
        self.current_page = Some(page.into());
    }

    /// Distinct keys in first-citation order
    pub fn resolved_order(&self) -> &[String] {
        &self.resolved_order
    }

    /// 1-based position of `key` in the resolved order
    pub fn number_of(&self, key: &str) -> Option<usize> {
        self.numbers.get(key).copied()
    }

    /// Keys that were cited but not found, sorted
    pub fn reported_missing(&self) -> impl Iterator<Item = &str> {
        self.reported_missing.iter().map(String::as_str)
    }

    pub fn is_reported_missing(&self, key: &str) -> bool {
        self.reported_missing.contains(key)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Take accumulated diagnostics (clearing the internal buffer).
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        mem::take(&mut self.diagnostics)
    }

    fn record_resolved(&mut self, key: &str) -> usize {
        if let Some(number) = self.numbers.get(key) {
            *number
        } else {
            self.resolved_order.push(key.to_string());
            let number = self.resolved_order.len();
            self.numbers.insert(key.to_string(), number);
            number
        }
    }

    /// Returns true the first time `key` is seen missing.
    fn mark_missing(&mut self, key: &str) -> bool {
        if self.reported_missing.contains(key) {
            return false;
        }
        self.reported_missing.insert(key.to_string());
        true
    }
}

/// A cited entry with its footnote number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedCitation<'s> {
    pub number: usize,
    pub entry: &'s BibEntry,
}

/// Result of resolving one citation command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'s> {
    /// Found entries in request order; missing keys are left out
    pub citations: Vec<ResolvedCitation<'s>>,
    pub note: Option<String>,
}

impl Resolution<'_> {
    /// Nothing to render for this command
    pub fn is_empty(&self) -> bool {
        self.citations.is_empty() && self.note.is_none()
    }
}

/// Look up every key of `request`, updating `state`.
pub fn resolve<'s>(
    request: &CitationRequest,
    store: &'s Bibliography,
    state: &mut ResolutionState,
) -> Resolution<'s> {
    let mut citations: Vec<ResolvedCitation<'s>> = Vec::with_capacity(request.keys.len());

    for key in &request.keys {
        match store.get(key) {
            Some(entry) => {
                let number = state.record_resolved(key);
                if citations.iter().all(|c| c.number != number) {
                    citations.push(ResolvedCitation { number, entry });
                }
            }
            None => {
                if state.mark_missing(key) {
                    let page = state.current_page.as_deref();
                    match page {
                        Some(page) => {
                            warn!("Citation key '{}' not found (first cited in {})", key, page)
                        }
                        None => warn!("Citation key '{}' not found", key),
                    }
                    let diag = Diagnostic::warning(
                        "citation.missing",
                        format!("Citation key '{}' not found", key),
                    )
                    .with_page(page)
                    .with_context(key.clone());
                    state.diagnostics.push(diag);
                }
            }
        }
    }

    Resolution {
        citations,
        note: request.note.clone(),
    }
}
