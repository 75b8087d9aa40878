//! Page rewriting: citation substitution and bibliography placement.
//!
//! Rewriting a page happens in two steps. [`plan_page`] scans and resolves
//! every citation command, which is the only step that mutates the shared
//! [`ResolutionState`]. [`render_page`] then produces the output text from the
//! plan without touching the state, so planned pages can be rendered in any
//! order (or concurrently) and still give the same bytes.

use crate::bibliography::{BibEntry, Bibliography};
use crate::citations::scan;
use crate::format::{format_bibliography, format_inline, FootnoteFormat};
use crate::resolver::{resolve, Resolution, ResolutionState};
use std::cmp::Reverse;
use std::ops::Range;

/// Bibliography placement and label settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOptions {
    /// Replaced with the cumulative bibliography
    pub bib_command: String,
    /// Replaced with every loaded entry
    pub full_bib_command: String,
    /// Append the bibliography to pages that have neither command
    pub bib_by_default: bool,
    pub footnote_format: FootnoteFormat,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            bib_command: String::from(r"\bibliography"),
            full_bib_command: String::from(r"\full_bibliography"),
            bib_by_default: true,
            footnote_format: FootnoteFormat::default(),
        }
    }
}

/// Resolved citations of one page, ready to render
#[derive(Debug, Clone)]
pub struct PagePlan<'s> {
    substitutions: Vec<(Range<usize>, Resolution<'s>)>,
    /// Length of the resolved order once this page was planned
    bibliography_len: usize,
}

impl PagePlan<'_> {
    pub fn citation_count(&self) -> usize {
        self.substitutions.len()
    }

    /// Number of entries in this page's cumulative bibliography
    pub fn bibliography_len(&self) -> usize {
        self.bibliography_len
    }
}

/// Scan and resolve every citation command in `text`.
pub fn plan_page<'s>(
    text: &str,
    store: &'s Bibliography,
    state: &mut ResolutionState,
) -> PagePlan<'s> {
    let substitutions = scan(text)
        .map(|request| {
            let resolution = resolve(&request, store, state);
            (request.span, resolution)
        })
        .collect();

    PagePlan {
        substitutions,
        bibliography_len: state.resolved_order().len(),
    }
}

/// Prefix that keeps full-bibliography labels apart from cited-entry labels
const FULL_LABEL_PREFIX: &str = "full-";

/// A replacement in the original page text
enum Edit<'p, 's> {
    Citation(&'p Resolution<'s>),
    FullBibliography,
    Bibliography,
}

/// Produce the rewritten page for a plan made over the same `text`.
///
/// Commands are only recognised in the page's own text between citation
/// commands; generated output is never searched again.
pub fn render_page(
    text: &str,
    plan: &PagePlan<'_>,
    store: &Bibliography,
    state: &ResolutionState,
    options: &RewriteOptions,
) -> String {
    let edits = plan_edits(text, plan, options);
    let has_bib = edits.iter().any(|(_, e)| matches!(e, Edit::Bibliography));

    let bibliography = if has_bib || options.bib_by_default {
        let order = state.resolved_order();
        let keys = &order[..plan.bibliography_len.min(order.len())];
        let entries: Vec<(usize, &BibEntry)> = keys
            .iter()
            .enumerate()
            .filter_map(|(idx, key)| store.get(key).map(|entry| (idx + 1, entry)))
            .collect();
        format_bibliography(entries, &options.footnote_format)
    } else {
        String::new()
    };

    let mut full = None;
    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;
    for (span, edit) in &edits {
        out.push_str(&text[last_end..span.start]);
        match edit {
            Edit::Citation(resolution) => {
                if !resolution.is_empty() {
                    out.push_str(&format_inline(
                        &resolution.citations,
                        resolution.note.as_deref(),
                        &options.footnote_format,
                    ));
                }
            }
            Edit::FullBibliography => {
                let full = full.get_or_insert_with(|| process_full_bibliography(store, options));
                out.push_str(full);
            }
            Edit::Bibliography => out.push_str(&bibliography),
        }
        last_end = span.end;
    }
    out.push_str(&text[last_end..]);

    if !has_bib && options.bib_by_default && !bibliography.is_empty() {
        out.truncate(out.trim_end().len());
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&bibliography);
        out.push('\n');
    }

    out
}

/// Every replacement for a page, in text order.
fn plan_edits<'p, 's>(
    text: &str,
    plan: &'p PagePlan<'s>,
    options: &RewriteOptions,
) -> Vec<(Range<usize>, Edit<'p, 's>)> {
    let mut edits = Vec::new();
    let mut last_end = 0;
    for (span, resolution) in &plan.substitutions {
        find_commands(text, last_end..span.start, options, &mut edits);
        edits.push((span.clone(), Edit::Citation(resolution)));
        last_end = span.end;
    }
    find_commands(text, last_end..text.len(), options, &mut edits);
    edits
}

/// Bibliography commands inside `range`, leftmost first. When both commands
/// match at one position the longer one wins.
fn find_commands<'p, 's>(
    text: &str,
    range: Range<usize>,
    options: &RewriteOptions,
    edits: &mut Vec<(Range<usize>, Edit<'p, 's>)>,
) {
    let mut pos = range.start;
    while pos < range.end {
        let haystack = &text[pos..range.end];
        let next = [
            (options.full_bib_command.as_str(), true),
            (options.bib_command.as_str(), false),
        ]
        .into_iter()
        .filter(|(command, _)| !command.is_empty())
        .filter_map(|(command, full)| {
            haystack
                .find(command)
                .map(|offset| (pos + offset, command.len(), full))
        })
        .min_by_key(|&(start, len, _)| (start, Reverse(len)));

        let Some((start, len, full)) = next else {
            break;
        };
        let edit = if full {
            Edit::FullBibliography
        } else {
            Edit::Bibliography
        };
        edits.push((start..start + len, edit));
        pos = start + len;
    }
}

/// Plan and render one page.
pub fn process_page(
    text: &str,
    store: &Bibliography,
    state: &mut ResolutionState,
    options: &RewriteOptions,
) -> String {
    let plan = plan_page(text, store, state);
    render_page(text, &plan, store, state, options)
}

/// Every loaded entry, numbered by its position in the store.
///
/// Labels carry a `full-` prefix, so a page holding both this list and
/// citation markers never defines one label twice.
pub fn process_full_bibliography(store: &Bibliography, options: &RewriteOptions) -> String {
    format_bibliography(
        store.all().enumerate().map(|(idx, entry)| (idx + 1, entry)),
        &options.footnote_format.prefixed(FULL_LABEL_PREFIX),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFS: &str = r#"
@article{einstein1905,
  author = {Einstein, Albert},
  title = {On the Electrodynamics of Moving Bodies},
  year = 1905
}
@article{bohr1913,
  author = {Bohr, Niels},
  title = {On the Constitution of Atoms and Molecules},
  year = 1913
}
@misc{uncited, title = {Never Cited}}
"#;

    fn store() -> Bibliography {
        Bibliography::load([("refs.bib", REFS)]).unwrap()
    }

    #[test]
    fn test_first_seen_order_with_note() {
        let store = store();
        let mut state = ResolutionState::new();
        let text = "Light \\cite{einstein1905}.\nAtoms \\cite[p.2]{bohr1913,einstein1905}.\n";

        let out = process_page(text, &store, &mut state, &RewriteOptions::default());

        assert_eq!(
            out,
            "Light [^1].\nAtoms [^2][^1] (p.2).\n\n\
             [^1]: Albert Einstein. On the Electrodynamics of Moving Bodies. 1905.\n\
             [^2]: Niels Bohr. On the Constitution of Atoms and Molecules. 1913.\n"
        );
    }

    #[test]
    fn test_no_bibliography_without_default_or_command() {
        let store = store();
        let mut state = ResolutionState::new();
        let options = RewriteOptions {
            bib_by_default: false,
            ..RewriteOptions::default()
        };

        let out = process_page(r"See \cite{bohr1913}.", &store, &mut state, &options);
        assert_eq!(out, "See [^1].");
    }

    #[test]
    fn test_explicit_command_receives_bibliography() {
        let store = store();
        let mut state = ResolutionState::new();
        let options = RewriteOptions {
            bib_by_default: false,
            ..RewriteOptions::default()
        };
        let text = "# Refs\n\\bibliography\n\nEnd \\cite{bohr1913}.";

        let out = process_page(text, &store, &mut state, &options);

        assert_eq!(
            out,
            "# Refs\n[^1]: Niels Bohr. On the Constitution of Atoms and Molecules. 1913.\n\nEnd [^1]."
        );
    }

    #[test]
    fn test_bibliography_is_cumulative_across_pages() {
        let store = store();
        let mut state = ResolutionState::new();
        let options = RewriteOptions::default();

        let first = process_page(r"\cite{bohr1913}", &store, &mut state, &options);
        let second = process_page(
            r"\cite{einstein1905} and again \cite{bohr1913}",
            &store,
            &mut state,
            &options,
        );

        assert_eq!(first.matches("]: ").count(), 1);
        assert!(second.starts_with("[^2] and again [^1]\n\n[^1]: Niels Bohr"));
        assert_eq!(second.matches("[^1]: ").count(), 1);
        assert_eq!(second.matches("[^2]: ").count(), 1);
    }

    #[test]
    fn test_empty_bibliography_is_not_appended() {
        let store = store();
        let mut state = ResolutionState::new();

        let out = process_page("No citations here.\n", &store, &mut state, &RewriteOptions::default());
        assert_eq!(out, "No citations here.\n");

        let out = process_page(
            "Intro\n\\bibliography\n",
            &store,
            &mut state,
            &RewriteOptions::default(),
        );
        assert_eq!(out, "Intro\n\n");
    }

    #[test]
    fn test_missing_key_span_removed_and_neighbours_kept() {
        let store = store();
        let mut state = ResolutionState::new();
        let options = RewriteOptions {
            bib_by_default: false,
            ..RewriteOptions::default()
        };

        let out = process_page(
            r"a\cite{ghost}b \cite{ghost,bohr1913} \cite[note]{ghost}",
            &store,
            &mut state,
            &options,
        );

        assert_eq!(out, "ab [^1] (note)");
        assert_eq!(state.diagnostics().len(), 1);
    }

    #[test]
    fn test_full_bibliography_lists_every_entry_in_store_order() {
        let store = store();
        let mut state = ResolutionState::new();
        let options = RewriteOptions::default();

        let out = process_page("\\full_bibliography\n", &store, &mut state, &options);

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("[^full-1]: Albert Einstein."));
        assert!(lines[1].starts_with("[^full-2]: Niels Bohr."));
        assert_eq!(lines[2], "[^full-3]: Never Cited.");
        assert!(state.resolved_order().is_empty());
    }

    #[test]
    fn test_markers_point_at_cited_entry_next_to_full_bibliography() {
        let store = store();
        let mut state = ResolutionState::new();

        let out = process_page(
            "Atoms \\cite{bohr1913}\n\n\\full_bibliography\n",
            &store,
            &mut state,
            &RewriteOptions::default(),
        );

        assert!(out.starts_with("Atoms [^1]\n\n[^full-1]: Albert Einstein."));
        assert!(out.contains("\n[^full-2]: Niels Bohr."));
        assert!(out.ends_with(
            "[^full-3]: Never Cited.\n\n\
             [^1]: Niels Bohr. On the Constitution of Atoms and Molecules. 1913.\n"
        ));
        assert_eq!(out.matches("[^1]: ").count(), 1);
    }

    #[test]
    fn test_full_bibliography_keeps_explicit_command_placement() {
        let store = store();
        let mut state = ResolutionState::new();

        let out = process_page(
            "\\cite{bohr1913}\n\n\\bibliography\n\n\\full_bibliography",
            &store,
            &mut state,
            &RewriteOptions::default(),
        );

        assert!(out.starts_with(
            "[^1]\n\n[^1]: Niels Bohr. On the Constitution of Atoms and Molecules. 1913.\n\n[^full-1]: "
        ));
        assert!(out.ends_with("[^full-3]: Never Cited."));
    }

    #[test]
    fn test_generated_text_is_not_searched_for_commands() {
        let store =
            Bibliography::load([("refs.bib", "@misc{a, title = {References of note}}")]).unwrap();
        let mut state = ResolutionState::new();
        let options = RewriteOptions {
            bib_command: String::from("References"),
            ..RewriteOptions::default()
        };

        let out = process_page(
            "\\cite[see References]{a}\n\n\\full_bibliography\n\nReferences",
            &store,
            &mut state,
            &options,
        );

        assert_eq!(
            out,
            "[^1] (see References)\n\n[^full-1]: References of note.\n\n[^1]: References of note."
        );
    }

    #[test]
    fn test_longer_command_wins_at_same_position() {
        let store = store();
        let mut state = ResolutionState::new();
        let options = RewriteOptions {
            bib_command: String::from("\\refs"),
            full_bib_command: String::from("\\refs*"),
            ..RewriteOptions::default()
        };

        let out = process_page("\\cite{bohr1913} \\refs* \\refs", &store, &mut state, &options);

        assert!(out.starts_with("[^1] [^full-1]: Albert Einstein."));
        assert!(out.ends_with(" [^1]: Niels Bohr. On the Constitution of Atoms and Molecules. 1913."));
    }

    #[test]
    fn test_render_uses_snapshot_taken_at_planning() {
        let store = store();
        let mut state = ResolutionState::new();
        let options = RewriteOptions::default();

        let first_text = r"\cite{bohr1913}";
        let first = plan_page(first_text, &store, &mut state);
        let second = plan_page(r"\cite{einstein1905}", &store, &mut state);

        assert_eq!(first.bibliography_len(), 1);
        assert_eq!(second.bibliography_len(), 2);

        let out = render_page(first_text, &first, &store, &state, &options);
        assert!(!out.contains("Einstein"));
    }

    #[test]
    fn test_custom_footnote_labels() {
        let store = store();
        let mut state = ResolutionState::new();
        let options = RewriteOptions {
            footnote_format: FootnoteFormat::new("ref-{number}").unwrap(),
            ..RewriteOptions::default()
        };

        let out = process_page(r"\cite{einstein1905}", &store, &mut state, &options);
        assert!(out.starts_with("[^ref-1]\n\n[^ref-1]: Albert Einstein."));
    }
}
