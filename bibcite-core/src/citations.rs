//! Citation command scanning.
//!
//! Recognises `\cite{key}`, `\cite{a, b}` and `\cite[note]{key}`. Anything that
//! does not fit the grammar (unbalanced braces, an empty key list, an empty key
//! between commas) is not a match and stays in the text untouched.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

/// One occurrence of a citation command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationRequest {
    /// Keys in the order written, trimmed; inner spaces are kept
    pub keys: Vec<String>,
    /// Text of the `[note]`, verbatim
    pub note: Option<String>,
    /// Byte range of the whole command in the scanned text
    pub span: Range<usize>,
}

/// Scan `text` for citation commands, left to right.
///
/// The returned iterator is lazy and can be cloned to restart from the
/// current position.
pub fn scan(text: &str) -> CitationScan<'_> {
    CitationScan { text, pos: 0 }
}

#[derive(Debug, Clone)]
pub struct CitationScan<'t> {
    text: &'t str,
    pos: usize,
}

impl<'t> Iterator for CitationScan<'t> {
    type Item = CitationRequest;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.text.len() {
            let caps = CITE_RE.captures_at(self.text, self.pos)?;
            let full = caps.get(0)?;

            match caps.get(2).and_then(|m| parse_keys(m.as_str())) {
                Some(keys) => {
                    self.pos = full.end();
                    let note = caps
                        .get(1)
                        .map(|m| m.as_str())
                        .filter(|note| !note.trim().is_empty())
                        .map(str::to_string);
                    return Some(CitationRequest {
                        keys,
                        note,
                        span: full.range(),
                    });
                }
                // Rejected: resume just past the backslash so a command
                // inside a rejected note can still match.
                None => self.pos = full.start() + 1,
            }
        }
        None
    }
}

fn parse_keys(list: &str) -> Option<Vec<String>> {
    let keys: Vec<String> = list.split(',').map(|k| k.trim().to_string()).collect();
    if keys.iter().any(String::is_empty) {
        None
    } else {
        Some(keys)
    }
}

static CITE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\cite(?:\[([^\]]*)\])?\{([^{}]*)\}").expect("valid citation regex")
});
