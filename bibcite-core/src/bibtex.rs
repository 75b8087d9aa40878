//! BibTeX source reading on top of `biblatex`.
//!
//! A source is cut into records at every line that starts with `@`. Each
//! record is parsed on its own with the `@string` definitions seen so far in
//! front of it, so a record that cannot be read only loses itself: it is
//! reported with its line number and reading resumes at the next record.

use biblatex::{Chunk, ChunksExt, Person, RawBibliography, Spanned, Type};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use thiserror::Error;

/// Why a record could not be read
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    #[error("{0}")]
    Syntax(String),

    #[error("missing citation key")]
    MissingKey,

    #[error("field `{0}` appears more than once")]
    DuplicateField(String),
}

/// A record as written in the source, before typing
#[derive(Debug, Clone)]
pub struct RawEntry {
    /// Lower-cased record type (`article`, `book`, ...)
    pub entry_type: String,
    pub key: String,
    /// Lower-cased field names with plain-text values
    pub fields: Vec<(String, String)>,
    /// Parsed name lists (`author`, `editor`)
    pub names: Vec<(String, Vec<Person>)>,
    /// 1-based line of the record's `@`
    pub line: usize,
}

/// A record that was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawError {
    pub line: usize,
    /// Key, when the record header names one
    pub key: Option<String>,
    pub reason: MalformedReason,
}

/// Everything read from one source text
#[derive(Debug, Default)]
pub struct ParsedSource {
    pub entries: Vec<RawEntry>,
    pub errors: Vec<RawError>,
}

const NAME_FIELDS: [&str; 2] = ["author", "editor"];

const MONTHS: [(&str, &str); 12] = [
    ("jan", "January"),
    ("feb", "February"),
    ("mar", "March"),
    ("apr", "April"),
    ("may", "May"),
    ("jun", "June"),
    ("jul", "July"),
    ("aug", "August"),
    ("sep", "September"),
    ("oct", "October"),
    ("nov", "November"),
    ("dec", "December"),
];

/// `@string` definitions for the standard month macros
static MONTH_MACROS: Lazy<String> = Lazy::new(|| {
    MONTHS
        .iter()
        .map(|(abbrev, name)| format!("@string{{{} = {{{}}}}}\n", abbrev, name))
        .collect()
});

/// Read every record in `text`.
pub fn parse(text: &str) -> ParsedSource {
    let mut out = ParsedSource::default();
    let mut macros = String::new();

    let starts = record_starts(text);
    for (idx, &(start, line)) in starts.iter().enumerate() {
        let end = starts.get(idx + 1).map_or(text.len(), |&(next, _)| next);
        let record = &text[start..end];

        let Some(header) = Header::read(record) else {
            continue;
        };
        match header.kind.as_str() {
            "comment" | "preamble" => {}
            "string" => match RawBibliography::parse(record) {
                Ok(_) => {
                    macros.push_str(record.trim_end());
                    macros.push('\n');
                }
                Err(err) => out.errors.push(RawError {
                    line,
                    key: None,
                    reason: MalformedReason::Syntax(err.kind.to_string()),
                }),
            },
            _ => match read_record(&macros, record, line) {
                Ok(entries) => out.entries.extend(entries),
                Err(reason) => out.errors.push(RawError {
                    line,
                    key: header.key,
                    reason,
                }),
            },
        }
    }

    out
}

/// Split a name list such as `Doe, Jane and John Smith` into people.
pub fn parse_names(text: &str) -> Vec<Person> {
    let chunks = [Spanned::new(Chunk::Normal(text.to_string()), 0..text.len())];
    names_from_chunks(&chunks)
}

fn names_from_chunks(chunks: &[Spanned<Chunk>]) -> Vec<Person> {
    Vec::<Person>::from_chunks(chunks).unwrap_or_default()
}

/// Parse one record with the macros it may refer to.
fn read_record(
    macros: &str,
    record: &str,
    line: usize,
) -> Result<Vec<RawEntry>, MalformedReason> {
    let source = format!("{}{}{}", *MONTH_MACROS, macros, record);
    let syntax = |err: biblatex::ParseError| MalformedReason::Syntax(err.kind.to_string());

    // Field names are checked on the raw form; the resolved form keeps only
    // the last value of a repeated field.
    let raw = RawBibliography::parse(&source).map_err(syntax)?;
    if raw.entries.is_empty() {
        return Err(MalformedReason::MissingKey);
    }
    for entry in &raw.entries {
        if entry.v.key.v.trim().is_empty() {
            return Err(MalformedReason::MissingKey);
        }
        let mut seen = HashSet::new();
        for pair in &entry.v.fields {
            let name = pair.key.v.to_ascii_lowercase();
            if !seen.insert(name.clone()) {
                return Err(MalformedReason::DuplicateField(name));
            }
        }
    }

    let resolved = biblatex::Bibliography::parse(&source).map_err(syntax)?;
    let entries = raw
        .entries
        .iter()
        .filter_map(|raw_entry| {
            let entry = resolved.get(raw_entry.v.key.v)?;
            Some(RawEntry {
                entry_type: raw_entry.v.kind.v.to_ascii_lowercase(),
                key: entry.key.clone(),
                fields: entry
                    .fields
                    .iter()
                    .map(|(name, chunks)| (name.to_ascii_lowercase(), field_text(name, chunks)))
                    .collect(),
                names: entry
                    .fields
                    .iter()
                    .filter(|(name, _)| NAME_FIELDS.contains(&name.as_str()))
                    .map(|(name, chunks)| (name.clone(), names_from_chunks(chunks)))
                    .collect(),
                line,
            })
        })
        .collect();
    Ok(entries)
}

fn field_text(name: &str, chunks: &[Spanned<Chunk>]) -> String {
    let value = normalize_ws(&chunks.format_verbatim());
    if name.eq_ignore_ascii_case("month") {
        if let Some(month) = month_name(&value) {
            return month.to_string();
        }
    }
    value
}

/// Type and key named by a record's first line
struct Header {
    kind: String,
    key: Option<String>,
}

impl Header {
    /// `None` when the `@` does not open a record (free text).
    fn read(record: &str) -> Option<Self> {
        let rest = record.strip_prefix('@')?;
        let kind_len = rest
            .find(|c: char| c.is_whitespace() || c == '{' || c == '(')
            .unwrap_or(rest.len());
        let kind = rest[..kind_len].to_ascii_lowercase();
        let body = rest[kind_len..].trim_start();
        let close = match body.chars().next()? {
            '{' => '}',
            '(' => ')',
            _ => return None,
        };
        if kind.is_empty() {
            return None;
        }

        let body = body[1..].trim_start();
        let key_len = body
            .find(|c: char| c.is_whitespace() || ",{}()=\"#".contains(c))
            .unwrap_or(body.len());
        let after = body[key_len..].trim_start();
        let key = (key_len > 0 && (after.starts_with(',') || after.starts_with(close)))
            .then(|| body[..key_len].to_string());

        Some(Self { kind, key })
    }
}

/// Offset and 1-based line of every line that starts with `@` (after
/// optional indentation).
fn record_starts(text: &str) -> Vec<(usize, usize)> {
    let mut starts = Vec::new();
    let mut offset = 0;
    for (idx, line) in text.split_inclusive('\n').enumerate() {
        let indent = line.len() - line.trim_start_matches([' ', '\t', '\r']).len();
        if line[indent..].starts_with('@') {
            starts.push((offset + indent, idx + 1));
        }
        offset += line.len();
    }
    starts
}

fn normalize_ws(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Full month name for an abbreviation or a month number.
fn month_name(value: &str) -> Option<&'static str> {
    let lowered = value.to_ascii_lowercase();
    if let Ok(number) = lowered.parse::<usize>() {
        return MONTHS.get(number.checked_sub(1)?).map(|(_, name)| *name);
    }
    MONTHS
        .iter()
        .find(|(abbrev, _)| *abbrev == lowered)
        .map(|(_, name)| *name)
}
