//! Inline marker and bibliography rendering.
//!
//! Output is Markdown footnote syntax: a marker is `[^label]` and a
//! bibliography line is `[^label]: text`. Entries follow one fixed layout per
//! entry type, modelled on BibTeX's `plain` style: sentences separated by
//! `. `, container titles in italics, missing fields left out.

use crate::bibliography::{BibEntry, EntryKind};
use crate::resolver::ResolvedCitation;
use biblatex::Person;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("footnote_format must contain the {{number}} placeholder, got {0:?}")]
pub struct FootnoteFormatError(pub String);

/// Template for footnote labels, e.g. `{number}` or `ref-{number}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootnoteFormat(String);

impl FootnoteFormat {
    pub fn new(template: impl Into<String>) -> Result<Self, FootnoteFormatError> {
        let template = template.into();
        if template.contains("{number}") {
            Ok(Self(template))
        } else {
            Err(FootnoteFormatError(template))
        }
    }

    pub fn label(&self, number: usize) -> String {
        self.0.replace("{number}", &number.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The same template with `prefix` in front of every label
    pub fn prefixed(&self, prefix: &str) -> Self {
        Self(format!("{}{}", prefix, self.0))
    }
}

impl Default for FootnoteFormat {
    fn default() -> Self {
        Self(String::from("{number}"))
    }
}

/// Markers for one citation command, followed by its note.
pub fn format_inline(
    citations: &[ResolvedCitation<'_>],
    note: Option<&str>,
    footnotes: &FootnoteFormat,
) -> String {
    let mut out: String = citations
        .iter()
        .map(|c| format!("[^{}]", footnotes.label(c.number)))
        .collect();

    if let Some(note) = note {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push('(');
        out.push_str(note.trim());
        out.push(')');
    }

    out
}

/// Bibliography block: one footnote definition per `(number, entry)`, in
/// the order given.
pub fn format_bibliography<'a>(
    entries: impl IntoIterator<Item = (usize, &'a BibEntry)>,
    footnotes: &FootnoteFormat,
) -> String {
    entries
        .into_iter()
        .map(|(number, entry)| {
            format!(
                "[^{}]: {}",
                footnotes.label(number),
                format_bibliography_item(entry)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One bibliography line for `entry`.
pub fn format_bibliography_item(entry: &BibEntry) -> String {
    let mut sentences: Vec<String> = match entry.kind() {
        EntryKind::Article => article(entry),
        EntryKind::Book | EntryKind::Booklet | EntryKind::Manual | EntryKind::InBook => {
            book(entry)
        }
        EntryKind::InCollection | EntryKind::InProceedings => contribution(entry),
        EntryKind::MastersThesis => thesis(entry, "Master's thesis"),
        EntryKind::PhdThesis => thesis(entry, "PhD thesis"),
        EntryKind::TechReport => report(entry),
        EntryKind::Unpublished | EntryKind::Online | EntryKind::Misc | EntryKind::Other(_) => {
            misc(entry)
        }
    }
    .into_iter()
    .flatten()
    .collect();

    if ["author", "editor", "title"]
        .iter()
        .all(|name| text(entry, name).is_none())
    {
        sentences.insert(0, entry.key().to_string());
    }

    sentences.extend(link(entry));
    join_sentences(&sentences)
}

fn article(entry: &BibEntry) -> Vec<Option<String>> {
    let volume = match (
        text(entry, "volume"),
        text(entry, "number"),
        pages(entry),
    ) {
        (Some(volume), number, pages) => Some(format!(
            "{}{}{}",
            volume,
            number.map(|n| format!("({})", n)).unwrap_or_default(),
            pages.map(|p| format!(":{}", p)).unwrap_or_default()
        )),
        (None, _, Some(pages)) => Some(pages_phrase(&pages)),
        (None, _, None) => None,
    };

    vec![
        authors(entry),
        text(entry, "title"),
        sentence([text(entry, "journal").map(italic), volume, date(entry)]),
    ]
}

fn book(entry: &BibEntry) -> Vec<Option<String>> {
    vec![
        authors(entry).or_else(|| editors(entry)),
        text(entry, "title").map(italic),
        volume_of_series(entry),
        sentence([
            text(entry, "chapter").map(|c| format!("chapter {}", c)),
            pages(entry).map(|p| pages_phrase(&p)),
        ]),
        sentence([
            text(entry, "publisher")
                .or_else(|| text(entry, "organization"))
                .or_else(|| text(entry, "howpublished")),
            text(entry, "address"),
            text(entry, "edition").map(|e| format!("{} edition", e)),
            date(entry),
        ]),
    ]
}

fn contribution(entry: &BibEntry) -> Vec<Option<String>> {
    let editors = editors(entry);
    let booktitle = text(entry, "booktitle").map(italic);
    let pages = pages(entry).map(|p| pages_phrase(&p));

    let container = if editors.is_some() || booktitle.is_some() {
        sentence([
            editors,
            booktitle,
            volume_of_series(entry),
            pages,
            text(entry, "address"),
            date(entry),
        ])
        .map(|s| format!("In {}", s))
    } else {
        sentence([pages, text(entry, "address"), date(entry)])
    };

    vec![
        authors(entry),
        text(entry, "title"),
        container,
        sentence([text(entry, "organization"), text(entry, "publisher")]),
    ]
}

fn thesis(entry: &BibEntry, label: &str) -> Vec<Option<String>> {
    vec![
        authors(entry),
        text(entry, "title"),
        sentence([
            Some(text(entry, "type").unwrap_or_else(|| label.to_string())),
            text(entry, "school"),
            text(entry, "address"),
            date(entry),
        ]),
    ]
}

fn report(entry: &BibEntry) -> Vec<Option<String>> {
    let kind = text(entry, "type").unwrap_or_else(|| String::from("Technical Report"));
    let designation = match text(entry, "number") {
        Some(number) => format!("{} {}", kind, number),
        None => kind,
    };

    vec![
        authors(entry),
        text(entry, "title"),
        sentence([
            Some(designation),
            text(entry, "institution"),
            text(entry, "address"),
            date(entry),
        ]),
    ]
}

fn misc(entry: &BibEntry) -> Vec<Option<String>> {
    vec![
        authors(entry).or_else(|| editors(entry)),
        text(entry, "title"),
        sentence([
            text(entry, "howpublished"),
            text(entry, "organization").or_else(|| text(entry, "publisher")),
            date(entry),
        ]),
        text(entry, "note"),
    ]
}

fn link(entry: &BibEntry) -> Option<String> {
    if let Some(url) = text(entry, "url") {
        Some(format!("URL: <{}>", url))
    } else {
        text(entry, "doi").map(|doi| format!("doi:[{0}](https://doi.org/{0})", doi))
    }
}

/// Join the present parts with `, `
fn sentence<const N: usize>(parts: [Option<String>; N]) -> Option<String> {
    let parts: Vec<String> = parts.into_iter().flatten().collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

fn join_sentences(sentences: &[String]) -> String {
    let mut out = String::new();
    for sentence in sentences.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(sentence);
        if !sentence.ends_with(['.', '?', '!']) {
            out.push('.');
        }
    }
    out
}

fn text(entry: &BibEntry, name: &str) -> Option<String> {
    entry
        .field(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn italic(value: String) -> String {
    format!("*{}*", value)
}

fn date(entry: &BibEntry) -> Option<String> {
    match (text(entry, "month"), text(entry, "year")) {
        (Some(month), Some(year)) => Some(format!("{} {}", month, year)),
        (None, Some(year)) => Some(year),
        _ => None,
    }
}

fn pages(entry: &BibEntry) -> Option<String> {
    text(entry, "pages").map(|p| {
        p.split('-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\u{2013}")
    })
}

fn pages_phrase(pages: &str) -> String {
    if pages.contains(['\u{2013}', ',']) {
        format!("pages {}", pages)
    } else {
        format!("page {}", pages)
    }
}

fn volume_of_series(entry: &BibEntry) -> Option<String> {
    match (text(entry, "volume"), text(entry, "series")) {
        (Some(volume), Some(series)) => Some(format!("volume {} of *{}*", volume, series)),
        (Some(volume), None) => Some(format!("volume {}", volume)),
        (None, Some(series)) => Some(series),
        (None, None) => None,
    }
}

fn authors(entry: &BibEntry) -> Option<String> {
    format_names(entry.names("author")).map(|(names, _)| names)
}

fn editors(entry: &BibEntry) -> Option<String> {
    let (names, count) = format_names(entry.names("editor"))?;
    Some(if count > 1 {
        format!("{}, editors", names)
    } else {
        format!("{}, editor", names)
    })
}

/// Render a name list; also returns how many people it names.
fn format_names(people: &[Person]) -> Option<(String, usize)> {
    let (people, et_al) = match people {
        [rest @ .., last] if is_others(last) => (rest, true),
        all => (all, false),
    };

    let names: Vec<String> = people
        .iter()
        .map(display_name)
        .filter(|n| !n.is_empty())
        .collect();

    let joined = match names.as_slice() {
        [] => return None,
        _ if et_al => format!("{} et al.", names.join(", ")),
        [only] => only.clone(),
        [first, second] => format!("{} and {}", first, second),
        [rest @ .., last] => format!("{}, and {}", rest.join(", "), last),
    };
    let count = names.len() + usize::from(et_al);
    Some((joined, count))
}

/// `others` closing a name list stands for further authors
fn is_others(person: &Person) -> bool {
    person.given_name.is_empty() && person.name.trim().eq_ignore_ascii_case("others")
}

/// Given names first, then the `von` part, family name and `Jr` part.
fn display_name(person: &Person) -> String {
    let mut name = [&person.given_name, &person.prefix, &person.name]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if !person.suffix.trim().is_empty() {
        name.push_str(", ");
        name.push_str(person.suffix.trim());
    }
    name
}
