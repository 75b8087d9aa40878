//! Bibliography loading and lookup for citation support.

use crate::bibtex::{self, MalformedReason, RawEntry};
use crate::models::Diagnostic;
use biblatex::Person;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::mem;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Duplicate bibliography key '{key}': first defined in {first}, defined again in {second}")]
    DuplicateKey {
        key: String,
        first: String,
        second: String,
    },

    #[error("No usable bibliography entries found in {sources}")]
    NoUsableEntries { sources: String },

    #[error("Failed to read bibliography {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A record that was skipped while loading; the rest of its source still loads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{source_name}:{line}: skipped malformed bibliography entry: {reason}")]
pub struct MalformedEntryError {
    pub source_name: String,
    pub line: usize,
    pub key: Option<String>,
    pub reason: MalformedReason,
}

impl MalformedEntryError {
    fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::warning("bibliography.malformed_entry", self.to_string())
            .with_source(self.source_name.clone(), Some(self.line));
        match &self.key {
            Some(key) => diag.with_context(key.clone()),
            None => diag,
        }
    }
}

/// Record type, used to pick a formatting layout
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Article,
    Book,
    Booklet,
    InBook,
    InCollection,
    InProceedings,
    Manual,
    MastersThesis,
    PhdThesis,
    TechReport,
    Unpublished,
    Online,
    Misc,
    Other(String),
}

impl EntryKind {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "article" => EntryKind::Article,
            "book" => EntryKind::Book,
            "booklet" => EntryKind::Booklet,
            "inbook" => EntryKind::InBook,
            "incollection" => EntryKind::InCollection,
            "inproceedings" | "conference" => EntryKind::InProceedings,
            "manual" => EntryKind::Manual,
            "mastersthesis" => EntryKind::MastersThesis,
            "phdthesis" => EntryKind::PhdThesis,
            "techreport" => EntryKind::TechReport,
            "unpublished" => EntryKind::Unpublished,
            "online" | "electronic" | "www" => EntryKind::Online,
            "misc" => EntryKind::Misc,
            other => EntryKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EntryKind::Article => "article",
            EntryKind::Book => "book",
            EntryKind::Booklet => "booklet",
            EntryKind::InBook => "inbook",
            EntryKind::InCollection => "incollection",
            EntryKind::InProceedings => "inproceedings",
            EntryKind::Manual => "manual",
            EntryKind::MastersThesis => "mastersthesis",
            EntryKind::PhdThesis => "phdthesis",
            EntryKind::TechReport => "techreport",
            EntryKind::Unpublished => "unpublished",
            EntryKind::Online => "online",
            EntryKind::Misc => "misc",
            EntryKind::Other(name) => name,
        }
    }
}

/// One bibliographic record
#[derive(Debug, Clone)]
pub struct BibEntry {
    key: String,
    entry_type: EntryKind,
    fields: BTreeMap<String, String>,
    /// People named by `author` and `editor`
    names: BTreeMap<String, Vec<Person>>,
    source: String,
    line: usize,
}

// Names are derived from the fields they were parsed from.
impl PartialEq for BibEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.entry_type == other.entry_type
            && self.fields == other.fields
            && self.source == other.source
            && self.line == other.line
    }
}

impl Eq for BibEntry {}

impl BibEntry {
    /// Build an entry directly, outside of any source file.
    ///
    /// Values are plain text; `author` and `editor` are split into people
    /// on ` and `.
    pub fn new<K, V>(
        key: impl Into<String>,
        entry_type: EntryKind,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let fields: BTreeMap<String, String> = fields
            .into_iter()
            .map(|(k, v)| (k.into().to_ascii_lowercase(), v.into()))
            .collect();
        let names = fields
            .iter()
            .filter(|(name, _)| matches!(name.as_str(), "author" | "editor"))
            .map(|(name, value)| (name.clone(), bibtex::parse_names(value)))
            .collect();

        Self {
            key: key.into(),
            entry_type,
            fields,
            names,
            source: String::from("<memory>"),
            line: 0,
        }
    }

    fn from_raw(raw: RawEntry, source: &str) -> Self {
        Self {
            entry_type: EntryKind::from_name(&raw.entry_type),
            key: raw.key,
            fields: raw.fields.into_iter().collect(),
            names: raw.names.into_iter().collect(),
            source: source.to_string(),
            line: raw.line,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> &EntryKind {
        &self.entry_type
    }

    /// Field value by lower-case name
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// People listed in a name field, empty when the field is absent
    pub fn names(&self, field: &str) -> &[Person] {
        self.names.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Name of the source this entry was loaded from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn line(&self) -> usize {
        self.line
    }
}

/// All entries loaded for a build, keyed by citation key.
///
/// Read-only once loaded; iteration follows load order.
#[derive(Debug, Clone, Default)]
pub struct Bibliography {
    entries: Vec<BibEntry>,
    index: HashMap<String, usize>,
    diagnostics: Vec<Diagnostic>,
}

impl Bibliography {
    /// Parse `(source_name, text)` pairs in order.
    ///
    /// Malformed records are skipped and recorded as diagnostics. A key
    /// defined twice, or a load that yields no entries at all, is an error.
    pub fn load<I, N, T>(sources: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: AsRef<str>,
    {
        let mut bibliography = Bibliography::default();
        let mut names = Vec::new();

        for (name, text) in sources {
            let name = name.into();
            bibliography.add_source(&name, text.as_ref())?;
            names.push(name);
        }

        if bibliography.entries.is_empty() {
            let sources = if names.is_empty() {
                String::from("<no sources>")
            } else {
                names.join(", ")
            };
            return Err(LoadError::NoUsableEntries { sources });
        }

        Ok(bibliography)
    }

    /// Parse one source completely, then commit its entries.
    fn add_source(&mut self, name: &str, text: &str) -> Result<(), LoadError> {
        debug!("Parsing bibliography source {}", name);
        let parsed = bibtex::parse(text);

        let mut local: HashSet<&str> = HashSet::new();
        for raw in &parsed.entries {
            if let Some(&idx) = self.index.get(&raw.key) {
                return Err(LoadError::DuplicateKey {
                    key: raw.key.clone(),
                    first: self.entries[idx].source.clone(),
                    second: name.to_string(),
                });
            }
            if !local.insert(raw.key.as_str()) {
                return Err(LoadError::DuplicateKey {
                    key: raw.key.clone(),
                    first: name.to_string(),
                    second: name.to_string(),
                });
            }
        }

        for error in &parsed.errors {
            let error = MalformedEntryError {
                source_name: name.to_string(),
                line: error.line,
                key: error.key.clone(),
                reason: error.reason.clone(),
            };
            warn!("{}", error);
            self.diagnostics.push(error.to_diagnostic());
        }

        if parsed.entries.is_empty() && !parsed.errors.is_empty() {
            warn!("Bibliography {} has no usable entries", name);
            self.diagnostics.push(
                Diagnostic::error(
                    "bibliography.empty_source",
                    format!("Bibliography {} has no usable entries", name),
                )
                .with_source(name, None),
            );
        }

        let count = parsed.entries.len();
        for raw in parsed.entries {
            self.index.insert(raw.key.clone(), self.entries.len());
            self.entries.push(BibEntry::from_raw(raw, name));
        }
        debug!("Loaded {} entries from {}", count, name);

        Ok(())
    }

    /// Lookup a bibliography entry by key.
    pub fn get(&self, key: &str) -> Option<&BibEntry> {
        self.index.get(key).map(|&idx| &self.entries[idx])
    }

    /// Every entry, in the order first loaded.
    pub fn all(&self) -> std::slice::Iter<'_, BibEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Take accumulated diagnostics (clearing the internal buffer).
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        mem::take(&mut self.diagnostics)
    }
}
