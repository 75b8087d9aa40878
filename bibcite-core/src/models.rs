//! Shared model structs: build diagnostics and page records.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Severity attached to a build diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// A non-fatal problem noticed during a build.
///
/// Fatal problems (bad configuration, duplicate keys) are returned as errors
/// instead; diagnostics only describe things the build recovered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable machine-readable code, e.g. `citation.missing`
    pub code: String,
    pub message: String,
    pub severity: DiagnosticSeverity,

    /// Page (relative path) the diagnostic was raised on, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,

    /// Bibliography source the diagnostic refers to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,

    /// 1-based line number inside `source_path`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,

    /// Citation key or record key involved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Diagnostic {
    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Warning, code, message)
    }

    /// A problem that cost the build part of its input
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Error, code, message)
    }

    fn new(
        severity: DiagnosticSeverity,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity,
            page: None,
            source_path: None,
            line: None,
            context: None,
        }
    }

    pub fn with_page(mut self, page: Option<&str>) -> Self {
        self.page = page.map(str::to_string);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>, line: Option<usize>) -> Self {
        self.source_path = Some(source.into());
        self.line = line;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// A documentation page read from disk, before rewriting
#[derive(Debug, Clone)]
pub struct Page {
    /// Path relative to the docs directory
    pub rel_path: PathBuf,
    /// Raw markdown source
    pub source: String,
}

impl Page {
    pub fn new(rel_path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            rel_path: rel_path.into(),
            source: source.into(),
        }
    }

    /// Display name used in logs and diagnostics
    pub fn name(&self) -> String {
        self.rel_path.to_string_lossy().replace('\\', "/")
    }
}

/// A page after citation and bibliography substitution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedPage {
    pub rel_path: PathBuf,
    pub markdown: String,
}
