//! # bibcite-core
//!
//! Core library for the bibcite citation engine.
//!
//! This crate loads BibTeX sources, finds `\cite` commands in Markdown pages,
//! numbers the cited entries in first-citation order across a whole build, and
//! rewrites each page with footnote markers and a bibliography.

pub mod bibliography;
pub mod bibtex;
pub mod builder;
pub mod citations;
pub mod config;
pub mod format;
pub mod models;
pub mod resolver;
pub mod rewriter;
pub mod sources;

pub use bibliography::{BibEntry, Bibliography, EntryKind, LoadError};
pub use builder::{BuildError, BuildOutput, SiteBuilder};
pub use citations::{scan, CitationRequest};
pub use config::{BibSource, Config, ConfigError};
pub use format::FootnoteFormat;
pub use models::{Diagnostic, DiagnosticSeverity, Page, RenderedPage};
pub use resolver::{resolve, ResolutionState};
pub use rewriter::{process_full_bibliography, process_page, RewriteOptions};
