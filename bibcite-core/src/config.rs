//! Configuration parsing and management.

use crate::format::{FootnoteFormat, FootnoteFormatError};
use crate::rewriter::RewriteOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Only one of bib_dir and bib_file may be set")]
    ConflictingSources,

    #[error("Remote bibliography sources are not supported: {0}")]
    RemoteSource(String),

    #[error("{field} does not exist: {}", .path.display())]
    NotFound { field: &'static str, path: PathBuf },

    #[error(transparent)]
    FootnoteFormat(#[from] FootnoteFormatError),
}

/// Main configuration struct matching the bibcite.yml schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory searched recursively for `.bib` files
    #[serde(default)]
    pub bib_dir: Option<PathBuf>,

    /// Single `.bib` file
    #[serde(default)]
    pub bib_file: Option<PathBuf>,

    #[serde(default = "default_bib_command")]
    pub bib_command: String,

    #[serde(default = "default_full_bib_command")]
    pub full_bib_command: String,

    #[serde(default = "default_true")]
    pub bib_by_default: bool,

    #[serde(default = "default_footnote_format")]
    pub footnote_format: String,

    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_jobs")]
    pub jobs: usize,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_bib_command() -> String {
    String::from(r"\bibliography")
}

fn default_full_bib_command() -> String {
    String::from(r"\full_bibliography")
}

fn default_true() -> bool {
    true
}

fn default_footnote_format() -> String {
    String::from("{number}")
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("docs")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("site")
}

fn default_jobs() -> usize {
    1
}

/// Where the bibliography is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BibSource {
    /// Every `.bib` file below a directory
    Dir(PathBuf),
    File(PathBuf),
}

impl Config {
    /// Config with defaults reading every `.bib` file below `dir`.
    pub fn for_bib_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            bib_dir: Some(dir.into()),
            bib_file: None,
            bib_command: default_bib_command(),
            full_bib_command: default_full_bib_command(),
            bib_by_default: true,
            footnote_format: default_footnote_format(),
            docs_dir: default_docs_dir(),
            output_dir: default_output_dir(),
            jobs: default_jobs(),
            config_path: None,
        }
    }

    /// Load configuration from a YAML file and validate it
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;

        // Store config file path for relative path resolution
        config.config_path = Some(path.to_path_buf());

        config.validate()?;
        Ok(config)
    }

    /// Check the bibliography source and footnote format.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let source = self.bib_source()?;
        let (field, path) = match &source {
            BibSource::Dir(path) => ("bib_dir", path),
            BibSource::File(path) => ("bib_file", path),
        };
        let exists = match &source {
            BibSource::Dir(path) => path.is_dir(),
            BibSource::File(path) => path.is_file(),
        };
        if !exists {
            return Err(ConfigError::NotFound {
                field,
                path: path.clone(),
            });
        }

        FootnoteFormat::new(self.footnote_format.as_str())?;
        Ok(())
    }

    /// The configured bibliography source, resolved relative to config file
    pub fn bib_source(&self) -> Result<BibSource, ConfigError> {
        match (&self.bib_dir, &self.bib_file) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingSources),
            (None, None) => Err(ConfigError::MissingField(String::from(
                "bib_dir or bib_file",
            ))),
            (Some(dir), None) => {
                reject_remote(dir)?;
                Ok(BibSource::Dir(self.resolve_path(dir)))
            }
            (None, Some(file)) => {
                reject_remote(file)?;
                Ok(BibSource::File(self.resolve_path(file)))
            }
        }
    }

    /// Get the pages directory, resolved relative to config file
    pub fn docs_dir(&self) -> PathBuf {
        self.resolve_path(&self.docs_dir)
    }

    /// Get the output directory, resolved relative to config file
    pub fn output_dir(&self) -> PathBuf {
        self.resolve_path(&self.output_dir)
    }

    /// Number of render threads (at least one)
    pub fn jobs(&self) -> usize {
        self.jobs.max(1)
    }

    pub fn rewrite_options(&self) -> Result<RewriteOptions, ConfigError> {
        Ok(RewriteOptions {
            bib_command: self.bib_command.clone(),
            full_bib_command: self.full_bib_command.clone(),
            bib_by_default: self.bib_by_default,
            footnote_format: FootnoteFormat::new(self.footnote_format.as_str())?,
        })
    }

    /// Resolve a path relative to the config file location
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(parent) = self.config_path.as_deref().and_then(Path::parent) {
            parent.join(path)
        } else {
            path.to_path_buf()
        }
    }
}

fn reject_remote(path: &Path) -> Result<(), ConfigError> {
    let raw = path.to_string_lossy();
    let lowered = raw.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        Err(ConfigError::RemoteSource(raw.into_owned()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, yaml: &str) -> PathBuf {
        let path = dir.path().join("bibcite.yml");
        fs::write(&path, yaml).unwrap();
        path
    }

    #[test]
    fn test_default_values() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("refs")).unwrap();
        let config = Config::from_file(write_config(&dir, "bib_dir: refs\n")).unwrap();

        assert_eq!(config.bib_command, r"\bibliography");
        assert_eq!(config.full_bib_command, r"\full_bibliography");
        assert!(config.bib_by_default);
        assert_eq!(config.footnote_format, "{number}");
        assert_eq!(config.jobs(), 1);
        assert_eq!(config.docs_dir(), dir.path().join("docs"));
        assert_eq!(config.output_dir(), dir.path().join("site"));
        assert_eq!(
            config.bib_source().unwrap(),
            BibSource::Dir(dir.path().join("refs"))
        );
    }

    #[test]
    fn test_overrides_and_rewrite_options() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("refs.bib"), "").unwrap();
        let config = Config::from_file(write_config(
            &dir,
            "bib_file: refs.bib\nbib_command: \"[[refs]]\"\nbib_by_default: false\nfootnote_format: \"cite-{number}\"\njobs: 0\n",
        ))
        .unwrap();

        let options = config.rewrite_options().unwrap();
        assert_eq!(options.bib_command, "[[refs]]");
        assert!(!options.bib_by_default);
        assert_eq!(options.footnote_format.label(4), "cite-4");
        assert_eq!(config.jobs(), 1);
        assert_eq!(
            config.bib_source().unwrap(),
            BibSource::File(dir.path().join("refs.bib"))
        );
    }

    #[test]
    fn test_source_is_required() {
        let dir = TempDir::new().unwrap();
        let err = Config::from_file(write_config(&dir, "docs_dir: pages\n")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn test_both_sources_rejected() {
        let mut config = Config::for_bib_dir("refs");
        config.bib_file = Some(PathBuf::from("refs.bib"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ConflictingSources)
        ));
    }

    #[test]
    fn test_remote_source_rejected() {
        let mut config = Config::for_bib_dir("refs");
        config.bib_dir = None;
        config.bib_file = Some(PathBuf::from("https://example.org/refs.bib"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RemoteSource(_))
        ));
    }

    #[test]
    fn test_missing_directory_rejected() {
        let dir = TempDir::new().unwrap();
        let err = Config::from_file(write_config(&dir, "bib_dir: nowhere\n")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { field: "bib_dir", .. }));
    }

    #[test]
    fn test_footnote_format_needs_placeholder() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("refs")).unwrap();
        let err = Config::from_file(write_config(
            &dir,
            "bib_dir: refs\nfootnote_format: plain\n",
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::FootnoteFormat(_)));
    }
}
