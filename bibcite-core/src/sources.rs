//! Discovery of `.bib` files and Markdown pages on disk.

use crate::bibliography::{Bibliography, LoadError};
use crate::config::BibSource;
use crate::models::Page;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Files below `root` with the given extension, in sorted path order.
pub fn discover_files(root: &Path, extension: &str) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == extension))
        .map(|e| e.into_path())
        .collect()
}

/// Read every file of `source` and load them as one bibliography.
pub fn load_bibliography(source: &BibSource) -> Result<Bibliography, LoadError> {
    let paths = match source {
        BibSource::Dir(dir) => discover_files(dir, "bib"),
        BibSource::File(file) => vec![file.clone()],
    };
    debug!("Found {} bibliography files", paths.len());

    let mut texts = Vec::with_capacity(paths.len());
    for path in &paths {
        let name = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: name.clone(),
            source,
        })?;
        texts.push((name, text));
    }

    Bibliography::load(texts)
}

/// Read every `.md` page below `docs_dir`, in sorted path order.
pub fn load_pages(docs_dir: &Path) -> io::Result<Vec<Page>> {
    if !docs_dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("docs directory not found: {}", docs_dir.display()),
        ));
    }

    discover_files(docs_dir, "md")
        .into_iter()
        .map(|path| {
            let source = fs::read_to_string(&path)?;
            let rel = path.strip_prefix(docs_dir).unwrap_or(&path).to_path_buf();
            Ok(Page::new(rel, source))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discovery_is_sorted_and_recursive() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("b/nested")).unwrap();
        fs::write(dir.path().join("z.bib"), "").unwrap();
        fs::write(dir.path().join("a.bib"), "").unwrap();
        fs::write(dir.path().join("b/nested/m.bib"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let found: Vec<PathBuf> = discover_files(dir.path(), "bib")
            .into_iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            found,
            vec![
                PathBuf::from("a.bib"),
                PathBuf::from("b/nested/m.bib"),
                PathBuf::from("z.bib"),
            ]
        );
    }

    #[test]
    fn test_load_directory_in_path_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("2.bib"), "@misc{second, title = {S}}").unwrap();
        fs::write(dir.path().join("1.bib"), "@misc{first, title = {F}}").unwrap();

        let bib = load_bibliography(&BibSource::Dir(dir.path().to_path_buf())).unwrap();
        let keys: Vec<&str> = bib.all().map(|e| e.key()).collect();
        assert_eq!(keys, vec!["first", "second"]);
    }

    #[test]
    fn test_duplicate_key_names_both_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.bib"), "@book{smith2020, title = {A}}").unwrap();
        fs::write(dir.path().join("b.bib"), "@book{smith2020, title = {B}}").unwrap();

        let err = load_bibliography(&BibSource::Dir(dir.path().to_path_buf())).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, LoadError::DuplicateKey { .. }));
        assert!(message.contains("smith2020"));
        assert!(message.contains("a.bib"));
        assert!(message.contains("b.bib"));
    }

    #[test]
    fn test_empty_directory_has_no_usable_entries() {
        let dir = TempDir::new().unwrap();
        let err = load_bibliography(&BibSource::Dir(dir.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, LoadError::NoUsableEntries { .. }));
    }

    #[test]
    fn test_unreadable_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.bib");
        let err = load_bibliography(&BibSource::File(missing)).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_pages_are_relative_to_docs_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("guide")).unwrap();
        fs::write(dir.path().join("index.md"), "home").unwrap();
        fs::write(dir.path().join("guide/setup.md"), "setup").unwrap();
        fs::write(dir.path().join("logo.png"), "").unwrap();

        let pages = load_pages(dir.path()).unwrap();
        let names: Vec<String> = pages.iter().map(Page::name).collect();
        assert_eq!(names, vec!["guide/setup.md", "index.md"]);
        assert_eq!(pages[1].source, "home");
    }

    #[test]
    fn test_missing_docs_dir() {
        let dir = TempDir::new().unwrap();
        let err = load_pages(&dir.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
