//! Directory document loader

use std::io;
use std::path::{Path, PathBuf};

use glob::Pattern;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::{Document, DocumentSource};

/// Loads every file under a directory whose relative path matches a glob
pub struct DocumentLoader {
    /// Root directory
    root: PathBuf,
    /// Pattern matched against paths relative to `root`
    pattern: Pattern,
}

impl DocumentLoader {
    /// Create a loader for `root` matching `pattern` (e.g. `*.csv`)
    pub fn new(root: impl Into<PathBuf>, pattern: &str) -> Result<Self> {
        let pattern = Pattern::new(pattern)
            .map_err(|e| Error::config(format!("Invalid file pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            root: root.into(),
            pattern,
        })
    }

    /// Load all matching documents, in sorted path order
    pub fn load(&self) -> Result<Vec<Document>> {
        // Surface a missing or unreadable root before walking
        std::fs::read_dir(&self.root).map_err(|e| with_path(e, &self.root))?;

        let mut documents = Vec::new();
        let mut files = 0usize;

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            if !self.pattern.matches_path(relative) {
                continue;
            }

            let shown_path = relative.to_string_lossy().replace('\\', "/");
            let loaded = Self::load_file(entry.path(), &shown_path)?;
            tracing::debug!("Loaded {} document(s) from {}", loaded.len(), shown_path);

            files += 1;
            documents.extend(loaded);
        }

        tracing::info!(
            "Loaded {} document(s) from {} file(s) in {}",
            documents.len(),
            files,
            self.root.display()
        );

        Ok(documents)
    }

    /// Load one file, dispatching on its extension
    fn load_file(path: &Path, shown_path: &str) -> Result<Vec<Document>> {
        let is_csv = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);

        if is_csv {
            return Self::load_csv(path, shown_path);
        }

        let content = std::fs::read_to_string(path).map_err(|e| with_path(e, path))?;
        Ok(vec![Document::new(content, DocumentSource::file(shown_path))])
    }

    /// One document per data row, formatted as `header: value` lines
    fn load_csv(path: &Path, shown_path: &str) -> Result<Vec<Document>> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(e, path))?;
        let headers = reader.headers().map_err(|e| csv_error(e, path))?.clone();

        let mut documents = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Skipping malformed row {} in {}: {}", row, shown_path, e);
                    continue;
                }
            };

            let content = headers
                .iter()
                .zip(record.iter())
                .map(|(header, value)| format!("{}: {}", header.trim(), value.trim()))
                .collect::<Vec<_>>()
                .join("\n");

            documents.push(Document::new(content, DocumentSource::row(shown_path, row)));
        }

        Ok(documents)
    }
}

fn with_path(err: io::Error, path: &Path) -> Error {
    Error::Io(io::Error::new(
        err.kind(),
        format!("{}: {}", path.display(), err),
    ))
}

fn csv_error(err: csv::Error, path: &Path) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("{}: {}", path.display(), err),
    ))
}
