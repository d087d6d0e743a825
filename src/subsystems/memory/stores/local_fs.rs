//! `local_fs` backend: one JSON file per document on the local filesystem.
//!
//! ```text
//! {root}/
//! └── {namespace}/
//!     ├── 1.json
//!     └── 2.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::AppError;
use super::super::document::{DocId, Document, file_name_for};
use super::super::store::DocBackend;

#[derive(Debug, Clone)]
pub struct LocalFsBackend {
    root: PathBuf,
}

impl LocalFsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the files of `namespace`.
    pub fn doc_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }
}

impl DocBackend for LocalFsBackend {
    fn backend_type(&self) -> &str {
        "local_fs"
    }

    fn init(&self, namespace: &str) -> Result<(), AppError> {
        let dir = self.doc_dir(namespace);
        fs::create_dir_all(&dir)
            .map_err(|e| AppError::Memory(format!("cannot create {}: {e}", dir.display())))
    }

    fn list_files(&self, namespace: &str) -> Result<Vec<String>, AppError> {
        let dir = self.doc_dir(namespace);
        let entries = fs::read_dir(&dir)
            .map_err(|e| AppError::Memory(format!("cannot read {}: {e}", dir.display())))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                debug!(path = %entry.path().display(), "skipping non-file entry");
                continue;
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn read_file(&self, namespace: &str, file_name: &str) -> Result<String, AppError> {
        let path = self.doc_dir(namespace).join(file_name);
        fs::read_to_string(&path)
            .map_err(|e| AppError::Memory(format!("cannot read {}: {e}", path.display())))
    }

    fn write_document(&self, namespace: &str, doc: &Document) -> Result<(), AppError> {
        let file_name = doc
            .file_name()
            .ok_or_else(|| AppError::Memory(format!("cannot save '{}' without an id", doc.name)))?;
        let path = self.doc_dir(namespace).join(file_name);
        let text = doc.to_json()?;
        debug!(path = %path.display(), "saving document");
        fs::write(&path, text)?;
        Ok(())
    }

    fn remove_document(&self, namespace: &str, id: DocId) -> Result<bool, AppError> {
        let path = self.doc_dir(namespace).join(file_name_for(id));
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .map_err(|e| AppError::Memory(format!("cannot remove {}: {e}", path.display())))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_creates_namespace_dir() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalFsBackend::new(tmp.path());
        backend.init("default").unwrap();
        assert!(tmp.path().join("default").is_dir());
    }

    #[test]
    fn write_then_list_and_read() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalFsBackend::new(tmp.path());
        backend.init("ns").unwrap();

        backend.write_document("ns", &Document::new("b", "2").with_id(2)).unwrap();
        backend.write_document("ns", &Document::new("a", "1").with_id(1)).unwrap();
        fs::create_dir(tmp.path().join("ns").join("subdir")).unwrap();

        assert_eq!(backend.list_files("ns").unwrap(), vec!["1.json", "2.json"]);
        let text = backend.read_file("ns", "2.json").unwrap();
        assert!(text.contains("\"name\": \"b\""));
    }

    #[test]
    fn remove_reports_presence() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalFsBackend::new(tmp.path());
        backend.init("ns").unwrap();
        backend.write_document("ns", &Document::new("a", "1").with_id(1)).unwrap();

        assert!(backend.remove_document("ns", 1).unwrap());
        assert!(!backend.remove_document("ns", 1).unwrap());
        assert!(!tmp.path().join("ns").join("1.json").exists());
    }

    #[test]
    fn list_missing_namespace_errors() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalFsBackend::new(tmp.path());
        assert!(backend.list_files("never-initialised").is_err());
    }
}
