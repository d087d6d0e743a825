//! `tmp` backend: ephemeral in-memory document files.
//!
//! All data lives in process memory and is discarded when the process exits.
//! The namespace is used as a key so that several stores sharing the same
//! `TmpBackend` remain independent. `init` is a no-op.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::error::AppError;
use super::super::document::{DocId, Document, file_name_for};
use super::super::store::DocBackend;

/// In-memory backend: namespace -> file name -> file text.
#[derive(Default)]
pub struct TmpBackend {
    files: Mutex<HashMap<String, BTreeMap<String, String>>>,
}

impl TmpBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place raw text under `file_name`, as if another process had written it.
    pub fn put_file(&self, namespace: &str, file_name: &str, text: &str) -> Result<(), AppError> {
        let mut files = self.lock()?;
        files
            .entry(namespace.to_string())
            .or_default()
            .insert(file_name.to_string(), text.to_string());
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, BTreeMap<String, String>>>, AppError> {
        self.files
            .lock()
            .map_err(|_| AppError::Memory("tmp backend lock poisoned".into()))
    }
}

impl DocBackend for TmpBackend {
    fn backend_type(&self) -> &str {
        "tmp"
    }

    /// No-op: the tmp backend holds no files on disk.
    fn init(&self, _namespace: &str) -> Result<(), AppError> {
        Ok(())
    }

    fn list_files(&self, namespace: &str) -> Result<Vec<String>, AppError> {
        let files = self.lock()?;
        Ok(files
            .get(namespace)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn read_file(&self, namespace: &str, file_name: &str) -> Result<String, AppError> {
        let files = self.lock()?;
        files
            .get(namespace)
            .and_then(|m| m.get(file_name))
            .cloned()
            .ok_or_else(|| AppError::Memory(format!("tmp: no file {namespace}/{file_name}")))
    }

    fn write_document(&self, namespace: &str, doc: &Document) -> Result<(), AppError> {
        let file_name = doc
            .file_name()
            .ok_or_else(|| AppError::Memory(format!("cannot save '{}' without an id", doc.name)))?;
        let text = doc.to_json()?;
        self.put_file(namespace, &file_name, &text)
    }

    fn remove_document(&self, namespace: &str, id: DocId) -> Result<bool, AppError> {
        let mut files = self.lock()?;
        Ok(files
            .get_mut(namespace)
            .map(|m| m.remove(&file_name_for(id)).is_some())
            .unwrap_or(false))
    }
}
