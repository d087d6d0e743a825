//! Backend trait: where a [`DocStore`](super::docstore::DocStore) keeps its
//! documents between runs.
//!
//! A backend is namespace-aware: every call names the namespace it acts on,
//! so one backend instance can serve several stores. Backends do blocking
//! I/O and know nothing about the doc map's invariants.

use crate::error::AppError;

use super::document::{DocId, Document};

pub trait DocBackend: Send + Sync {
    /// Unique type name for this backend (e.g. `"local_fs"`).
    fn backend_type(&self) -> &str;

    /// Prepare storage for `namespace` (create directories etc.).
    fn init(&self, namespace: &str) -> Result<(), AppError>;

    /// Names of every candidate file in `namespace`, sorted.
    fn list_files(&self, namespace: &str) -> Result<Vec<String>, AppError>;

    fn read_file(&self, namespace: &str, file_name: &str) -> Result<String, AppError>;

    /// Write `doc` to `{id}.json`, replacing any previous content.
    fn write_document(&self, namespace: &str, doc: &Document) -> Result<(), AppError>;

    /// Remove the backing file for `id`. Returns `false` when there was none.
    fn remove_document(&self, namespace: &str, id: DocId) -> Result<bool, AppError>;
}

impl<B: DocBackend + ?Sized> DocBackend for &B {
    fn backend_type(&self) -> &str {
        (**self).backend_type()
    }

    fn init(&self, namespace: &str) -> Result<(), AppError> {
        (**self).init(namespace)
    }

    fn list_files(&self, namespace: &str) -> Result<Vec<String>, AppError> {
        (**self).list_files(namespace)
    }

    fn read_file(&self, namespace: &str, file_name: &str) -> Result<String, AppError> {
        (**self).read_file(namespace, file_name)
    }

    fn write_document(&self, namespace: &str, doc: &Document) -> Result<(), AppError> {
        (**self).write_document(namespace, doc)
    }

    fn remove_document(&self, namespace: &str, id: DocId) -> Result<bool, AppError> {
        (**self).remove_document(namespace, id)
    }
}
