//! `DocStore`: namespace-scoped document registry with pluggable persistence.
//!
//! Holds two maps, both owned by the store instance:
//!
//! * the **doc map** (id → document), bounded by
//!   [`DOCMAP_LIMIT`](super::doc_map::DOCMAP_LIMIT);
//! * the **file map** (file name → id), a secondary index used to make
//!   `add_document` at-most-once per backing artifact.
//!
//! Every mutation is applied in memory immediately; the backend is only
//! touched by [`refresh`](DocStore::refresh),
//! [`save_all_to_remote`](DocStore::save_all_to_remote) and delete.

use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use crate::error::AppError;

use super::doc_map::{DocMap, DocStoreError};
use super::document::{DocId, Document};
use super::store::DocBackend;

/// Result of [`DocStore::add_document`].
///
/// `AlreadyExisted` is not an error: adding the same file name or id twice
/// hands back the document that is already stored and changes nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Inserted(Document),
    AlreadyExisted(Document),
}

impl AddOutcome {
    pub fn document(&self) -> &Document {
        match self {
            AddOutcome::Inserted(doc) | AddOutcome::AlreadyExisted(doc) => doc,
        }
    }

    pub fn into_document(self) -> Document {
        match self {
            AddOutcome::Inserted(doc) | AddOutcome::AlreadyExisted(doc) => doc,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, AddOutcome::Inserted(_))
    }
}

/// Counts reported by [`DocStore::debug_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocStoreState {
    pub namespace: String,
    pub doc_count: usize,
    pub file_count: usize,
}

impl std::fmt::Display for DocStoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} document(s), {} tracked file(s)",
            self.namespace, self.doc_count, self.file_count
        )
    }
}

pub struct DocStore<B: DocBackend> {
    namespace: String,
    doc_map: DocMap,
    file_map: HashMap<String, DocId>,
    backend: B,
}

impl<B: DocBackend> DocStore<B> {
    /// Create an empty store for `namespace` and prepare its backend storage.
    /// Nothing is loaded until [`refresh`](Self::refresh).
    pub fn open(namespace: impl Into<String>, backend: B) -> Result<Self, AppError> {
        let namespace = namespace.into();
        if namespace.trim().is_empty() {
            return Err(AppError::Memory("docstore namespace must not be empty".into()));
        }
        backend.init(&namespace)?;
        info!(%namespace, backend = backend.backend_type(), "docstore opened");
        Ok(Self {
            namespace,
            doc_map: DocMap::new(),
            file_map: HashMap::new(),
            backend,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn file_map(&self) -> &HashMap<String, DocId> {
        &self.file_map
    }

    pub fn len(&self) -> usize {
        self.doc_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_map.is_empty()
    }

    pub fn get_document(&self, id: DocId) -> Option<&Document> {
        self.doc_map.get(id)
    }

    /// All documents, ascending by id.
    pub fn list_documents(&self) -> Vec<&Document> {
        self.doc_map.values().collect()
    }

    pub fn doc_map(&self) -> &DocMap {
        &self.doc_map
    }

    /// The live doc map, optionally refreshed from the backend first.
    pub fn get_doc_map(&mut self, refresh: bool) -> Result<&DocMap, AppError> {
        if refresh {
            self.refresh()?;
        }
        Ok(&self.doc_map)
    }

    /// Strict insert: fails on a full map or a taken id.
    pub fn insert(&mut self, mut doc: Document) -> Result<DocId, DocStoreError> {
        doc.namespace = self.namespace.clone();
        self.doc_map.insert(doc)
    }

    /// Add a document by name and content.
    ///
    /// Returns [`AddOutcome::AlreadyExisted`] when `file_name` is already
    /// indexed or the resolved id is taken. Errors only when the map is full.
    pub fn add_document(
        &mut self,
        name: &str,
        content: &str,
        id: Option<DocId>,
        file_name: Option<&str>,
    ) -> Result<AddOutcome, DocStoreError> {
        if let Some(file_name) = file_name {
            if let Some(existing) = self.file_map.get(file_name).and_then(|id| self.doc_map.get(*id)) {
                info!(namespace = %self.namespace, %file_name, doc_id = ?existing.id, "file already indexed, returning existing document");
                return Ok(AddOutcome::AlreadyExisted(existing.clone()));
            }
        }

        let id = id.unwrap_or_else(|| self.doc_map.next_id());
        if let Some(existing) = self.doc_map.get(id) {
            info!(namespace = %self.namespace, doc_id = id, "document already exists, returning existing document");
            return Ok(AddOutcome::AlreadyExisted(existing.clone()));
        }

        let mut doc = Document::new(name, content)
            .with_id(id)
            .with_namespace(self.namespace.clone());
        if let Some(file_name) = file_name {
            doc = doc.with_source_file(file_name);
        }
        self.doc_map.insert(doc.clone())?;

        if let Some(file_name) = file_name {
            self.file_map.insert(file_name.to_string(), id);
        }
        debug!(namespace = %self.namespace, doc_id = id, "document added");
        Ok(AddOutcome::Inserted(doc))
    }

    /// Remove `id` from the doc map, every file-map entry pointing at it, and
    /// its backing file. Returns `false` (and logs) when `id` is unknown.
    pub fn delete_document(&mut self, id: DocId) -> bool {
        if let Err(e) = self.doc_map.remove(id) {
            error!(namespace = %self.namespace, doc_id = id, "cannot delete document: {e}");
            return false;
        }
        self.file_map.retain(|_, mapped| *mapped != id);

        match self.backend.remove_document(&self.namespace, id) {
            Ok(_) => {}
            Err(e) => warn!(namespace = %self.namespace, doc_id = id, "backing file not removed: {e}"),
        }
        info!(namespace = %self.namespace, doc_id = id, "deleted document");
        true
    }

    /// Load backing files that are not yet indexed in the file map.
    ///
    /// Each loaded document is indexed under its backing file name and, when
    /// it was added with one, its source file key.
    ///
    /// A file that fails to read, parse, or insert is logged and skipped.
    /// Only listing the backend can fail the whole refresh. Returns the
    /// number of documents loaded.
    pub fn refresh(&mut self) -> Result<usize, AppError> {
        let files = self.backend.list_files(&self.namespace)?;
        let mut loaded = 0;

        for file_name in files {
            if self.file_map.contains_key(&file_name) {
                debug!(%file_name, "file already in file map, skipping");
                continue;
            }

            match self.load_file(&file_name) {
                Ok((id, source_file)) => {
                    self.file_map.insert(file_name.clone(), id);
                    if let Some(source_file) = source_file {
                        self.file_map.entry(source_file).or_insert(id);
                    }
                    loaded += 1;
                    debug!(%file_name, doc_id = id, "loaded document");
                }
                Err(AppError::DocStore(DocStoreError::InvalidExtension(_))) => {
                    debug!(%file_name, "skipping file without .json extension");
                }
                Err(AppError::DocStore(DocStoreError::DuplicateId(id))) => {
                    debug!(%file_name, doc_id = id, "document already loaded, skipping");
                }
                Err(e) => {
                    error!(namespace = %self.namespace, %file_name, "document failed to load: {e}");
                }
            }
        }

        info!(namespace = %self.namespace, loaded, total = self.doc_map.len(), "docstore refreshed");
        Ok(loaded)
    }

    fn load_file(&mut self, file_name: &str) -> Result<(DocId, Option<String>), AppError> {
        if !super::document::is_doc_file_name(file_name) {
            return Err(DocStoreError::InvalidExtension(file_name.to_string()).into());
        }
        let text = self.backend.read_file(&self.namespace, file_name)?;
        let doc = Document::from_file_contents(file_name, &text)?;
        let source_file = doc.source_file.clone();
        Ok((self.insert(doc)?, source_file))
    }

    /// Rewrite every document to the backend. Stops at the first I/O error.
    pub fn save_all_to_remote(&self) -> Result<(), AppError> {
        for doc in self.doc_map.values() {
            self.backend.write_document(&self.namespace, doc)?;
        }
        info!(namespace = %self.namespace, count = self.doc_map.len(), "saved all documents");
        Ok(())
    }

    /// Strict-insert `docs` in order, stopping at the first failure.
    pub fn seed(&mut self, docs: Vec<Document>) -> Result<usize, DocStoreError> {
        let mut count = 0;
        for doc in docs {
            self.insert(doc)?;
            count += 1;
        }
        info!(namespace = %self.namespace, count, "seeded docstore");
        Ok(count)
    }

    pub fn debug_state(&self) -> DocStoreState {
        let state = DocStoreState {
            namespace: self.namespace.clone(),
            doc_count: self.doc_map.len(),
            file_count: self.file_map.len(),
        };
        debug!(namespace = %state.namespace, docs = state.doc_count, files = state.file_count, "docstore state");
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::memory::doc_map::DOCMAP_LIMIT;
    use crate::subsystems::memory::document::sample_documents;
    use crate::subsystems::memory::stores::tmp::TmpBackend;

    fn store() -> DocStore<TmpBackend> {
        DocStore::open("test", TmpBackend::new()).unwrap()
    }

    #[test]
    fn empty_namespace_is_rejected() {
        assert!(DocStore::open("  ", TmpBackend::new()).is_err());
    }

    #[test]
    fn add_get_delete_scenario() {
        let mut s = store();
        let first = s.add_document("Notes", "body", None, None).unwrap();
        assert!(first.is_inserted());
        assert_eq!(first.document().id, Some(1));

        let second = s.add_document("More", "text", None, None).unwrap();
        assert_eq!(second.document().id, Some(2));

        assert!(s.delete_document(1));
        assert!(s.get_document(1).is_none());
        assert_eq!(s.get_document(2).unwrap().name, "More");
    }

    #[test]
    fn assigned_ids_strictly_increase() {
        let mut s = store();
        let mut last = 0;
        for i in 0..20 {
            let id = s
                .add_document(&format!("doc {i}"), "x", None, None)
                .unwrap()
                .document()
                .id
                .unwrap();
            assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn same_file_name_returns_same_document() {
        let mut s = store();
        let a = s.add_document("Report", "v1", None, Some("report.md")).unwrap();
        let b = s.add_document("Report again", "v2", None, Some("report.md")).unwrap();
        assert!(a.is_inserted());
        assert!(matches!(b, AddOutcome::AlreadyExisted(_)));
        assert_eq!(a.document(), b.document());
        assert_eq!(s.len(), 1);
        assert_eq!(s.file_map().get("report.md"), Some(&1));
    }

    #[test]
    fn explicit_existing_id_returns_existing_document() {
        let mut s = store();
        s.add_document("Original", "x", Some(7), None).unwrap();
        let again = s.add_document("Other", "y", Some(7), None).unwrap();
        assert!(!again.is_inserted());
        assert_eq!(again.document().name, "Original");
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn strict_insert_rejects_duplicate() {
        let mut s = store();
        s.insert(Document::new("a", "").with_id(3)).unwrap();
        let err = s.insert(Document::new("b", "").with_id(3)).unwrap_err();
        assert_eq!(err, DocStoreError::DuplicateId(3));
        assert_eq!(s.get_document(3).unwrap().name, "a");
    }

    #[test]
    fn add_past_capacity_overflows() {
        let mut s = store();
        for i in 0..DOCMAP_LIMIT {
            s.add_document(&format!("doc {i}"), "x", None, None).unwrap();
        }
        let err = s.add_document("fresh", "content", None, None).unwrap_err();
        assert_eq!(err, DocStoreError::Overflow { limit: DOCMAP_LIMIT });
        assert_eq!(s.len(), DOCMAP_LIMIT);
    }

    #[test]
    fn delete_missing_returns_false() {
        let mut s = store();
        s.add_document("a", "", None, None).unwrap();
        assert!(!s.delete_document(99));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn delete_clears_file_map_by_value() {
        let mut s = store();
        s.add_document("a", "", None, Some("a.md")).unwrap();
        s.add_document("b", "", None, Some("b.md")).unwrap();
        assert!(s.delete_document(1));
        assert!(!s.file_map().contains_key("a.md"));
        assert_eq!(s.file_map().get("b.md"), Some(&2));
    }

    #[test]
    fn inserted_documents_take_store_namespace() {
        let mut s = store();
        let id = s.insert(Document::new("a", "").with_namespace("elsewhere")).unwrap();
        assert_eq!(s.get_document(id).unwrap().namespace, "test");
    }

    #[test]
    fn save_then_refresh_into_fresh_store() {
        let backend = TmpBackend::new();
        {
            let mut s = DocStore::open("ns", &backend).unwrap();
            s.seed(sample_documents()).unwrap();
            s.save_all_to_remote().unwrap();
        }
        let mut fresh = DocStore::open("ns", &backend).unwrap();
        assert_eq!(fresh.refresh().unwrap(), 5);
        assert_eq!(fresh.get_document(1).unwrap().name, "Meeting Notes");
        assert_eq!(fresh.file_map().len(), 5);
    }

    #[test]
    fn refresh_skips_bad_files_and_keeps_going() {
        let backend = TmpBackend::new();
        backend.put_file("ns", "1.json", &Document::new("good", "x").with_id(1).to_json().unwrap()).unwrap();
        backend.put_file("ns", "2.json", "{ broken").unwrap();
        backend.put_file("ns", "notes.txt", "plain text").unwrap();
        backend.put_file("ns", "3.json", &Document::new("also good", "y").with_id(3).to_json().unwrap()).unwrap();

        let mut s = DocStore::open("ns", &backend).unwrap();
        assert_eq!(s.refresh().unwrap(), 2);
        assert_eq!(s.len(), 2);
        assert!(s.get_document(2).is_none());
    }

    #[test]
    fn refresh_skips_files_without_id() {
        let backend = TmpBackend::new();
        backend.put_file("ns", "5.json", r#"{"name": "no id", "content": "x"}"#).unwrap();
        backend.put_file("ns", "6.json", r#"{"name": "null id", "content": "x", "id": null}"#).unwrap();
        backend.put_file("ns", "7.json", r#"{"name": "legacy", "content": "x", "doc_id": 7}"#).unwrap();

        let mut s = DocStore::open("ns", &backend).unwrap();
        assert_eq!(s.refresh().unwrap(), 1);
        assert_eq!(s.get_document(7).unwrap().name, "legacy");
        assert!(s.get_document(1).is_none());
    }

    #[test]
    fn source_file_key_survives_reopen() {
        let backend = TmpBackend::new();
        {
            let mut s = DocStore::open("ns", &backend).unwrap();
            s.add_document("a.md", "alpha", None, Some("ATT1/a.md")).unwrap();
            s.save_all_to_remote().unwrap();
        }
        let mut s = DocStore::open("ns", &backend).unwrap();
        s.refresh().unwrap();
        assert_eq!(s.file_map().get("ATT1/a.md"), Some(&1));

        let again = s.add_document("a.md", "alpha", None, Some("ATT1/a.md")).unwrap();
        assert!(matches!(again, AddOutcome::AlreadyExisted(_)));
        assert_eq!(s.len(), 1);

        assert!(s.delete_document(1));
        assert!(s.file_map().is_empty());
    }

    #[test]
    fn refresh_twice_is_stable() {
        let backend = TmpBackend::new();
        backend.put_file("ns", "1.json", &Document::new("one", "x").with_id(1).to_json().unwrap()).unwrap();
        let mut s = DocStore::open("ns", &backend).unwrap();
        assert_eq!(s.refresh().unwrap(), 1);
        assert_eq!(s.refresh().unwrap(), 0);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn get_doc_map_with_refresh_loads() {
        let backend = TmpBackend::new();
        backend.put_file("ns", "4.json", &Document::new("four", "x").with_id(4).to_json().unwrap()).unwrap();
        let mut s = DocStore::open("ns", &backend).unwrap();
        assert!(s.get_doc_map(false).unwrap().is_empty());
        assert!(s.get_doc_map(true).unwrap().contains(4));
    }

    #[test]
    fn stores_do_not_share_maps() {
        let mut a = store();
        let b = store();
        a.add_document("only in a", "", None, Some("a.md")).unwrap();
        assert!(b.is_empty());
        assert!(b.file_map().is_empty());
    }

    #[test]
    fn debug_state_counts() {
        let mut s = store();
        s.add_document("a", "", None, Some("a.md")).unwrap();
        s.add_document("b", "", None, None).unwrap();
        let state = s.debug_state();
        assert_eq!(state.doc_count, 2);
        assert_eq!(state.file_count, 1);
        assert_eq!(state.namespace, "test");
    }
}
