//! `DocMap`: the bounded id → document map behind every store.
//!
//! [`DocMap::insert`] is the strict insert path: it refuses to grow past
//! [`DOCMAP_LIMIT`] and refuses an id that is already taken. Either failure
//! leaves the map untouched.

use std::collections::BTreeMap;
use std::collections::btree_map;

use thiserror::Error;
use tracing::info;

use super::document::{DocId, Document};

/// Maximum number of documents a single map holds.
pub const DOCMAP_LIMIT: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocStoreError {
    #[error("doc map is full ({limit} documents)")]
    Overflow { limit: usize },

    #[error("document {0} already exists")]
    DuplicateId(DocId),

    #[error("document {0} does not exist")]
    NotFound(DocId),

    #[error("invalid file extension: {0}")]
    InvalidExtension(String),

    #[error("cannot parse {file}: {reason}")]
    Parse { file: String, reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct DocMap {
    docs: BTreeMap<DocId, Document>,
}

impl DocMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn get(&self, id: DocId) -> Option<&Document> {
        self.docs.get(&id)
    }

    pub fn contains(&self, id: DocId) -> bool {
        self.docs.contains_key(&id)
    }

    /// Documents in ascending id order.
    pub fn values(&self) -> btree_map::Values<'_, DocId, Document> {
        self.docs.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.docs.keys().copied()
    }

    /// Id the next id-less insert receives: highest key + 1, or 1 when empty.
    pub fn next_id(&self) -> DocId {
        self.docs.keys().next_back().map_or(1, |max| max + 1)
    }

    /// Strict insert. Assigns an id when `doc.id` is `None`.
    pub fn insert(&mut self, mut doc: Document) -> Result<DocId, DocStoreError> {
        if self.docs.len() >= DOCMAP_LIMIT {
            return Err(DocStoreError::Overflow { limit: DOCMAP_LIMIT });
        }

        let id = match doc.id {
            Some(id) if self.docs.contains_key(&id) => {
                return Err(DocStoreError::DuplicateId(id));
            }
            Some(id) => id,
            None => {
                let id = self.next_id();
                info!(doc_id = id, name = %doc.name, "generated id for document");
                doc.id = Some(id);
                id
            }
        };

        self.docs.insert(id, doc);
        Ok(id)
    }

    pub fn remove(&mut self, id: DocId) -> Result<Document, DocStoreError> {
        self.docs.remove(&id).ok_or(DocStoreError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(n: usize) -> DocMap {
        let mut map = DocMap::new();
        for i in 0..n {
            map.insert(Document::new(format!("doc {i}"), "x")).unwrap();
        }
        map
    }

    #[test]
    fn first_generated_id_is_one() {
        let mut map = DocMap::new();
        assert_eq!(map.insert(Document::new("a", "")).unwrap(), 1);
        assert_eq!(map.insert(Document::new("b", "")).unwrap(), 2);
    }

    #[test]
    fn generated_id_follows_max_key() {
        let mut map = DocMap::new();
        map.insert(Document::new("a", "").with_id(10)).unwrap();
        map.insert(Document::new("b", "").with_id(3)).unwrap();
        assert_eq!(map.insert(Document::new("c", "")).unwrap(), 11);
    }

    #[test]
    fn generated_id_is_written_into_document() {
        let mut map = DocMap::new();
        let id = map.insert(Document::new("a", "")).unwrap();
        assert_eq!(map.get(id).unwrap().id, Some(id));
    }

    #[test]
    fn duplicate_id_is_rejected_and_map_unchanged() {
        let mut map = DocMap::new();
        map.insert(Document::new("original", "").with_id(5)).unwrap();
        let err = map.insert(Document::new("intruder", "").with_id(5)).unwrap_err();
        assert_eq!(err, DocStoreError::DuplicateId(5));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(5).unwrap().name, "original");
    }

    #[test]
    fn overflow_at_limit_and_map_unchanged() {
        let mut map = filled(DOCMAP_LIMIT);
        let err = map.insert(Document::new("one more", "")).unwrap_err();
        assert_eq!(err, DocStoreError::Overflow { limit: DOCMAP_LIMIT });
        assert_eq!(map.len(), DOCMAP_LIMIT);
        // Explicit ids are capped too.
        let err = map.insert(Document::new("explicit", "").with_id(5000)).unwrap_err();
        assert!(matches!(err, DocStoreError::Overflow { .. }));
        assert!(!map.contains(5000));
    }

    #[test]
    fn remove_missing_is_not_found() {
        let mut map = filled(2);
        assert_eq!(map.remove(9).unwrap_err(), DocStoreError::NotFound(9));
        assert_eq!(map.remove(1).unwrap().name, "doc 0");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn values_are_in_id_order() {
        let mut map = DocMap::new();
        for id in [7, 2, 5] {
            map.insert(Document::new(id.to_string(), "").with_id(id)).unwrap();
        }
        let ids: Vec<_> = map.values().filter_map(|d| d.id).collect();
        assert_eq!(ids, vec![2, 5, 7]);
    }
}
