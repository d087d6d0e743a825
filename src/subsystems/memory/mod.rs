//! Memory subsystem: namespace-scoped document stores.
//!
//! Each namespace gets one [`DocStore`]; the [`DocStoreRegistry`] keeps them
//! apart. With the `local_fs` backend the layout under the work dir is:
//!
//! ```text
//! {work_dir}/
//! └── docstore/
//!     └── {namespace}/
//!         ├── 1.json
//!         └── 2.json
//! ```

pub mod doc_map;
pub mod docstore;
pub mod document;
pub mod store;
pub mod stores;

pub use doc_map::{DOCMAP_LIMIT, DocMap, DocStoreError};
pub use docstore::{AddOutcome, DocStore, DocStoreState};
pub use document::{DEFAULT_NAMESPACE, DocId, Document};
pub use store::DocBackend;

use std::collections::HashMap;

use tracing::info;

use crate::error::AppError;

/// Namespace -> store. Namespaces are unique.
pub struct DocStoreRegistry<B: DocBackend> {
    stores: HashMap<String, DocStore<B>>,
}

impl<B: DocBackend> Default for DocStoreRegistry<B> {
    fn default() -> Self {
        Self { stores: HashMap::new() }
    }
}

impl<B: DocBackend> DocStoreRegistry<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `store` under its namespace. A second store for the same
    /// namespace is rejected and the registry is left unchanged.
    pub fn register(&mut self, store: DocStore<B>) -> Result<(), AppError> {
        let namespace = store.namespace().to_string();
        if self.stores.contains_key(&namespace) {
            return Err(AppError::Memory(format!("collision on namespace {namespace}")));
        }
        info!(%namespace, "docstore registered");
        self.stores.insert(namespace, store);
        Ok(())
    }

    pub fn get(&self, namespace: &str) -> Option<&DocStore<B>> {
        self.stores.get(namespace)
    }

    pub fn get_mut(&mut self, namespace: &str) -> Option<&mut DocStore<B>> {
        self.stores.get_mut(namespace)
    }

    pub fn namespaces(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stores.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Every store's live doc map, keyed by namespace.
    pub fn get_doc_maps(&self) -> HashMap<&str, &DocMap> {
        self.stores
            .iter()
            .map(|(ns, store)| (ns.as_str(), store.doc_map()))
            .collect()
    }

    /// Save every registered store. Stops at the first failure.
    pub fn save_all(&self) -> Result<(), AppError> {
        for store in self.stores.values() {
            store.save_all_to_remote()?;
        }
        Ok(())
    }
}
