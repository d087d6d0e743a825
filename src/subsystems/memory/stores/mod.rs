//! Docstore backend implementations.
//!
//! `build(config, work_dir)` is the factory: called at startup.
//! Adding a backend = new module + new variant + new match arms.

pub mod local_fs;
pub mod tmp;

use std::path::Path;

use crate::config::DocStoreConfig;
use crate::error::AppError;

use super::document::{DocId, Document};
use super::store::DocBackend;

/// All available backends, dispatched by enum.
pub enum Backend {
    LocalFs(local_fs::LocalFsBackend),
    Tmp(tmp::TmpBackend),
}

/// Construct the configured backend. Relative `root_dir`s resolve against
/// `work_dir`.
pub fn build(config: &DocStoreConfig, work_dir: &Path) -> Result<Backend, AppError> {
    match config.backend.as_str() {
        "local_fs" => {
            let root = if config.root_dir.is_absolute() {
                config.root_dir.clone()
            } else {
                work_dir.join(&config.root_dir)
            };
            Ok(Backend::LocalFs(local_fs::LocalFsBackend::new(root)))
        }
        "tmp" => Ok(Backend::Tmp(tmp::TmpBackend::new())),
        other => Err(AppError::Config(format!("unknown docstore backend: {other}"))),
    }
}

impl DocBackend for Backend {
    fn backend_type(&self) -> &str {
        match self {
            Backend::LocalFs(b) => b.backend_type(),
            Backend::Tmp(b) => b.backend_type(),
        }
    }

    fn init(&self, namespace: &str) -> Result<(), AppError> {
        match self {
            Backend::LocalFs(b) => b.init(namespace),
            Backend::Tmp(b) => b.init(namespace),
        }
    }

    fn list_files(&self, namespace: &str) -> Result<Vec<String>, AppError> {
        match self {
            Backend::LocalFs(b) => b.list_files(namespace),
            Backend::Tmp(b) => b.list_files(namespace),
        }
    }

    fn read_file(&self, namespace: &str, file_name: &str) -> Result<String, AppError> {
        match self {
            Backend::LocalFs(b) => b.read_file(namespace, file_name),
            Backend::Tmp(b) => b.read_file(namespace, file_name),
        }
    }

    fn write_document(&self, namespace: &str, doc: &Document) -> Result<(), AppError> {
        match self {
            Backend::LocalFs(b) => b.write_document(namespace, doc),
            Backend::Tmp(b) => b.write_document(namespace, doc),
        }
    }

    fn remove_document(&self, namespace: &str, id: DocId) -> Result<bool, AppError> {
        match self {
            Backend::LocalFs(b) => b.remove_document(namespace, id),
            Backend::Tmp(b) => b.remove_document(namespace, id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cfg(backend: &str, root: &str) -> DocStoreConfig {
        DocStoreConfig {
            backend: backend.into(),
            root_dir: PathBuf::from(root),
            namespace: "default".into(),
            seed_samples: false,
        }
    }

    #[test]
    fn relative_root_resolves_against_work_dir() {
        let b = build(&cfg("local_fs", "docstore"), Path::new("/work")).unwrap();
        match b {
            Backend::LocalFs(fs) => assert_eq!(fs.root(), Path::new("/work/docstore")),
            Backend::Tmp(_) => panic!("expected local_fs"),
        }
    }

    #[test]
    fn absolute_root_is_kept() {
        let b = build(&cfg("local_fs", "/srv/docs"), Path::new("/work")).unwrap();
        match b {
            Backend::LocalFs(fs) => assert_eq!(fs.root(), Path::new("/srv/docs")),
            Backend::Tmp(_) => panic!("expected local_fs"),
        }
    }

    #[test]
    fn tmp_backend_builds() {
        let b = build(&cfg("tmp", "ignored"), Path::new("/work")).unwrap();
        assert_eq!(b.backend_type(), "tmp");
    }

    #[test]
    fn unknown_backend_is_config_error() {
        let err = build(&cfg("s3", "x"), Path::new("/work")).err().unwrap();
        assert!(err.to_string().contains("unknown docstore backend"));
    }
}
