//! Gmail ingestion: pull messages from a sender, keep their attachments.
//!
//! [`auth`] obtains an OAuth token, [`client`] talks to the Gmail REST API,
//! [`message`] decodes payloads, [`storage`] persists bytes and records,
//! [`ingest`] drives one pass and [`report`] renders its HTML summary.

pub mod auth;
pub mod client;
pub mod ingest;
pub mod message;
pub mod report;
pub mod storage;

pub use client::{GmailClient, MailSource};
pub use ingest::{IngestOptions, IngestSummary, Ingester, import_attachments};
pub use message::{Attachment, GmailMessage};
pub use storage::{JsonRecordStore, LocalObjectStore, MessageRecord, ObjectStore, RecordStore};

use std::path::PathBuf;

use crate::config::Config;
use crate::error::AppError;

/// Object store root, record store root and report path for `config`.
pub struct GmailPaths {
    pub objects: PathBuf,
    pub records: PathBuf,
    pub token_file: PathBuf,
    pub report: PathBuf,
}

impl GmailPaths {
    pub fn from_config(config: &Config) -> Self {
        let storage_root = config.resolve(&config.gmail.storage_root);
        Self {
            objects: storage_root.join("objects"),
            records: storage_root.join("records"),
            token_file: config.resolve(&config.gmail.token_file),
            report: config.work_dir.join("gmail").join("report.html"),
        }
    }
}

/// Local stores as laid out by [`GmailPaths`].
pub fn local_stores(config: &Config, paths: &GmailPaths) -> Result<(LocalObjectStore, JsonRecordStore), AppError> {
    let objects = LocalObjectStore::new(&paths.objects);
    let records = JsonRecordStore::new(&paths.records, &config.gmail.database, &config.gmail.collection)?;
    Ok((objects, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn paths_resolve_against_work_dir() {
        let cfg = Config::test_default(Path::new("/work"));
        let paths = GmailPaths::from_config(&cfg);
        assert_eq!(paths.objects, Path::new("/work/gmail/storage/objects"));
        assert_eq!(paths.records, Path::new("/work/gmail/storage/records"));
        assert_eq!(paths.token_file, Path::new("/work/gmail/token.json"));
        assert_eq!(paths.report, Path::new("/work/gmail/report.html"));
    }

    #[test]
    fn local_stores_create_record_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::test_default(dir.path());
        let paths = GmailPaths::from_config(&cfg);
        local_stores(&cfg, &paths).unwrap();
        assert!(dir.path().join("gmail/storage/records/email/messages").is_dir());
    }
}
