//! Where ingested mail ends up: raw attachment bytes in an object store,
//! message metadata in a record store.
//!
//! Both are traits so the ingester can run against anything bucket- or
//! collection-shaped. The bundled implementations keep everything on the
//! local filesystem:
//!
//! ```text
//! {storage_root}/
//! ├── objects/{bucket}/{key}
//! └── records/{database}/{collection}/{message_id}.json
//! ```

use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::message::GmailMessage;

// ── records ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub filename: String,
    pub text_content: Option<String>,
    pub size: usize,
    pub s3_key: String,
    pub content_type: Option<String>,
}

/// Persisted metadata for one processed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: String,
    pub sender: String,
    pub subject: String,
    pub snippet: String,
    pub body: Option<String>,
    pub date_received: String,
    pub processed_at: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRecord>,
}

impl MessageRecord {
    pub fn from_message(msg: &GmailMessage, processed_at: DateTime<Utc>) -> Self {
        Self {
            message_id: msg.id.clone(),
            sender: msg.sender.clone(),
            subject: msg.subject.clone(),
            snippet: msg.snippet.clone(),
            body: msg.body.clone(),
            date_received: msg.date_received.clone(),
            processed_at,
            attachments: msg
                .attachments
                .iter()
                .map(|a| AttachmentRecord {
                    filename: a.filename.clone(),
                    text_content: a.text_content.clone(),
                    size: a.size(),
                    s3_key: a.key.clone(),
                    content_type: a.mime_type.clone(),
                })
                .collect(),
        }
    }
}

// ── traits ───────────────────────────────────────────────────────────────────

pub trait ObjectStore {
    fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<(), AppError>;
}

pub trait RecordStore {
    fn find(&self, message_id: &str) -> Result<Option<MessageRecord>, AppError>;
    fn insert(&self, record: &MessageRecord) -> Result<(), AppError>;
    /// Remove every record for `message_id`; returns how many were removed.
    fn delete_many(&self, message_id: &str) -> Result<usize, AppError>;
}

// ── local implementations ────────────────────────────────────────────────────

/// Objects as files under `{root}/{bucket}/{key}`.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, bucket: &str, key: &str) -> Result<PathBuf, AppError> {
        Ok(self.root.join(safe_relative(bucket)?).join(safe_relative(key)?))
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<(), AppError> {
        let path = self.path_for(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, data)?;
        tracing::info!(path = %path.display(), bytes = data.len(), "object stored");
        Ok(())
    }
}

/// One pretty-printed JSON file per message under `{root}/{database}/{collection}`.
pub struct JsonRecordStore {
    dir: PathBuf,
}

impl JsonRecordStore {
    pub fn new(root: &Path, database: &str, collection: &str) -> Result<Self, AppError> {
        let dir = root.join(safe_relative(database)?).join(safe_relative(collection)?);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn record_path(&self, message_id: &str) -> Result<PathBuf, AppError> {
        if message_id.is_empty() || !message_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(AppError::Gmail(format!("unusable message id: {message_id:?}")));
        }
        Ok(self.dir.join(format!("{message_id}.json")))
    }
}

impl RecordStore for JsonRecordStore {
    fn find(&self, message_id: &str) -> Result<Option<MessageRecord>, AppError> {
        let path = self.record_path(message_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        let record = serde_json::from_str(&text)
            .map_err(|e| AppError::Gmail(format!("corrupt record {}: {e}", path.display())))?;
        Ok(Some(record))
    }

    fn insert(&self, record: &MessageRecord) -> Result<(), AppError> {
        let path = self.record_path(&record.message_id)?;
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| AppError::Gmail(format!("record serialize failed: {e}")))?;
        fs::write(path, json)?;
        Ok(())
    }

    fn delete_many(&self, message_id: &str) -> Result<usize, AppError> {
        let path = self.record_path(message_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(1),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

/// Accept only plain relative paths (no `..`, no root).
fn safe_relative(raw: &str) -> Result<PathBuf, AppError> {
    let path = Path::new(raw);
    let ok = !raw.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(path.to_path_buf())
    } else {
        Err(AppError::Gmail(format!("unsafe storage path: {raw:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str) -> MessageRecord {
        MessageRecord {
            message_id: id.into(),
            sender: "a@example.com".into(),
            subject: "s".into(),
            snippet: "snip".into(),
            body: Some("body".into()),
            date_received: "Mon, 1 Jan 2024 00:00:00 +0000".into(),
            processed_at: Utc::now(),
            attachments: vec![AttachmentRecord {
                filename: "notes.md".into(),
                text_content: Some("# hi".into()),
                size: 4,
                s3_key: "ATT1/notes.md".into(),
                content_type: Some("text/markdown".into()),
            }],
        }
    }

    #[test]
    fn object_put_writes_under_bucket() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.put("bucket", "ATT1/notes.md", b"# hi").unwrap();
        let written = fs::read(dir.path().join("bucket/ATT1/notes.md")).unwrap();
        assert_eq!(written, b"# hi");
    }

    #[test]
    fn object_keys_cannot_escape_root() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());
        assert!(store.put("bucket", "../evil", b"x").is_err());
        assert!(store.put("bucket", "/etc/passwd", b"x").is_err());
    }

    #[test]
    fn record_insert_find_delete() {
        let dir = TempDir::new().unwrap();
        let store = JsonRecordStore::new(dir.path(), "email", "messages").unwrap();
        assert!(store.find("abc123").unwrap().is_none());

        let rec = record("abc123");
        store.insert(&rec).unwrap();
        assert!(dir.path().join("email/messages/abc123.json").exists());
        assert_eq!(store.find("abc123").unwrap(), Some(rec));

        assert_eq!(store.delete_many("abc123").unwrap(), 1);
        assert_eq!(store.delete_many("abc123").unwrap(), 0);
        assert!(store.find("abc123").unwrap().is_none());
    }

    #[test]
    fn record_json_uses_stored_keys() {
        let json = serde_json::to_value(record("m1")).unwrap();
        for key in ["message_id", "sender", "subject", "snippet", "body", "date_received", "processed_at", "attachments"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["attachments"][0]["s3_key"], "ATT1/notes.md");
        assert_eq!(json["attachments"][0]["content_type"], "text/markdown");
    }

    #[test]
    fn bad_message_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = JsonRecordStore::new(dir.path(), "email", "messages").unwrap();
        assert!(store.find("../x").is_err());
    }
}
