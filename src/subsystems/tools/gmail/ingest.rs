//! One ingestion pass: list matching messages, fetch and decode their parts,
//! store the bytes and a metadata record, mark each message read.
//!
//! Messages are handled one at a time. A failure on one message is logged
//! and the pass moves on; nothing is retried.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::GmailConfig;
use crate::error::AppError;
use crate::subsystems::memory::{AddOutcome, DocBackend, DocStore};

use super::client::{MailSource, sender_query};
use super::message::{Attachment, GmailMessage, PartBody, PartRef, decode_base64url, flatten_parts};
use super::storage::{MessageRecord, ObjectStore, RecordStore};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub sender_filter: Option<String>,
    pub replace_existing: bool,
    pub dry_run: bool,
    pub bucket: String,
}

impl IngestOptions {
    pub fn from_config(config: &GmailConfig) -> Self {
        Self {
            sender_filter: config.sender_filter.clone(),
            replace_existing: config.replace_existing,
            dry_run: config.dry_run,
            bucket: config.bucket.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct IngestSummary {
    pub listed: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Documents added to the docstore.
    pub imported: usize,
    /// Records of processed messages, in processing order.
    pub records: Vec<MessageRecord>,
}

pub struct Ingester<S, O, R> {
    source: S,
    objects: O,
    records: R,
    options: IngestOptions,
}

impl<S: MailSource, O: ObjectStore, R: RecordStore> Ingester<S, O, R> {
    pub fn new(source: S, objects: O, records: R, options: IngestOptions) -> Self {
        Self { source, objects, records, options }
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Run one pass. When `docstore` is given, decoded text attachments are
    /// also added to it, keyed by object key.
    pub async fn run<B: DocBackend>(&self, mut docstore: Option<&mut DocStore<B>>) -> IngestSummary {
        let mut summary = IngestSummary::default();
        let query = sender_query(self.options.sender_filter.as_deref());
        match &query {
            Some(q) => info!(query = %q, "filtering messages by sender"),
            None => info!("no sender filter"),
        }

        let ids = match self.source.list_message_ids(query.as_deref()).await {
            Ok(ids) => ids,
            Err(e) => {
                error!("error listing messages: {e}");
                Vec::new()
            }
        };
        summary.listed = ids.len();
        if ids.is_empty() {
            info!("no messages found");
            return summary;
        }
        info!(count = ids.len(), dry_run = self.options.dry_run, "processing messages");

        for id in ids {
            match self.should_process(&id) {
                Ok(true) => {}
                Ok(false) => {
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    error!(message_id = %id, "record lookup failed: {e}");
                    summary.failed += 1;
                    continue;
                }
            }

            let message = match self.process_message(&id).await {
                Ok(m) => m,
                Err(e) => {
                    error!(message_id = %id, "processing failed: {e}");
                    summary.failed += 1;
                    continue;
                }
            };

            let record = MessageRecord::from_message(&message, Utc::now());
            if self.options.dry_run {
                info!(message_id = %id, "dry run: {message}");
            } else {
                if let Err(e) = self.records.insert(&record) {
                    error!(message_id = %id, "record insert failed: {e}");
                    summary.failed += 1;
                    continue;
                }
                info!(message_id = %id, "record stored");
                if let Some(store) = docstore.as_deref_mut() {
                    summary.imported += import_attachments(store, &message);
                }
            }

            match self.source.mark_read(&id).await {
                Ok(()) => info!(message_id = %id, "marked as read"),
                Err(e) => error!(message_id = %id, "error marking message as read: {e}"),
            }

            summary.records.push(record);
            summary.processed += 1;
        }

        info!(
            listed = summary.listed,
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            imported = summary.imported,
            "ingestion pass finished"
        );
        summary
    }

    /// Dedupe against stored records. Replace mode drops the old record
    /// first; a dry run never skips and never deletes.
    fn should_process(&self, id: &str) -> Result<bool, AppError> {
        if self.records.find(id)?.is_none() {
            return Ok(true);
        }
        if self.options.dry_run {
            info!(message_id = %id, "already processed, dry run: continuing");
            return Ok(true);
        }
        if self.options.replace_existing {
            let removed = self.records.delete_many(id)?;
            info!(message_id = %id, removed, "already processed, replacing");
            return Ok(true);
        }
        info!(message_id = %id, "already processed, skipping");
        Ok(false)
    }

    async fn process_message(&self, id: &str) -> Result<GmailMessage, AppError> {
        let raw = self.source.get_message(id).await?;
        let message = GmailMessage::from_api(&raw)?;
        info!(
            message_id = %message.id,
            sender = %message.sender,
            subject = %message.subject,
            date = %message.date_received,
            "retrieved message"
        );

        let parts = raw.get("payload").map(flatten_parts).unwrap_or_default();
        if parts.is_empty() {
            warn!(message_id = %id, "message has no parts");
        }

        let mut attachments = Vec::with_capacity(parts.len());
        for (index, part) in parts.into_iter().enumerate() {
            let filename = part.filename.clone();
            match self.fetch_part(id, index, part).await {
                Ok(Some(a)) => attachments.push(a),
                Ok(None) => {}
                Err(e) => warn!(message_id = %id, %filename, "part failed: {e}"),
            }
        }

        let message = message.with_attachments(attachments);
        if message.body.is_none() {
            warn!(message_id = %id, "no text/plain body found");
        }
        Ok(message)
    }

    async fn fetch_part(
        &self,
        message_id: &str,
        index: usize,
        part: PartRef,
    ) -> Result<Option<Attachment>, AppError> {
        let key = part.key(message_id, index);
        let (data, text_content) = match &part.body {
            PartBody::Empty => {
                warn!(filename = %part.filename, "no data in part");
                return Ok(None);
            }
            PartBody::Inline(encoded) => {
                let data = decode_base64url(encoded)?;
                let text = String::from_utf8_lossy(&data).into_owned();
                if text.is_empty() {
                    warn!(filename = %part.filename, "no text content in inline part");
                    return Ok(None);
                }
                (data, Some(text))
            }
            PartBody::Remote(attachment_id) => {
                let data = self.source.get_attachment(message_id, attachment_id).await?;
                if data.is_empty() {
                    warn!(filename = %part.filename, %attachment_id, "attachment is empty");
                    return Ok(None);
                }
                let text = String::from_utf8(data.clone()).ok();
                (data, text)
            }
        };

        if self.options.dry_run {
            info!(filename = %part.filename, bytes = data.len(), "dry run: not uploading");
        } else {
            self.objects.put(&self.options.bucket, &key, &data)?;
        }

        Ok(Some(Attachment {
            filename: part.filename,
            data,
            bucket: self.options.bucket.clone(),
            key,
            text_content,
            mime_type: part.mime_type,
        }))
    }
}

/// Add every text attachment of `message` to `store`, at most once per key.
/// Returns how many documents were inserted.
pub fn import_attachments<B: DocBackend>(store: &mut DocStore<B>, message: &GmailMessage) -> usize {
    let mut inserted = 0;
    for a in &message.attachments {
        let Some(text) = a.text_content.as_deref().filter(|t| !t.trim().is_empty()) else {
            continue;
        };
        let name = if a.filename.is_empty() { message.subject.as_str() } else { a.filename.as_str() };
        match store.add_document(name, text, None, Some(&a.key)) {
            Ok(AddOutcome::Inserted(doc)) => {
                debug!(key = %a.key, id = ?doc.id, "attachment imported");
                inserted += 1;
            }
            Ok(AddOutcome::AlreadyExisted(_)) => debug!(key = %a.key, "attachment already imported"),
            Err(e) => warn!(key = %a.key, "attachment import failed: {e}"),
        }
    }
    inserted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde_json::{Value, json};
    use tempfile::TempDir;

    use crate::subsystems::memory::stores::tmp::TmpBackend;
    use crate::subsystems::tools::gmail::storage::{JsonRecordStore, LocalObjectStore};

    #[derive(Default)]
    struct FakeSource {
        messages: HashMap<String, Value>,
        attachments: HashMap<String, Vec<u8>>,
        fail_list: bool,
        queries: Mutex<Vec<Option<String>>>,
        marked: Mutex<Vec<String>>,
    }

    impl MailSource for FakeSource {
        async fn list_message_ids(&self, query: Option<&str>) -> Result<Vec<String>, AppError> {
            self.queries.lock().unwrap().push(query.map(str::to_string));
            if self.fail_list {
                return Err(AppError::Gmail("boom".into()));
            }
            let mut ids: Vec<String> = self.messages.keys().cloned().collect();
            ids.sort();
            Ok(ids)
        }

        async fn get_message(&self, id: &str) -> Result<Value, AppError> {
            self.messages
                .get(id)
                .cloned()
                .ok_or_else(|| AppError::Gmail(format!("no message {id}")))
        }

        async fn get_attachment(&self, _message_id: &str, attachment_id: &str) -> Result<Vec<u8>, AppError> {
            Ok(self.attachments.get(attachment_id).cloned().unwrap_or_default())
        }

        async fn mark_read(&self, id: &str) -> Result<(), AppError> {
            self.marked.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    fn message(id: &str) -> Value {
        json!({
            "id": id,
            "threadId": "t",
            "snippet": "snip",
            "payload": {
                "headers": [{"name": "From", "value": "ann@example.com"}, {"name": "Subject", "value": "Notes"}],
                "parts": [
                    {"mimeType": "text/plain", "filename": "", "body": {"data": "aGVsbG8gd29ybGQ"}},
                    {"mimeType": "text/markdown", "filename": "notes.md", "body": {"attachmentId": format!("ATT-{id}")}},
                    {"mimeType": "text/plain", "filename": "empty.txt", "body": {"size": 0}}
                ]
            }
        })
    }

    fn source(ids: &[&str]) -> FakeSource {
        let mut s = FakeSource::default();
        for id in ids {
            s.messages.insert(id.to_string(), message(id));
            s.attachments.insert(format!("ATT-{id}"), b"# notes".to_vec());
        }
        s
    }

    fn options(dry_run: bool, replace_existing: bool) -> IngestOptions {
        IngestOptions {
            sender_filter: Some("ann@example.com".into()),
            replace_existing,
            dry_run,
            bucket: "bucket".into(),
        }
    }

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self { dir: TempDir::new().unwrap() }
        }

        fn ingester(&self, src: FakeSource, opts: IngestOptions) -> Ingester<FakeSource, LocalObjectStore, JsonRecordStore> {
            let objects = LocalObjectStore::new(self.dir.path().join("objects"));
            let records = JsonRecordStore::new(&self.dir.path().join("records"), "email", "messages").unwrap();
            Ingester::new(src, objects, records, opts)
        }

        fn records(&self) -> JsonRecordStore {
            JsonRecordStore::new(&self.dir.path().join("records"), "email", "messages").unwrap()
        }
    }

    #[tokio::test]
    async fn processes_stores_and_marks_read() {
        let fx = Fixture::new();
        let ing = fx.ingester(source(&["m1", "m2"]), options(false, false));
        let summary = ing.run::<TmpBackend>(None).await;

        assert_eq!(summary.listed, 2);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(
            ing.source.queries.lock().unwrap().as_slice(),
            &[Some("from:ann@example.com".to_string())]
        );
        assert_eq!(ing.source.marked.lock().unwrap().as_slice(), &["m1", "m2"]);

        let rec = fx.records().find("m1").unwrap().unwrap();
        assert_eq!(rec.sender, "ann@example.com");
        assert_eq!(rec.body.as_deref(), Some("hello world"));
        assert_eq!(rec.attachments.len(), 2);
        assert_eq!(rec.attachments[1].s3_key, "ATT-m1/notes.md");
        assert!(fx.dir.path().join("objects/bucket/ATT-m1/notes.md").exists());
        assert!(fx.dir.path().join("objects/bucket/inline/m1/part-0").exists());
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let fx = Fixture::new();
        let ing = fx.ingester(source(&["m1"]), options(true, false));
        let summary = ing.run::<TmpBackend>(None).await;

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.records.len(), 1);
        assert!(fx.records().find("m1").unwrap().is_none());
        assert!(!fx.dir.path().join("objects/bucket").exists());
    }

    #[tokio::test]
    async fn already_processed_is_skipped_without_replace() {
        let fx = Fixture::new();
        fx.ingester(source(&["m1"]), options(false, false)).run::<TmpBackend>(None).await;

        let ing = fx.ingester(source(&["m1"]), options(false, false));
        let summary = ing.run::<TmpBackend>(None).await;
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.processed, 0);
        assert!(ing.source.marked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn already_processed_is_replaced_in_replace_mode() {
        let fx = Fixture::new();
        fx.ingester(source(&["m1"]), options(false, false)).run::<TmpBackend>(None).await;
        let first = fx.records().find("m1").unwrap().unwrap();

        let summary = fx.ingester(source(&["m1"]), options(false, true)).run::<TmpBackend>(None).await;
        assert_eq!(summary.processed, 1);
        let second = fx.records().find("m1").unwrap().unwrap();
        assert!(second.processed_at >= first.processed_at);
    }

    #[tokio::test]
    async fn list_failure_yields_empty_pass() {
        let fx = Fixture::new();
        let mut src = source(&["m1"]);
        src.fail_list = true;
        let summary = fx.ingester(src, options(false, false)).run::<TmpBackend>(None).await;
        assert_eq!(summary.listed, 0);
        assert_eq!(summary.processed, 0);
    }

    #[tokio::test]
    async fn missing_message_is_counted_and_loop_continues() {
        let fx = Fixture::new();
        let mut src = source(&["m2"]);
        // Listed but not fetchable.
        src.messages.insert("m1".into(), json!({"payload": {}}));
        let summary = fx.ingester(src, options(false, false)).run::<TmpBackend>(None).await;
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.processed, 1);
    }

    #[tokio::test]
    async fn text_attachments_import_once_per_key() {
        let fx = Fixture::new();
        let backend = TmpBackend::new();
        let mut store = DocStore::open("inbox", &backend).unwrap();

        let ing = fx.ingester(source(&["m1"]), options(false, true));
        let summary = ing.run(Some(&mut store)).await;
        assert_eq!(summary.imported, 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.file_map().get("ATT-m1/notes.md"), Some(&2));

        let again = ing.run(Some(&mut store)).await;
        assert_eq!(again.imported, 0);
        assert_eq!(store.len(), 2);

        // A later run against a reopened store still sees the keys.
        store.save_all_to_remote().unwrap();
        let mut reopened = DocStore::open("inbox", &backend).unwrap();
        reopened.refresh().unwrap();
        let next_run = ing.run(Some(&mut reopened)).await;
        assert_eq!(next_run.imported, 0);
        assert_eq!(reopened.len(), 2);
    }
}
