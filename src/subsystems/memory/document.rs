//! Document record and its on-disk JSON shape.
//!
//! One document is persisted as one file named `{id}.json`:
//!
//! ```json
//! {
//!   "name": "Meeting Notes",
//!   "content": "# Meeting Notes\n...",
//!   "id": 3,
//!   "created_at": "2026-02-19T12:34:56.123456Z",
//!   "updated_at": "2026-02-19T12:34:56.123456Z",
//!   "namespace": "default",
//!   "tags": [],
//!   "citations": [],
//!   "edit_log": []
//! }
//! ```
//!
//! `id` is required when loading (older files call it `doc_id`), and an
//! optional `source_file` records the key the document was added under.
//! Every field has an explicit serde rule; timestamps go through
//! [`iso_timestamp`], which also accepts offset-less ISO-8601 strings
//! (interpreted as UTC).

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::doc_map::DocStoreError;

/// Numeric document identifier, unique within one store.
pub type DocId = u64;

/// Extension of every backing document file.
pub const DOC_FILE_EXT: &str = "json";

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub content: String,
    /// `None` until the owning store assigns one. Backing files must carry
    /// it; older files name it `doc_id`.
    #[serde(default, alias = "doc_id")]
    pub id: Option<DocId>,
    #[serde(with = "iso_timestamp", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso_timestamp", default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub edit_log: Vec<String>,
    /// Key the document was added under (an attachment's object key, say).
    /// Restored into the store's file map on refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Document {
    /// New unsaved document stamped with the current time and no id.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            content: content.into(),
            id: None,
            created_at: now,
            updated_at: now,
            namespace: default_namespace(),
            tags: Vec::new(),
            citations: Vec::new(),
            edit_log: Vec::new(),
            source_file: None,
        }
    }

    pub fn with_id(mut self, id: DocId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Backing file name (`{id}.json`), `None` while the id is unassigned.
    pub fn file_name(&self) -> Option<String> {
        self.id.map(file_name_for)
    }

    pub fn to_json(&self) -> Result<String, DocStoreError> {
        serde_json::to_string_pretty(self).map_err(|e| DocStoreError::Parse {
            file: self.file_name().unwrap_or_else(|| "<unsaved>".into()),
            reason: e.to_string(),
        })
    }

    /// Parse a backing file. `file_name` must carry the `.json` extension and
    /// the document a non-null id, otherwise every load would mint a new one.
    pub fn from_file_contents(file_name: &str, text: &str) -> Result<Self, DocStoreError> {
        if !is_doc_file_name(file_name) {
            return Err(DocStoreError::InvalidExtension(file_name.to_string()));
        }
        let doc: Document = serde_json::from_str(text).map_err(|e| DocStoreError::Parse {
            file: file_name.to_string(),
            reason: e.to_string(),
        })?;
        if doc.id.is_none() {
            return Err(DocStoreError::Parse {
                file: file_name.to_string(),
                reason: "missing or null id".into(),
            });
        }
        Ok(doc)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{id}: {}", self.name),
            None => write!(f, "-: {}", self.name),
        }
    }
}

pub fn file_name_for(id: DocId) -> String {
    format!("{id}.{DOC_FILE_EXT}")
}

/// `true` when `name` looks like a backing document file.
pub fn is_doc_file_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext == DOC_FILE_EXT)
}

const SAMPLES: [(&str, &str); 5] = [
    (
        "Meeting Notes",
        "# Meeting Notes\nDiscussion about Q3 roadmap. Need to follow up on customer feedback.",
    ),
    (
        "Research Paper Ideas",
        "Research Paper Ideas\n1. Machine Learning Applications\n2. Data Analysis Techniques",
    ),
    (
        "Project Timeline",
        "Project Timeline\nPhase 1: Research (2 weeks)\nPhase 2: Development (4 weeks)\nPhase 3: Testing (2 weeks)",
    ),
    (
        "Ceramic Production",
        "Ceramic Production\n1. Raw material preparation\n2. Molding\n3. Firing\n4. Glazing\n5. Firing",
    ),
    (
        "Grocery List",
        "Grocery List\n1. Milk\n2. Eggs\n3. Bread\n4. Butter\n5. Cheese",
    ),
];

/// Id-less sample documents used to seed an empty namespace.
pub fn sample_documents() -> Vec<Document> {
    SAMPLES
        .iter()
        .map(|(name, content)| Document::new(*name, *content))
        .collect()
}

/// Serde adapter for document timestamps.
///
/// Writes RFC 3339 with microseconds and a `Z` suffix; reads RFC 3339 or a
/// naive `YYYY-MM-DDTHH:MM:SS[.f]` string.
pub mod iso_timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(D::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, SubsecRound, TimeZone};

    #[test]
    fn new_document_has_no_id_and_equal_timestamps() {
        let d = Document::new("Notes", "body");
        assert!(d.id.is_none());
        assert_eq!(d.created_at, d.updated_at);
        assert_eq!(d.namespace, DEFAULT_NAMESPACE);
        assert!(d.file_name().is_none());
    }

    #[test]
    fn file_name_uses_id_and_extension() {
        let d = Document::new("Notes", "body").with_id(42);
        assert_eq!(d.file_name().as_deref(), Some("42.json"));
    }

    #[test]
    fn display_is_id_colon_name() {
        let d = Document::new("Notes", "body").with_id(3);
        assert_eq!(d.to_string(), "3: Notes");
    }

    #[test]
    fn json_file_roundtrip_preserves_all_fields() {
        let mut d = Document::new("Notes", "# heading\nbody").with_id(9);
        d.tags = vec!["a".into(), "b".into()];
        d.citations = vec!["https://example.com".into()];
        d.edit_log = vec!["created".into()];
        d.namespace = "research".into();
        d.source_file = Some("ATT-1/notes.md".into());
        // Files keep microsecond precision.
        d.created_at = d.created_at.trunc_subsecs(6);
        d.updated_at = (d.created_at + Duration::seconds(5)).trunc_subsecs(6);
        let text = d.to_json().unwrap();
        let back = Document::from_file_contents("9.json", &text).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn file_without_id_is_a_parse_error() {
        let missing = r#"{"name": "n", "content": "c"}"#;
        let err = Document::from_file_contents("5.json", missing).unwrap_err();
        assert!(matches!(err, DocStoreError::Parse { ref reason, .. } if reason.contains("id")));

        let null = r#"{"name": "n", "content": "c", "id": null}"#;
        assert!(matches!(
            Document::from_file_contents("5.json", null),
            Err(DocStoreError::Parse { .. })
        ));
    }

    #[test]
    fn legacy_doc_id_field_loads() {
        let text = r#"{"name": "Old", "content": "x", "doc_id": 12, "created_at": "2023-07-15T10:30:00"}"#;
        let d = Document::from_file_contents("12.json", text).unwrap();
        assert_eq!(d.id, Some(12));
        assert!(d.source_file.is_none());
        assert!(!d.to_json().unwrap().contains("source_file"));
    }

    #[test]
    fn wrong_extension_is_rejected() {
        let err = Document::from_file_contents("9.txt", "{}").unwrap_err();
        assert!(matches!(err, DocStoreError::InvalidExtension(_)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = Document::from_file_contents("9.json", "{ not json").unwrap_err();
        assert!(matches!(err, DocStoreError::Parse { .. }));
    }

    #[test]
    fn naive_timestamps_load_as_utc() {
        let text = r#"{
            "name": "Old", "content": "x", "id": 1,
            "created_at": "2023-07-15T10:30:00",
            "updated_at": "2023-07-15T11:45:00.250000"
        }"#;
        let d = Document::from_file_contents("1.json", text).unwrap();
        assert_eq!(d.created_at, Utc.with_ymd_and_hms(2023, 7, 15, 10, 30, 0).unwrap());
        assert_eq!(d.namespace, DEFAULT_NAMESPACE);
        assert!(d.tags.is_empty());
    }

    #[test]
    fn doc_file_name_check() {
        assert!(is_doc_file_name("1.json"));
        assert!(!is_doc_file_name("1.json.bak"));
        assert!(!is_doc_file_name("notes.md"));
        assert!(!is_doc_file_name("json"));
    }

    #[test]
    fn samples_are_idless() {
        let samples = sample_documents();
        assert_eq!(samples.len(), 5);
        assert!(samples.iter().all(|d| d.id.is_none()));
        assert_eq!(samples[0].name, "Meeting Notes");
    }
}
