//! Gmail API message payloads: headers, MIME part walk, base64url decoding.
//!
//! Works on the raw `serde_json::Value` returned by `users.messages.get`
//! (format `full`). Nothing here does I/O.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;

use crate::error::AppError;

pub const UNKNOWN: &str = "unknown";

/// A fetched message with its decoded attachments.
#[derive(Debug, Clone, PartialEq)]
pub struct GmailMessage {
    pub id: String,
    pub thread_id: String,
    pub label_ids: Vec<String>,
    pub snippet: String,
    pub sender: String,
    pub subject: String,
    pub date_received: String,
    /// Milliseconds since the epoch, as Gmail reports it.
    pub internal_date: String,
    pub size_estimate: u64,
    pub history_id: String,
    /// Text of the first `text/plain` attachment.
    pub body: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl GmailMessage {
    /// Read the envelope fields of a `users.messages.get` response.
    /// Attachments are left empty; missing headers become `"unknown"`.
    pub fn from_api(msg: &Value) -> Result<Self, AppError> {
        let id = str_field(msg, "id");
        if id.is_empty() {
            return Err(AppError::Gmail("message without id".into()));
        }
        let headers = msg
            .get("payload")
            .and_then(|p| p.get("headers"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        Ok(Self {
            id,
            thread_id: str_field(msg, "threadId"),
            label_ids: msg
                .get("labelIds")
                .and_then(Value::as_array)
                .map(|ids| ids.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default(),
            snippet: str_field(msg, "snippet"),
            sender: header_value(headers, "From").unwrap_or_else(|| UNKNOWN.into()),
            subject: header_value(headers, "Subject").unwrap_or_else(|| UNKNOWN.into()),
            date_received: header_value(headers, "Date").unwrap_or_else(|| UNKNOWN.into()),
            internal_date: str_field(msg, "internalDate"),
            size_estimate: msg.get("sizeEstimate").and_then(Value::as_u64).unwrap_or(0),
            history_id: str_field(msg, "historyId"),
            body: None,
            attachments: Vec::new(),
        })
    }

    /// Attach decoded parts and pick the body from the first `text/plain` one.
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.body = attachments
            .iter()
            .find(|a| a.mime_type.as_deref() == Some("text/plain"))
            .and_then(|a| a.text_content.clone());
        self.attachments = attachments;
        self
    }
}

impl std::fmt::Display for GmailMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Sender: {}, Subject: {}, Date: {}, Attachments: {}",
            self.sender,
            self.subject,
            self.date_received,
            self.attachments.len()
        )
    }
}

/// One decoded part, ready for object storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub data: Vec<u8>,
    pub bucket: String,
    pub key: String,
    pub text_content: Option<String>,
    pub mime_type: Option<String>,
}

impl Attachment {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Where a part's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartBody {
    /// base64url data carried in the message itself.
    Inline(String),
    /// Must be fetched with `users.messages.attachments.get`.
    Remote(String),
    Empty,
}

/// A leaf MIME part of a message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRef {
    pub filename: String,
    pub mime_type: Option<String>,
    pub body: PartBody,
}

impl PartRef {
    fn from_value(part: &Value) -> Self {
        let body = part.get("body");
        let attachment_id = body.and_then(|b| b.get("attachmentId")).and_then(Value::as_str);
        let data = body.and_then(|b| b.get("data")).and_then(Value::as_str);
        let body = match (attachment_id, data) {
            (Some(id), _) if !id.is_empty() => PartBody::Remote(id.to_string()),
            (_, Some(data)) if !data.is_empty() => PartBody::Inline(data.to_string()),
            _ => PartBody::Empty,
        };
        Self {
            filename: str_field(part, "filename"),
            mime_type: part.get("mimeType").and_then(Value::as_str).map(str::to_string),
            body,
        }
    }

    /// Object-store key: `<attachment-id>/<filename>`, or
    /// `inline/<message-id>/<filename>` for data carried in the message.
    /// Unnamed parts are called `part-<index>`.
    pub fn key(&self, message_id: &str, index: usize) -> String {
        let name = if self.filename.is_empty() {
            format!("part-{index}")
        } else {
            self.filename.clone()
        };
        match &self.body {
            PartBody::Remote(id) => format!("{id}/{name}"),
            PartBody::Inline(_) | PartBody::Empty => format!("inline/{message_id}/{name}"),
        }
    }
}

/// Leaf parts of `payload`, depth first. Multipart containers are flattened;
/// a single-part payload is returned as its own only part.
pub fn flatten_parts(payload: &Value) -> Vec<PartRef> {
    let mut out = Vec::new();
    match payload.get("parts").and_then(Value::as_array) {
        Some(parts) => walk(parts, &mut out),
        None if payload.get("body").is_some() => out.push(PartRef::from_value(payload)),
        None => {}
    }
    out
}

fn walk(parts: &[Value], out: &mut Vec<PartRef>) {
    for part in parts {
        match part.get("parts").and_then(Value::as_array) {
            Some(children) if !children.is_empty() => walk(children, out),
            _ => out.push(PartRef::from_value(part)),
        }
    }
}

/// Decode Gmail's base64url. Padding and embedded whitespace are tolerated.
pub fn decode_base64url(data: &str) -> Result<Vec<u8>, AppError> {
    let cleaned: String = data
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .trim_end_matches('=')
        .to_string();
    URL_SAFE_NO_PAD
        .decode(cleaned.as_bytes())
        .map_err(|e| AppError::Gmail(format!("invalid base64url data: {e}")))
}

/// Case-insensitive header lookup.
pub fn header_value(headers: &[Value], key: &str) -> Option<String> {
    headers.iter().find_map(|item| {
        let name = item.get("name").and_then(Value::as_str)?;
        if name.eq_ignore_ascii_case(key) {
            item.get("value").and_then(Value::as_str).map(str::to_string)
        } else {
            None
        }
    })
}

fn str_field(v: &Value, key: &str) -> String {
    v.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}
