//! HTML summary of an ingestion run: one key/value table per processed
//! message, separated by rules.

use std::fs;
use std::path::Path;

use crate::error::AppError;

use super::storage::MessageRecord;

const SEPARATOR: &str = "<br><hr><br>";

/// Escape text for HTML element content and attribute values.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn row(out: &mut String, key: &str, value: &str) {
    out.push_str(&format!("<tr><th>{}</th><td>{}</td></tr>", escape(key), value));
}

fn opt(value: Option<&str>) -> String {
    value.map(escape).unwrap_or_else(|| "<i>none</i>".to_string())
}

/// Table for a single record.
pub fn render_message(record: &MessageRecord) -> String {
    let mut out = String::from("<table border='1'>");
    row(&mut out, "message_id", &escape(&record.message_id));
    row(&mut out, "sender", &escape(&record.sender));
    row(&mut out, "subject", &escape(&record.subject));
    row(&mut out, "snippet", &escape(&record.snippet));
    row(&mut out, "body", &format!("<pre>{}</pre>", opt(record.body.as_deref())));
    row(&mut out, "date_received", &escape(&record.date_received));
    row(&mut out, "processed_at", &escape(&record.processed_at.to_rfc3339()));

    let mut attachments = String::from("<table border='1'><tr><th>filename</th><th>size</th><th>s3_key</th><th>content_type</th></tr>");
    for a in &record.attachments {
        attachments.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&a.filename),
            a.size,
            escape(&a.s3_key),
            opt(a.content_type.as_deref()),
        ));
    }
    attachments.push_str("</table>");
    row(&mut out, "attachments", &attachments);

    out.push_str("</table>");
    out
}

/// Full page for every processed record.
pub fn render_report(records: &[MessageRecord]) -> String {
    let body = if records.is_empty() {
        "<p>No messages processed.</p>".to_string()
    } else {
        records.iter().map(render_message).collect::<Vec<_>>().join(SEPARATOR)
    };
    format!(
        "<html>\n<head><meta charset=\"utf-8\"><title>Gmail Messages</title></head>\n<body>\n<h1>Gmail Messages</h1>\n<p>Processed messages: {}</p>\n{body}\n</body>\n</html>\n",
        records.len()
    )
}

pub fn write_report(path: &Path, records: &[MessageRecord]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render_report(records))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::tools::gmail::storage::AttachmentRecord;
    use chrono::Utc;

    fn record(id: &str, subject: &str) -> MessageRecord {
        MessageRecord {
            message_id: id.into(),
            sender: "Ann <ann@example.com>".into(),
            subject: subject.into(),
            snippet: String::new(),
            body: None,
            date_received: "unknown".into(),
            processed_at: Utc::now(),
            attachments: vec![AttachmentRecord {
                filename: "a.txt".into(),
                text_content: None,
                size: 3,
                s3_key: "X/a.txt".into(),
                content_type: None,
            }],
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn message_table_has_fields_and_escaped_sender() {
        let html = render_message(&record("m1", "hi"));
        assert!(html.contains("<th>message_id</th><td>m1</td>"));
        assert!(html.contains("Ann &lt;ann@example.com&gt;"));
        assert!(html.contains("<td>X/a.txt</td>"));
    }

    #[test]
    fn report_joins_messages_with_separator() {
        let html = render_report(&[record("m1", "a"), record("m2", "b")]);
        assert_eq!(html.matches(SEPARATOR).count(), 1);
        assert!(html.contains("Processed messages: 2"));
    }

    #[test]
    fn write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gmail/report.html");
        write_report(&path, &[]).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().contains("No messages processed."));
    }
}
