//! Gmail REST client and the [`MailSource`] seam the ingester runs against.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;

use crate::error::AppError;

use super::auth::{OAuthSettings, ensure_access_token};
use super::message::decode_base64url;

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// The mailbox operations ingestion needs.
pub trait MailSource {
    /// Ids of messages matching the Gmail search `query` (all when `None`).
    fn list_message_ids(
        &self,
        query: Option<&str>,
    ) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// Full `users.messages.get` response.
    fn get_message(&self, id: &str) -> impl Future<Output = Result<Value, AppError>> + Send;

    /// Decoded bytes of one attachment.
    fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> impl Future<Output = Result<Vec<u8>, AppError>> + Send;

    /// Remove the `UNREAD` label.
    fn mark_read(&self, id: &str) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Authenticated Gmail API client for the `me` mailbox.
pub struct GmailClient {
    http: reqwest::Client,
    access_token: String,
}

impl GmailClient {
    /// Build the HTTP client and obtain an access token (cached, refreshed or
    /// interactive).
    pub async fn connect(token_file: &Path) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Gmail(format!("failed building HTTP client: {e}")))?;
        let settings = OAuthSettings::from_env()?;
        let access_token = ensure_access_token(&http, &settings, token_file).await?;
        Ok(Self { http, access_token })
    }

    async fn get_json(&self, url: String, query: &[(&str, &str)], what: &str) -> Result<Value, AppError> {
        let res = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Gmail(format!("gmail {what} request failed: {e}")))?;
        if !res.status().is_success() {
            let body = res.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(AppError::Gmail(format!("gmail {what} failed: {body}")));
        }
        res.json()
            .await
            .map_err(|e| AppError::Gmail(format!("gmail {what} parse failed: {e}")))
    }
}

/// `from:<sender>` when a sender filter is set.
pub fn sender_query(sender_filter: Option<&str>) -> Option<String> {
    sender_filter
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("from:{s}"))
}

fn message_ids(list: &Value) -> Vec<String> {
    list.get("messages")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.get("id").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

impl MailSource for GmailClient {
    async fn list_message_ids(&self, query: Option<&str>) -> Result<Vec<String>, AppError> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params: Vec<(&str, &str)> = Vec::new();
            if let Some(q) = query {
                params.push(("q", q));
            }
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }
            let page = self.get_json(format!("{GMAIL_BASE}/messages"), &params, "list").await?;
            ids.extend(message_ids(&page));
            page_token = page.get("nextPageToken").and_then(Value::as_str).map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }
        debug!(count = ids.len(), ?query, "gmail: listed messages");
        Ok(ids)
    }

    async fn get_message(&self, id: &str) -> Result<Value, AppError> {
        self.get_json(format!("{GMAIL_BASE}/messages/{id}"), &[("format", "full")], "get")
            .await
    }

    async fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>, AppError> {
        let body = self
            .get_json(
                format!("{GMAIL_BASE}/messages/{message_id}/attachments/{attachment_id}"),
                &[],
                "attachment",
            )
            .await?;
        let data = body.get("data").and_then(Value::as_str).unwrap_or_default();
        decode_base64url(data)
    }

    async fn mark_read(&self, id: &str) -> Result<(), AppError> {
        let res = self
            .http
            .post(format!("{GMAIL_BASE}/messages/{id}/modify"))
            .bearer_auth(&self.access_token)
            .json(&json!({ "removeLabelIds": ["UNREAD"] }))
            .send()
            .await
            .map_err(|e| AppError::Gmail(format!("gmail modify request failed: {e}")))?;
        if !res.status().is_success() {
            let body = res.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(AppError::Gmail(format!("gmail modify failed: {body}")));
        }
        Ok(())
    }
}
