//! Google OAuth for the Gmail API: cached token, refresh, and the PKCE
//! loopback flow for first-time authorisation.
//!
//! Client credentials come from `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`
//! (optional) and `GOOGLE_REDIRECT_URI` (default
//! `http://127.0.0.1:8080/oauth2/callback`).

use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::Command;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.modify",
];
const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/oauth2/callback";
/// Refresh when the cached token has less than this left.
const EXPIRY_MARGIN_SECS: u64 = 60;
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// OAuth client settings, read from the environment.
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
}

impl OAuthSettings {
    pub fn from_env() -> Result<Self, AppError> {
        let client_id = std::env::var("GOOGLE_CLIENT_ID")
            .map_err(|_| AppError::Gmail("missing GOOGLE_CLIENT_ID".into()))?;
        Ok(Self {
            client_id,
            client_secret: std::env::var("GOOGLE_CLIENT_SECRET").ok(),
            redirect_uri: std::env::var("GOOGLE_REDIRECT_URI")
                .unwrap_or_else(|_| DEFAULT_REDIRECT_URI.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCache {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds.
    pub expires_at: u64,
}

impl TokenCache {
    pub fn is_fresh(&self, now: u64) -> bool {
        self.expires_at > now + EXPIRY_MARGIN_SECS
    }

    pub fn load(path: &Path) -> Option<Self> {
        let bytes = fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| AppError::Gmail(format!("token serialize failed: {e}")))?;
        fs::write(path, data)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

fn random_verifier() -> String {
    format!("{}{}{}", Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
}

fn code_challenge_s256(verifier: &str) -> String {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn build_auth_url(
    settings: &OAuthSettings,
    state: &str,
    challenge: &str,
) -> Result<String, AppError> {
    let mut url =
        Url::parse(AUTH_URL).map_err(|e| AppError::Gmail(format!("invalid auth URL: {e}")))?;
    url.query_pairs_mut()
        .append_pair("client_id", &settings.client_id)
        .append_pair("redirect_uri", &settings.redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &SCOPES.join(" "))
        .append_pair("state", state)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", "S256");
    Ok(url.into())
}

fn open_browser(url: &str) {
    let _ = Command::new("xdg-open").arg(url).spawn();
}

/// Split a loopback redirect URI into the port to listen on and the
/// callback path to expect.
fn parse_loopback_redirect_uri(uri: &str) -> Result<(u16, String), AppError> {
    let parsed = Url::parse(uri).map_err(|e| AppError::Gmail(format!("invalid redirect URI: {e}")))?;
    if parsed.scheme() != "http" {
        return Err(AppError::Gmail("redirect URI must use http loopback".into()));
    }
    let host = parsed.host_str().unwrap_or_default();
    if host != "127.0.0.1" && host != "localhost" {
        return Err(AppError::Gmail("redirect URI host must be 127.0.0.1 or localhost".into()));
    }
    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| AppError::Gmail("redirect URI must include port".into()))?;
    let path = if parsed.path().is_empty() { "/".to_string() } else { parsed.path().to_string() };
    Ok((port, path))
}

fn write_html(stream: &mut TcpStream, title: &str) {
    let body = format!("<html><body><h1>{title}</h1><p>Return to the terminal.</p></body></html>");
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = stream.write_all(response.as_bytes()) {
        warn!("failed writing oauth callback response: {e}");
    }
}

/// Pull `code` out of a callback request target after checking path and state.
fn parse_callback(
    target: &str,
    port: u16,
    expected_state: &str,
    expected_path: &str,
) -> Result<String, AppError> {
    let parsed = Url::parse(&format!("http://127.0.0.1:{port}{target}"))
        .map_err(|e| AppError::Gmail(format!("failed to parse callback URI: {e}")))?;
    if parsed.path() != expected_path {
        return Err(AppError::Gmail(format!("unexpected callback path: {}", parsed.path())));
    }

    let (mut code, mut state, mut error) = (None, None, None);
    for (k, v) in parsed.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.to_string()),
            "state" => state = Some(v.to_string()),
            "error" => error = Some(v.to_string()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(AppError::Gmail(format!("oauth error from callback: {error}")));
    }
    if state.as_deref() != Some(expected_state) {
        return Err(AppError::Gmail("callback state mismatch".into()));
    }
    code.ok_or_else(|| AppError::Gmail("callback did not include code".into()))
}

/// Block until the browser hits the loopback callback once.
fn receive_auth_code(port: u16, expected_state: &str, expected_path: &str) -> Result<String, AppError> {
    let listener = TcpListener::bind(("127.0.0.1", port)).map_err(|e| {
        AppError::Gmail(format!("failed to bind callback server on 127.0.0.1:{port}: {e}"))
    })?;
    let (mut stream, _) = listener.accept()?;

    let mut buf = [0_u8; 8192];
    let n = stream.read(&mut buf)?;
    let raw = String::from_utf8_lossy(&buf[..n]);
    let target = raw
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .ok_or_else(|| AppError::Gmail("invalid callback request line".into()))?;

    let result = parse_callback(target, port, expected_state, expected_path);
    let title = if result.is_ok() { "OAuth complete" } else { "Authorization failed" };
    write_html(&mut stream, title);
    result
}

async fn token_request(
    client: &reqwest::Client,
    form: &[(&str, &str)],
    what: &str,
) -> Result<TokenResponse, AppError> {
    let res = client
        .post(TOKEN_URL)
        .form(form)
        .send()
        .await
        .map_err(|e| AppError::Gmail(format!("{what} request failed: {e}")))?;

    if !res.status().is_success() {
        let body = res.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(AppError::Gmail(format!("{what} failed: {body}")));
    }

    res.json::<TokenResponse>()
        .await
        .map_err(|e| AppError::Gmail(format!("{what} parse failed: {e}")))
}

async fn refresh(
    client: &reqwest::Client,
    settings: &OAuthSettings,
    refresh_token: &str,
) -> Result<TokenResponse, AppError> {
    let mut form = vec![
        ("client_id", settings.client_id.as_str()),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];
    if let Some(secret) = settings.client_secret.as_deref() {
        form.push(("client_secret", secret));
    }
    token_request(client, &form, "token refresh").await
}

async fn authorize(client: &reqwest::Client, settings: &OAuthSettings) -> Result<TokenCache, AppError> {
    let (port, path) = parse_loopback_redirect_uri(&settings.redirect_uri)?;
    let state = Uuid::new_v4().to_string();
    let verifier = random_verifier();
    let auth_url = build_auth_url(settings, &state, &code_challenge_s256(&verifier))?;

    println!("gmail authorisation required; opening browser");
    println!("authorize URL: {auth_url}");
    open_browser(&auth_url);

    let code = tokio::task::spawn_blocking(move || receive_auth_code(port, &state, &path))
        .await
        .map_err(|e| AppError::Gmail(format!("callback task join error: {e}")))??;

    let mut form = vec![
        ("client_id", settings.client_id.as_str()),
        ("code", code.as_str()),
        ("code_verifier", verifier.as_str()),
        ("redirect_uri", settings.redirect_uri.as_str()),
        ("grant_type", "authorization_code"),
    ];
    if let Some(secret) = settings.client_secret.as_deref() {
        form.push(("client_secret", secret));
    }
    let token = token_request(client, &form, "token exchange").await?;

    Ok(TokenCache {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at: now_unix() + token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
    })
}

/// Return a usable access token: cached if fresh, refreshed if possible,
/// otherwise obtained interactively. The cache file is updated as needed.
pub async fn ensure_access_token(
    client: &reqwest::Client,
    settings: &OAuthSettings,
    token_file: &Path,
) -> Result<String, AppError> {
    if let Some(cache) = TokenCache::load(token_file) {
        if cache.is_fresh(now_unix()) {
            return Ok(cache.access_token);
        }
        if let Some(refresh_token) = cache.refresh_token.clone() {
            match refresh(client, settings, &refresh_token).await {
                Ok(refreshed) => {
                    let merged = TokenCache {
                        access_token: refreshed.access_token,
                        refresh_token: refreshed.refresh_token.or(Some(refresh_token)),
                        expires_at: now_unix()
                            + refreshed.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
                    };
                    merged.save(token_file)?;
                    info!("gmail token refreshed");
                    return Ok(merged.access_token);
                }
                Err(e) => warn!("gmail token refresh failed, re-authorising: {e}"),
            }
        }
    }

    let cache = authorize(client, settings).await?;
    cache.save(token_file)?;
    info!(path = %token_file.display(), "gmail token stored");
    Ok(cache.access_token)
}
