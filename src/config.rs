//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` (or `-f <path>`) relative to the current
//! working directory, then applies `MEMORY_MACHINE_WORK_DIR` and
//! `MEMORY_MACHINE_LOG_LEVEL` env overrides. The API key (`LLM_API_KEY`) comes
//! from the environment only; `EMAIL_FILTER` overrides `gmail.sender_filter`.

use std::{
    env,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Document store configuration (`[docstore]`).
#[derive(Debug, Clone)]
pub struct DocStoreConfig {
    /// `"local_fs"` or `"tmp"`.
    pub backend: String,
    /// Root of the `local_fs` backend. Relative paths resolve against `work_dir`.
    pub root_dir: PathBuf,
    /// Namespace opened by the console.
    pub namespace: String,
    /// Seed the sample documents when the namespace is empty after refresh.
    pub seed_samples: bool,
}

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    /// Upper bound on generated tokens per reply.
    pub max_tokens: u32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM subsystem configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"` or `"openai"`).
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
    pub openai: OpenAiConfig,
}

/// Researcher chat configuration (`[chat]`).
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Display name of the assistant.
    pub assistant_name: String,
    /// Directory holding prompt layers. Relative paths resolve against the
    /// process working directory.
    pub prompts_dir: PathBuf,
}

/// Gmail ingestion configuration (`[gmail]`).
#[derive(Debug, Clone)]
pub struct GmailConfig {
    /// Only ingest messages `from:` this sender. `EMAIL_FILTER` overrides.
    pub sender_filter: Option<String>,
    /// Reprocess messages that already have a record.
    pub replace_existing: bool,
    /// Log what would happen without uploading or writing records.
    pub dry_run: bool,
    /// Cached OAuth token (absolute or relative to `work_dir`).
    pub token_file: PathBuf,
    /// Root for the local object and record stores (absolute or relative to `work_dir`).
    pub storage_root: PathBuf,
    pub bucket: String,
    pub database: String,
    pub collection: String,
    /// Import decoded text attachments into this docstore namespace.
    pub import_namespace: Option<String>,
}

/// Fully-resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    /// Working directory for all persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Append logs here instead of stderr.
    pub log_file: Option<PathBuf>,
    pub docstore: DocStoreConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` env var, `None` for keyless local models.
    /// Never sourced from TOML.
    pub llm_api_key: Option<String>,
    pub chat: ChatConfig,
    pub gmail: GmailConfig,
}

impl Config {
    /// Resolve a possibly relative path against `work_dir`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir.join(path)
        }
    }
}

/// Raw TOML shape: `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    app: RawApp,
    #[serde(default)]
    docstore: RawDocStore,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    chat: RawChat,
    #[serde(default)]
    gmail: RawGmail,
}

#[derive(Deserialize)]
struct RawApp {
    name: String,
    work_dir: String,
    log_level: String,
    #[serde(default)]
    log_file: Option<String>,
}

#[derive(Deserialize)]
struct RawDocStore {
    #[serde(default = "default_docstore_backend")]
    backend: String,
    #[serde(default = "default_docstore_root")]
    root_dir: String,
    #[serde(default = "default_namespace")]
    namespace: String,
    #[serde(default = "default_true")]
    seed_samples: bool,
}

impl Default for RawDocStore {
    fn default() -> Self {
        Self {
            backend: default_docstore_backend(),
            root_dir: default_docstore_root(),
            namespace: default_namespace(),
            seed_samples: true,
        }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_max_tokens")]
    max_tokens: u32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            max_tokens: default_openai_max_tokens(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawChat {
    #[serde(default = "default_assistant_name")]
    assistant_name: String,
    #[serde(default = "default_prompts_dir")]
    prompts_dir: String,
}

impl Default for RawChat {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            prompts_dir: default_prompts_dir(),
        }
    }
}

#[derive(Deserialize)]
struct RawGmail {
    #[serde(default)]
    sender_filter: Option<String>,
    #[serde(default = "default_true")]
    replace_existing: bool,
    #[serde(default = "default_true")]
    dry_run: bool,
    #[serde(default = "default_gmail_token_file")]
    token_file: String,
    #[serde(default = "default_gmail_storage_root")]
    storage_root: String,
    #[serde(default = "default_gmail_bucket")]
    bucket: String,
    #[serde(default = "default_gmail_database")]
    database: String,
    #[serde(default = "default_gmail_collection")]
    collection: String,
    #[serde(default)]
    import_namespace: Option<String>,
}

impl Default for RawGmail {
    fn default() -> Self {
        Self {
            sender_filter: None,
            replace_existing: true,
            dry_run: true,
            token_file: default_gmail_token_file(),
            storage_root: default_gmail_storage_root(),
            bucket: default_gmail_bucket(),
            database: default_gmail_database(),
            collection: default_gmail_collection(),
            import_namespace: None,
        }
    }
}

fn default_docstore_backend() -> String { "local_fs".to_string() }
fn default_docstore_root() -> String { "docstore".to_string() }
fn default_namespace() -> String { "default".to_string() }
fn default_llm_provider() -> String { "dummy".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_temperature() -> f32 { 0.7 }
fn default_openai_max_tokens() -> u32 { 500 }
fn default_openai_timeout_seconds() -> u64 { 60 }
fn default_assistant_name() -> String { "Research Assistant".to_string() }
fn default_prompts_dir() -> String { "config/prompts".to_string() }
fn default_gmail_token_file() -> String { "gmail/token.json".to_string() }
fn default_gmail_storage_root() -> String { "gmail/storage".to_string() }
fn default_gmail_bucket() -> String { "memory-machine-receiving".to_string() }
fn default_gmail_database() -> String { "email".to_string() }
fn default_gmail_collection() -> String { "messages".to_string() }

fn default_true() -> bool {
    true
}

/// Load config from `config_path` (default `config/default.toml`), then
/// apply env-var overrides.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("MEMORY_MACHINE_WORK_DIR").ok();
    let log_level_override = env::var("MEMORY_MACHINE_LOG_LEVEL").ok();
    load_from(
        Path::new(config_path.unwrap_or(DEFAULT_CONFIG_PATH)),
        work_dir_override.as_deref(),
        log_level_override.as_deref(),
    )
}

/// Internal loader: accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let a = parsed.app;

    let work_dir_str = work_dir_override.unwrap_or(&a.work_dir).to_string();
    let work_dir = expand_home(&work_dir_str);
    let log_level = log_level_override.unwrap_or(&a.log_level).to_string();
    let log_file = a.log_file.map(|p| {
        let path = expand_home(&p);
        if path.is_absolute() { path } else { work_dir.join(path) }
    });

    if parsed.docstore.namespace.trim().is_empty() {
        return Err(AppError::Config("docstore.namespace must not be empty".into()));
    }

    let sender_filter = env::var("EMAIL_FILTER")
        .ok()
        .or(parsed.gmail.sender_filter)
        .filter(|s| !s.trim().is_empty());

    Ok(Config {
        app_name: a.name,
        work_dir,
        log_level,
        log_file,
        docstore: DocStoreConfig {
            backend: parsed.docstore.backend,
            root_dir: expand_home(&parsed.docstore.root_dir),
            namespace: parsed.docstore.namespace,
            seed_samples: parsed.docstore.seed_samples,
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                max_tokens: parsed.llm.openai.max_tokens,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        llm_api_key: env::var("LLM_API_KEY").ok(),
        chat: ChatConfig {
            assistant_name: parsed.chat.assistant_name,
            prompts_dir: PathBuf::from(parsed.chat.prompts_dir),
        },
        gmail: GmailConfig {
            sender_filter,
            replace_existing: parsed.gmail.replace_existing,
            dry_run: parsed.gmail.dry_run,
            token_file: expand_home(&parsed.gmail.token_file),
            storage_root: expand_home(&parsed.gmail.storage_root),
            bucket: parsed.gmail.bucket,
            database: parsed.gmail.database,
            collection: parsed.gmail.collection,
            import_namespace: parsed.gmail.import_namespace.filter(|s| !s.trim().is_empty()),
        },
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for unit tests: dummy LLM, tmp docstore, no API keys.
#[cfg(test)]
impl Config {
    pub fn test_default(work_dir: &Path) -> Self {
        Self {
            app_name: "test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            log_file: None,
            docstore: DocStoreConfig {
                backend: "tmp".into(),
                root_dir: PathBuf::from("docstore"),
                namespace: "default".into(),
                seed_samples: false,
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    max_tokens: 64,
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
            chat: ChatConfig {
                assistant_name: "Test Assistant".into(),
                prompts_dir: work_dir.join("prompts"),
            },
            gmail: GmailConfig {
                sender_filter: None,
                replace_existing: false,
                dry_run: true,
                token_file: PathBuf::from("gmail/token.json"),
                storage_root: PathBuf::from("gmail/storage"),
                bucket: "test-bucket".into(),
                database: "email".into(),
                collection: "messages".into(),
                import_namespace: None,
            },
        }
    }
}
