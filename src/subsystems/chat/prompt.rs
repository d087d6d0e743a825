//! Layered system-prompt builder.
//!
//! A prompt is a stack of text fragments joined by blank lines. Fragments
//! come from optional files under the prompts directory (missing files are
//! skipped) or from in-memory sections such as a researcher's background
//! list. `{{key}}` placeholders are substituted once at [`build`](PromptBuilder::build).

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

const SEPARATOR: &str = "\n\n";

pub struct PromptBuilder {
    prompts_dir: PathBuf,
    parts: Vec<String>,
    vars: HashMap<String, String>,
}

impl PromptBuilder {
    pub fn new(prompts_dir: impl Into<PathBuf>) -> Self {
        Self { prompts_dir: prompts_dir.into(), parts: Vec::new(), vars: HashMap::new() }
    }

    /// Append the contents of `filename` from the prompts directory.
    /// Silently skips the layer when the file does not exist or is blank.
    pub fn layer(mut self, filename: &str) -> Self {
        let path = self.prompts_dir.join(filename);
        match fs::read_to_string(&path) {
            Ok(text) => self.push(text),
            Err(_) => tracing::debug!("prompt: layer '{}' not found, skipped", path.display()),
        }
        self
    }

    /// Append a `# TITLE` section with one `- item` line per entry.
    /// Empty lists add nothing.
    pub fn section<S: AsRef<str>>(mut self, title: &str, items: &[S]) -> Self {
        if items.is_empty() {
            return self;
        }
        let mut text = format!("# {title}");
        for item in items {
            text.push_str("\n- ");
            text.push_str(item.as_ref());
        }
        self.parts.push(text);
        self
    }

    pub fn append(mut self, text: impl Into<String>) -> Self {
        self.push(text.into());
        self
    }

    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> String {
        let mut prompt = self.parts.join(SEPARATOR);
        for (k, v) in &self.vars {
            prompt = prompt.replace(&format!("{{{{{k}}}}}"), v);
        }
        prompt
    }

    fn push(&mut self, text: String) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.parts.push(trimmed.to_string());
        }
    }
}
