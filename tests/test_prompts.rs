//! Shipped config and prompt files parse and carry their placeholders.

use std::fs;
use std::path::Path;

use memory_machine::config;
use memory_machine::subsystems::chat::ResearcherProfile;

#[test]
fn default_config_loads() {
    let cfg = config::load_from(Path::new("config/default.toml"), Some("/tmp/mm-test"), None)
        .expect("config/default.toml should parse");
    assert_eq!(cfg.docstore.backend, "local_fs");
    assert_eq!(cfg.llm.provider, "dummy");
    assert_eq!(cfg.gmail.bucket, "memory-machine-receiving");
    assert!(cfg.gmail.dry_run);
}

#[test]
fn researcher_prompt_has_name_placeholder() {
    let text = fs::read_to_string("config/prompts/researcher.md").unwrap();
    assert!(text.contains("{{name}}"));
}

#[test]
fn researcher_prompt_renders_from_shipped_layer() {
    let prompt = ResearcherProfile::general("Ada").system_prompt(Path::new("config/prompts"));
    assert!(prompt.starts_with("You are Ada."));
    assert!(!prompt.contains("{{"));
}
